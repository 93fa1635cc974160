// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Transport listeners.
//!
//! Exactly one [`Listener`] variant runs per session. Each variant owns a
//! single sequential read loop and hands every payload to a spawned task, so
//! the loop never waits for parsing. The number of tasks in flight is capped by
//! a semaphore: once `max_concurrent_tasks` payloads are being processed, the
//! loop waits for a permit before reading more.

mod datagram;
mod gelf;
mod stream;

use std::sync::Arc;

use derive_more::Display;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::{Config, Protocol};
use crate::errors::ListenerError;
use crate::event::Event;
use crate::parser::MessageParser;

pub use datagram::DatagramListener;
pub use gelf::{gelf_event, gelf_timestamp, GelfListener};
pub use stream::StreamListener;

/// Transport a [`Listener`] reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Transport {
    #[display("tcp")]
    Stream,
    #[display("udp")]
    Datagram,
    #[display("gelf")]
    Gelf,
}

/// Settings shared by every listener variant.
#[derive(Debug, Clone)]
pub struct ListenerContext {
    pub address: String,
    pub max_message_size: usize,
    pub parser: Arc<MessageParser>,
    pub cancel_token: CancellationToken,
    permits: Arc<Semaphore>,
}

impl ListenerContext {
    #[must_use]
    pub fn new(config: &Config, parser: Arc<MessageParser>, cancel_token: CancellationToken) -> Self {
        Self {
            address: config.bind_address(),
            max_message_size: config.max_message_size,
            parser,
            cancel_token,
            permits: Arc::new(Semaphore::new(config.max_concurrent_tasks)),
        }
    }

    /// Runs `work` on its own task once a permit is available and sends the
    /// event it produces, if any.
    ///
    /// Returns `false` if no permit could be obtained because the listener is
    /// shutting down.
    pub(crate) async fn dispatch<F>(&self, events: &mpsc::Sender<Event>, work: F) -> bool
    where
        F: FnOnce() -> Option<Event> + Send + 'static,
    {
        let permit = tokio::select! {
            permit = Arc::clone(&self.permits).acquire_owned() => permit,
            () = self.cancel_token.cancelled() => return false,
        };
        let Ok(permit) = permit else {
            return false;
        };
        let events = events.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Some(event) = work() {
                send_event(&events, event).await;
            }
        });
        true
    }
}

/// One of the three transports, chosen once from the configuration.
#[derive(Debug)]
pub enum Listener {
    Stream(StreamListener),
    Datagram(DatagramListener),
    Gelf(GelfListener),
}

impl Listener {
    /// Picks the transport: TCP when configured, otherwise GELF when enabled,
    /// otherwise plain UDP.
    #[must_use]
    pub fn select(config: &Config, parser: Arc<MessageParser>, cancel_token: CancellationToken) -> Self {
        let context = ListenerContext::new(config, parser, cancel_token);
        match (config.protocol, config.enable_gelf) {
            (Protocol::Tcp, _) => Listener::Stream(StreamListener::new(context, config.read_timeout)),
            (Protocol::Udp, true) => Listener::Gelf(GelfListener::new(context)),
            (Protocol::Udp, false) => Listener::Datagram(DatagramListener::new(context)),
        }
    }

    #[must_use]
    pub fn transport(&self) -> Transport {
        match self {
            Listener::Stream(_) => Transport::Stream,
            Listener::Datagram(_) => Transport::Datagram,
            Listener::Gelf(_) => Transport::Gelf,
        }
    }

    /// Runs the read loop until cancellation or a fatal error.
    ///
    /// Fatal errors are reported on `errors` before returning.
    pub async fn start(&self, events: mpsc::Sender<Event>, errors: mpsc::Sender<ListenerError>) {
        match self {
            Listener::Stream(listener) => listener.start(events, errors).await,
            Listener::Datagram(listener) => listener.start(events, errors).await,
            Listener::Gelf(listener) => listener.start(events, errors).await,
        }
    }
}

/// Pushes an event, waiting while the channel is full.
pub(crate) async fn send_event(events: &mpsc::Sender<Event>, event: Event) {
    if events.send(event).await.is_err() {
        debug!("Event channel closed, dropping event");
    }
}

/// Reports a session-terminating error. The channel holds a single error;
/// later ones are only logged.
pub(crate) fn signal_fatal(errors: &mpsc::Sender<ListenerError>, err: ListenerError) {
    error!("{}", err);
    if let Err(e) = errors.try_send(err) {
        debug!("Fatal error not forwarded: {}", e);
    }
}
