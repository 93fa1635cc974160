// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::errors::ListenerError;
use crate::event::Event;
use crate::listener::{signal_fatal, ListenerContext};

/// TCP listener. Every connection carries exactly one message, read once.
#[derive(Debug)]
pub struct StreamListener {
    context: ListenerContext,
    read_timeout: Option<Duration>,
}

enum ReadOutcome {
    Data(Vec<u8>),
    Skipped,
    Cancelled,
    TimedOut(Duration),
}

impl StreamListener {
    #[must_use]
    pub fn new(context: ListenerContext, read_timeout: Option<Duration>) -> Self {
        Self {
            context,
            read_timeout,
        }
    }

    pub async fn start(&self, events: mpsc::Sender<Event>, errors: mpsc::Sender<ListenerError>) {
        let address = &self.context.address;
        let listener = match TcpListener::bind(address).await {
            Ok(listener) => listener,
            Err(source) => {
                signal_fatal(
                    &errors,
                    ListenerError::Bind {
                        protocol: "tcp",
                        address: address.clone(),
                        source,
                    },
                );
                return;
            }
        };
        info!("Now listening for logs via tcp on {}", address);

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                () = self.context.cancel_token.cancelled() => break,
            };
            let (mut stream, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting log event: {}", e);
                    continue;
                }
            };

            let payload = match self.read_once(&mut stream).await {
                ReadOutcome::Data(payload) => payload,
                ReadOutcome::Skipped => continue,
                ReadOutcome::Cancelled => break,
                ReadOutcome::TimedOut(limit) => {
                    signal_fatal(&errors, ListenerError::ReadTimeout(limit));
                    return;
                }
            };
            trace!("Received {} bytes from {}", payload.len(), peer);

            let parser = Arc::clone(&self.context.parser);
            let dispatched = self
                .context
                .dispatch(&events, move || {
                    parser.build_event(String::from_utf8_lossy(&payload).trim())
                })
                .await;
            if !dispatched {
                break;
            }
        }
        debug!("TCP listener on {} stopped", address);
    }

    async fn read_once(&self, stream: &mut TcpStream) -> ReadOutcome {
        let mut buf = vec![0u8; self.context.max_message_size];
        let read = async {
            match self.read_timeout {
                Some(limit) => tokio::time::timeout(limit, stream.read(&mut buf))
                    .await
                    .map_err(|_| limit),
                None => Ok(stream.read(&mut buf).await),
            }
        };
        let result = tokio::select! {
            result = read => result,
            () = self.context.cancel_token.cancelled() => return ReadOutcome::Cancelled,
        };
        match result {
            Err(limit) => ReadOutcome::TimedOut(limit),
            Ok(Err(e)) => {
                error!("Error reading from TCP connection: {}", e);
                ReadOutcome::Skipped
            }
            Ok(Ok(length)) => {
                buf.truncate(length);
                ReadOutcome::Data(buf)
            }
        }
    }
}
