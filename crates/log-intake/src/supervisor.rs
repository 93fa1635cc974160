// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Owns the configuration, the channels and the single running listener.
//!
//! The event receiver and the error receiver are handed out by
//! [`Supervisor::new`]. The supervisor keeps the senders for as long as
//! [`Supervisor::run`] executes; parse tasks still in flight hold clones, so
//! the event channel only reports closed after the last of them has sent.

use std::sync::Arc;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::{ConfigError, ListenerError};
use crate::event::Event;
use crate::listener::{Listener, Transport};
use crate::parser::MessageParser;
use crate::schema::SchemaRegistry;

#[derive(Debug)]
pub struct Supervisor {
    listener: Listener,
    events: Sender<Event>,
    errors: Sender<ListenerError>,
    cancel_token: CancellationToken,
}

impl Supervisor {
    /// Validates `config`, loads the JSON schemas it needs and selects the
    /// transport. No socket is opened until [`Supervisor::run`].
    pub fn new(
        config: Config,
    ) -> Result<(Self, Receiver<Event>, Receiver<ListenerError>), ConfigError> {
        config.validate()?;

        let schemas = if config.uses_schemas() {
            SchemaRegistry::load(&config.json_schema)?
        } else {
            SchemaRegistry::default()
        };
        if !schemas.is_empty() {
            info!("Loaded {} JSON schemas", schemas.len());
        }
        let parser = Arc::new(MessageParser::from_config(&config, Arc::new(schemas)));
        let cancel_token = CancellationToken::new();
        let listener = Listener::select(&config, parser, cancel_token.clone());
        info!(
            "Log intake configured for {} on {}",
            listener.transport(),
            config.bind_address()
        );

        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);
        let (errors_tx, errors_rx) = mpsc::channel(1);
        Ok((
            Self {
                listener,
                events: events_tx,
                errors: errors_tx,
                cancel_token,
            },
            events_rx,
            errors_rx,
        ))
    }

    #[must_use]
    pub fn transport(&self) -> Transport {
        self.listener.transport()
    }

    /// Token that stops the read loop when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    /// Runs the listener until it is cancelled or fails, then releases the
    /// channel senders.
    pub async fn run(self) {
        let Self {
            listener,
            events,
            errors,
            ..
        } = self;
        listener.start(events, errors).await;
        debug!("{} listener returned", listener.transport());
    }
}
