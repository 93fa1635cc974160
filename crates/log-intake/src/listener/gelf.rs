// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Duration as SignedDuration, Utc};
use serde_json::{json, Value};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::errors::ListenerError;
use crate::event::{Event, Fields};
use crate::gelf::{GelfDecoder, GelfMessage, MAX_DATAGRAM_SIZE};
use crate::listener::{signal_fatal, ListenerContext};
use crate::severity;

/// GELF over UDP. Datagrams are reassembled and decompressed on the read
/// loop; conversion to an [`Event`] happens on a spawned task.
#[derive(Debug)]
pub struct GelfListener {
    context: ListenerContext,
}

impl GelfListener {
    #[must_use]
    pub fn new(context: ListenerContext) -> Self {
        Self { context }
    }

    pub async fn start(&self, events: mpsc::Sender<Event>, errors: mpsc::Sender<ListenerError>) {
        let address = &self.context.address;
        let socket = match UdpSocket::bind(address).await {
            Ok(socket) => socket,
            Err(source) => {
                signal_fatal(
                    &errors,
                    ListenerError::Bind {
                        protocol: "gelf",
                        address: address.clone(),
                        source,
                    },
                );
                return;
            }
        };
        info!("Now listening for logs via gelf on {}", address);

        let mut decoder = GelfDecoder::new();
        let mut buf = vec![0u8; self.context.max_message_size.max(MAX_DATAGRAM_SIZE)];
        loop {
            let received = tokio::select! {
                received = socket.recv_from(&mut buf) => received,
                () = self.context.cancel_token.cancelled() => break,
            };
            let (length, src) = match received {
                Ok(received) => received,
                Err(e) => {
                    error!("Could not read GELF message: {}", e);
                    continue;
                }
            };
            trace!("Received {} bytes of GELF from {}", length, src);

            let message = match decoder.decode(&buf[..length]) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => {
                    error!("Could not read GELF message: {}", e);
                    continue;
                }
            };

            let dispatched = self
                .context
                .dispatch(&events, move || Some(gelf_event(message)))
                .await;
            if !dispatched {
                break;
            }
        }
        debug!("GELF listener on {} stopped", address);
    }
}

/// Converts a decoded GELF message into an event.
///
/// Extra fields are merged at the root under their original names; the level
/// is replaced by its severity name.
#[must_use]
pub fn gelf_event(message: GelfMessage) -> Event {
    let level = severity::level_name(message.level_code());

    let mut fields = Fields::new();
    fields.insert("gelf".to_string(), json!({ "version": message.version }));
    fields.insert("host".to_string(), Value::String(message.host));
    fields.insert(
        "short_message".to_string(),
        Value::String(message.short_message),
    );
    fields.insert(
        "full_message".to_string(),
        Value::String(message.full_message),
    );
    fields.extend(message.extra);
    fields.insert("level".to_string(), Value::String(level.to_string()));
    fields.insert("facility".to_string(), Value::String(message.facility));

    match gelf_timestamp(message.timestamp) {
        Some(timestamp) => Event::with_timestamp(timestamp, fields),
        None => Event::now(fields),
    }
}

/// Instant of a GELF timestamp, `None` when the event should be stamped now.
///
/// The fraction of a second is kept to four decimals.
#[must_use]
pub fn gelf_timestamp(timestamp: f64) -> Option<DateTime<Utc>> {
    if timestamp == 0.0 || !timestamp.is_finite() {
        return None;
    }
    let seconds = timestamp.floor();
    let fraction: f64 = format!("{:.4}", timestamp - seconds).parse().ok()?;
    let nanos = (fraction * 1e9).round() as i64;
    DateTime::from_timestamp(seconds as i64, 0)?
        .checked_add_signed(SignedDuration::nanoseconds(nanos))
}
