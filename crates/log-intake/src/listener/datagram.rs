// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::errors::ListenerError;
use crate::event::Event;
use crate::listener::{signal_fatal, ListenerContext};

/// UDP listener for plain, syslog and JSON payloads, one message per datagram.
#[derive(Debug)]
pub struct DatagramListener {
    context: ListenerContext,
}

impl DatagramListener {
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
                        protocol: "udp",
                        address: address.clone(),
                        source,
                    },
                );
                return;
            }
        };
        info!("Now listening for logs via udp on {}", address);

        let mut buf = vec![0u8; self.context.max_message_size];
        loop {
            let received = tokio::select! {
                received = socket.recv_from(&mut buf) => received,
                () = self.context.cancel_token.cancelled() => break,
            };
            let (length, src) = match received {
                Ok(received) => received,
                Err(e) => {
                    error!("Error receiving log datagram: {}", e);
                    continue;
                }
            };
            if length == 0 {
                debug!("Skipping empty datagram from {}", src);
                continue;
            }
            trace!("Received {} bytes from {}", length, src);

            let payload = buf[..length].to_vec();
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
        debug!("UDP listener on {} stopped", address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::parser::{MessageParser, PayloadFormat};
    use crate::schema::SchemaRegistry;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn listener(port: u16, token: CancellationToken) -> DatagramListener {
        let config = Config {
            port,
            ..Default::default()
        };
        let parser = Arc::new(MessageParser::new(
            PayloadFormat::Plain,
            Arc::new(SchemaRegistry::default()),
            false,
        ));
        DatagramListener::new(ListenerContext::new(&config, parser, token))
    }

    #[tokio::test]
    async fn test_empty_datagram_is_skipped() {
        let token = CancellationToken::new();
        let listener = listener(18_611, token.clone());
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let (errors_tx, _errors_rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move { listener.start(events_tx, errors_tx).await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(b"", "127.0.0.1:18611").await.unwrap();
        client.send_to(b"  hello  ", "127.0.0.1:18611").await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(2), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.fields["message"], "hello");

        token.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let listener = listener(port, CancellationToken::new());
        let (events_tx, _events_rx) = mpsc::channel(8);
        let (errors_tx, mut errors_rx) = mpsc::channel(1);

        listener.start(events_tx, errors_tx).await;

        assert!(matches!(
            errors_rx.recv().await,
            Some(ListenerError::Bind { protocol: "udp", .. })
        ));
    }
}
