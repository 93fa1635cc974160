// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use log_intake::listener::Transport;
use log_intake::{Config, Event, ListenerError, Protocol, Supervisor};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::mpsc::Receiver;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

const STARTUP: Duration = Duration::from_millis(150);
const WAIT: Duration = Duration::from_secs(3);

struct Running {
    events: Receiver<Event>,
    errors: Receiver<ListenerError>,
    token: CancellationToken,
}

async fn start(config: Config) -> Running {
    let (supervisor, events, errors) = Supervisor::new(config).expect("valid configuration");
    let token = supervisor.cancel_token();
    tokio::spawn(supervisor.run());
    sleep(STARTUP).await;
    Running {
        events,
        errors,
        token,
    }
}

async fn next_event(events: &mut Receiver<Event>) -> Event {
    timeout(WAIT, events.recv())
        .await
        .expect("event within timeout")
        .expect("channel open")
}

async fn send_udp(port: u16, payload: &[u8]) {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client
        .send_to(payload, ("127.0.0.1", port))
        .await
        .unwrap();
}

#[tokio::test]
async fn gelf_message_over_udp() {
    let config = Config {
        port: 18_701,
        enable_gelf: true,
        ..Default::default()
    };
    let mut running = start(config).await;

    let message = json!({
        "version": "1.1",
        "host": "localhost",
        "short_message": "A short message",
        "full_message": "Backtrace here\n\nmore stuff",
        "timestamp": 1_385_053_862.3072,
        "level": 6,
        "facility": "local6",
        "_user_id": 9001,
        "_some_info": "foo"
    });
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(message.to_string().as_bytes()).unwrap();
    send_udp(18_701, &encoder.finish().unwrap()).await;

    let event = next_event(&mut running.events).await;
    assert_eq!(event.fields["gelf"], json!({"version": "1.1"}));
    assert_eq!(event.fields["host"], "localhost");
    assert_eq!(event.fields["short_message"], "A short message");
    assert_eq!(event.fields["full_message"], "Backtrace here\n\nmore stuff");
    assert_eq!(event.fields["level"], "Informational");
    assert_eq!(event.fields["facility"], "local6");
    assert_eq!(event.fields["_user_id"], 9001);
    assert_eq!(event.fields["_some_info"], "foo");
    assert_eq!(event.timestamp.timestamp(), 1_385_053_862);
    assert_ne!(event.timestamp.timestamp(), 0);

    running.token.cancel();
}

#[tokio::test]
async fn gelf_message_with_current_timestamp() {
    let config = Config {
        port: 18_708,
        enable_gelf: true,
        ..Default::default()
    };
    let mut running = start(config).await;

    let sent_at = Utc::now().timestamp();
    let message = json!({
        "version": "1.1",
        "host": "localhost",
        "short_message": "Disk almost full",
        "full_message": "Volume /var is at 97%",
        "timestamp": sent_at,
        "level": 6,
        "facility": "local6"
    });
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(message.to_string().as_bytes()).unwrap();
    send_udp(18_708, &encoder.finish().unwrap()).await;

    let event = next_event(&mut running.events).await;
    assert_eq!(event.fields["gelf"], json!({"version": "1.1"}));
    assert_eq!(event.fields["host"], "localhost");
    assert_eq!(event.fields["short_message"], "Disk almost full");
    assert_eq!(event.fields["full_message"], "Volume /var is at 97%");
    assert_eq!(event.fields["level"], "Informational");
    assert_eq!(event.fields["facility"], "local6");
    assert_eq!(event.timestamp.timestamp(), sent_at);
    assert_eq!(event.timestamp.timestamp_subsec_nanos(), 0);

    running.token.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fifty_simultaneous_tcp_connections() {
    let config = Config {
        protocol: Protocol::Tcp,
        port: 18_702,
        ..Default::default()
    };
    let mut running = start(config).await;

    let clients: Vec<_> = (0..50)
        .map(|i| {
            tokio::spawn(async move {
                let mut stream = TcpStream::connect("127.0.0.1:18702").await.unwrap();
                stream
                    .write_all(format!("message {i}").as_bytes())
                    .await
                    .unwrap();
                stream.shutdown().await.unwrap();
            })
        })
        .collect();
    for client in clients {
        client.await.unwrap();
    }

    let mut received = Vec::new();
    for _ in 0..50 {
        received.push(next_event(&mut running.events).await);
    }
    assert!(
        timeout(Duration::from_millis(200), running.events.recv())
            .await
            .is_err(),
        "no more than one event per connection"
    );

    let mut messages: Vec<String> = received
        .iter()
        .map(|e| e.fields["message"].as_str().unwrap().to_string())
        .collect();
    messages.sort();
    messages.dedup();
    assert_eq!(messages.len(), 50);

    running.token.cancel();
}

#[tokio::test]
async fn udp_plain_and_json_payloads() {
    let plain = Config {
        port: 18_703,
        ..Default::default()
    };
    let mut running = start(plain).await;
    send_udp(18_703, b"  service restarted\n").await;
    let event = next_event(&mut running.events).await;
    assert_eq!(event.fields["message"], "service restarted");
    running.token.cancel();

    let json_mode = Config {
        port: 18_704,
        json_mode: true,
        merge_fields_to_root: true,
        ..Default::default()
    };
    let mut running = start(json_mode).await;
    send_udp(18_704, br#"{"user": "bob", "attempts": 3}"#).await;
    let event = next_event(&mut running.events).await;
    assert_eq!(event.fields["user"], "bob");
    assert_eq!(event.fields["attempts"], 3);

    send_udp(18_704, b"{not json").await;
    let event = next_event(&mut running.events).await;
    assert_eq!(event.fields["message"], "{not json");
    assert_eq!(
        event.fields["tags"],
        json!(["_log_intake_json_parse_failure"])
    );
    running.token.cancel();
}

#[tokio::test]
async fn syslog_over_udp() {
    let config = Config {
        port: 18_705,
        enable_syslog_format_only: true,
        ..Default::default()
    };
    let mut running = start(config).await;

    send_udp(
        18_705,
        b"<34>Oct 11 22:14:15 mymachine su: 'su root' failed for lonvick on /dev/pts/8",
    )
    .await;
    let event = next_event(&mut running.events).await;
    assert_eq!(event.fields["facility"], "auth");
    assert_eq!(event.fields["severity"], "crit");
    assert_eq!(
        event.fields["message"],
        "su: 'su root' failed for lonvick on /dev/pts/8"
    );

    running.token.cancel();
}

#[tokio::test]
async fn schema_validation_filters_payloads() {
    let mut schema = tempfile::NamedTempFile::new().unwrap();
    write!(
        schema,
        "{}",
        json!({
            "type": "object",
            "properties": {"user": {"type": "string"}},
            "required": ["user"]
        })
    )
    .unwrap();
    let config = Config {
        port: 18_706,
        json_mode: true,
        merge_fields_to_root: true,
        enable_json_validation: true,
        json_schema: HashMap::from([("login".to_string(), schema.path().to_path_buf())]),
        ..Default::default()
    };
    let mut running = start(config).await;

    send_udp(18_706, br#"{"type": "login"}"#).await;
    send_udp(18_706, br#"{"type": "login", "user": "bob"}"#).await;

    let event = next_event(&mut running.events).await;
    assert_eq!(event.fields["user"], "bob");
    assert!(timeout(Duration::from_millis(200), running.events.recv())
        .await
        .is_err());

    running.token.cancel();
}

#[tokio::test]
async fn bind_failure_reaches_error_channel() {
    let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = Config {
        port: taken.local_addr().unwrap().port(),
        ..Default::default()
    };
    let (supervisor, mut events, mut errors) = Supervisor::new(config).unwrap();
    assert_eq!(supervisor.transport(), Transport::Datagram);
    supervisor.run().await;

    assert!(matches!(
        errors.recv().await,
        Some(ListenerError::Bind { .. })
    ));
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn tcp_read_timeout_stops_the_listener() {
    let config = Config {
        protocol: Protocol::Tcp,
        port: 18_707,
        read_timeout: Some(Duration::from_millis(100)),
        ..Default::default()
    };
    let mut running = start(config).await;

    let _idle = TcpStream::connect("127.0.0.1:18707").await.unwrap();

    let err = timeout(WAIT, running.errors.recv()).await.unwrap();
    assert!(matches!(err, Some(ListenerError::ReadTimeout(_))));
    assert!(timeout(WAIT, running.events.recv()).await.unwrap().is_none());
}
