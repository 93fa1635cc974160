// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use log_intake::{sink, Config, Event, EventSink, Supervisor};

const LOG_LEVEL_ENV: &str = "LOG_INTAKE_LOG_LEVEL";

/// Writes every event as one JSON document per line on stdout.
struct StdoutSink {
    out: TokioMutex<Stdout>,
}

impl StdoutSink {
    fn new() -> Self {
        Self {
            out: TokioMutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait]
impl EventSink for StdoutSink {
    async fn publish(&self, event: Event) {
        let mut line = event.to_json().to_string();
        line.push('\n');
        let mut out = self.out.lock().await;
        if let Err(e) = out.write_all(line.as_bytes()).await {
            error!("Failed to write event to stdout: {}", e);
            return;
        }
        if let Err(e) = out.flush().await {
            error!("Failed to flush stdout: {}", e);
        }
    }
}

fn log_filter(level: Option<String>) -> String {
    level
        .map(|val| val.trim().to_lowercase())
        .filter(|val| !val.is_empty())
        .unwrap_or_else(|| "info".to_string())
}

#[tokio::main]
pub async fn main() {
    let log_level = log_filter(env::var(LOG_LEVEL_ENV).ok());

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(log_level).expect("could not parse log level in configuration"),
        )
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading configuration: {}", e);
            return;
        }
    };

    let (supervisor, events_rx, mut errors_rx) = match Supervisor::new(config) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Error starting log intake: {}", e);
            return;
        }
    };
    let cancel_token = supervisor.cancel_token();
    let listener_handle = tokio::spawn(supervisor.run());
    let forward_handle = tokio::spawn(async move {
        let sink = StdoutSink::new();
        sink::forward(events_rx, &sink).await
    });

    tokio::select! {
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Received interrupt, shutting down"),
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        },
        Some(e) = errors_rx.recv() => error!("Log intake stopped: {}", e),
    }
    cancel_token.cancel();

    if let Err(e) = listener_handle.await {
        error!("Listener task failed: {}", e);
    }
    match forward_handle.await {
        Ok(published) => info!("Published {} events", published),
        Err(e) => error!("Sink task failed: {}", e),
    }
}
