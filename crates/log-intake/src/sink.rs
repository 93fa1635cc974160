// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;
use tracing::debug;

use crate::event::Event;

/// Downstream consumer of emitted events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: Event);
}

/// Publishes every event of `events` to `sink` until all senders are dropped.
///
/// Returns the number of events published.
pub async fn forward<S>(mut events: Receiver<Event>, sink: &S) -> usize
where
    S: EventSink + ?Sized,
{
    let mut published = 0;
    while let Some(event) = events.recv().await {
        sink.publish(event).await;
        published += 1;
    }
    debug!("Event channel closed after {} events", published);
    published
}
