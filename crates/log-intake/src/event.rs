// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Field mapping of an event. Values may be strings, numbers, nested objects or arrays.
pub type Fields = Map<String, Value>;

/// A normalized log event, ready to be handed to a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub fields: Fields,
}

impl Event {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn now(fields: Fields) -> Self {
        Self {
            timestamp: Utc::now(),
            fields,
        }
    }

    #[must_use]
    pub fn with_timestamp(timestamp: DateTime<Utc>, fields: Fields) -> Self {
        Self { timestamp, fields }
    }

    /// Renders the event as a flat JSON document with an `@timestamp` key.
    ///
    /// A field already named `@timestamp` is overwritten by the event timestamp.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut doc = self.fields.clone();
        doc.insert(
            "@timestamp".to_string(),
            Value::String(self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        Value::Object(doc)
    }
}
