// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns raw text payloads into events.
//!
//! The format is chosen once from the configuration, not per payload:
//! syslog-only first, then JSON, otherwise plain text. [`MessageParser::build_event`]
//! returns `None` when a payload has to be dropped; every other outcome,
//! degraded ones included, is a single event for the caller to send.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, error};

use crate::config::Config;
use crate::constants::{JSON_PARSE_FAILURE_TAG, SYSLOG_PARSE_FAILURE_TAG};
use crate::event::{Event, Fields};
use crate::schema::SchemaRegistry;
use crate::syslog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Syslog,
    Json {
        merge_fields_to_root: bool,
        validate_all_types: bool,
        validation_enabled: bool,
    },
    Plain,
}

impl PayloadFormat {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        if config.enable_syslog_format_only {
            PayloadFormat::Syslog
        } else if config.json_mode {
            PayloadFormat::Json {
                merge_fields_to_root: config.merge_fields_to_root,
                validate_all_types: config.validate_all_json_types,
                validation_enabled: config.enable_json_validation,
            }
        } else {
            PayloadFormat::Plain
        }
    }
}

#[derive(Debug)]
pub struct MessageParser {
    format: PayloadFormat,
    schemas: Arc<SchemaRegistry>,
    debug: bool,
}

impl MessageParser {
    #[must_use]
    pub fn new(format: PayloadFormat, schemas: Arc<SchemaRegistry>, debug: bool) -> Self {
        Self {
            format,
            schemas,
            debug,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config, schemas: Arc<SchemaRegistry>) -> Self {
        Self::new(PayloadFormat::from_config(config), schemas, config.debug)
    }


    /// Builds the event for one trimmed payload, or `None` if it is dropped.
    #[must_use]
    pub fn build_event(&self, raw: &str) -> Option<Event> {
        if raw.is_empty() {
            error!("Event is empty");
            return None;
        }
        match self.format {
            PayloadFormat::Syslog => Some(Event::now(syslog_fields(raw))),
            PayloadFormat::Json {
                merge_fields_to_root,
                validate_all_types,
                validation_enabled,
            } => self.json_event(raw, merge_fields_to_root, validate_all_types, validation_enabled),
            PayloadFormat::Plain => Some(Event::now(message_fields(raw))),
        }
    }

    fn json_event(
        &self,
        raw: &str,
        merge_fields_to_root: bool,
        validate_all_types: bool,
        validation_enabled: bool,
    ) -> Option<Event> {
        let object = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                error!("Could not parse JSON: payload is not an object");
                return Some(Event::now(tagged_fields(raw, JSON_PARSE_FAILURE_TAG)));
            }
            Err(e) => {
                error!("Could not parse JSON: {}", e);
                return Some(Event::now(tagged_fields(raw, JSON_PARSE_FAILURE_TAG)));
            }
        };
        let document = if merge_fields_to_root {
            Value::Object(object)
        } else {
            let mut fields = Fields::new();
            fields.insert("log".to_string(), Value::Object(object));
            Value::Object(fields)
        };

        // The discriminator is a field of the event, so nested payloads have none.
        let type_name = document.get("type").and_then(Value::as_str);
        let schema_set = type_name.is_some_and(|t| self.schemas.contains(t));

        if validate_all_types && !schema_set {
            if self.debug {
                match type_name {
                    Some(t) => error!("Log entry of type '{}' has no JSON schema set.", t),
                    None => error!("Log entry has no type."),
                }
            }
            return None;
        }

        if validation_enabled {
            if let Some(t) = type_name {
                if let Some(errors) = self.schemas.validate(t, &document) {
                    if !errors.is_empty() {
                        if self.debug {
                            error!(
                                "Log entry does not match specified schema for type '{}': {}",
                                t,
                                errors.join("; ")
                            );
                        }
                        return None;
                    }
                    debug!("Log entry of type '{}' passed schema validation", t);
                }
            }
        }

        let Value::Object(fields) = document else {
            return None;
        };
        Some(Event::now(fields))
    }
}

fn syslog_fields(raw: &str) -> Fields {
    match syslog::extract(raw) {
        Ok(details) => {
            let mut fields = Fields::new();
            fields.insert("facility".to_string(), json!(details.facility));
            fields.insert("severity".to_string(), json!(details.severity));
            fields.insert("message".to_string(), json!(details.message));
            fields
        }
        Err(e) => {
            debug!("Could not extract syslog details: {}", e);
            tagged_fields(raw, SYSLOG_PARSE_FAILURE_TAG)
        }
    }
}

fn message_fields(raw: &str) -> Fields {
    let mut fields = Fields::new();
    fields.insert("message".to_string(), json!(raw));
    fields
}

fn tagged_fields(raw: &str, tag: &str) -> Fields {
    let mut fields = message_fields(raw);
    fields.insert("tags".to_string(), json!([tag]));
    fields
}
