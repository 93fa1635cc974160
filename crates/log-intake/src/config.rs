// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Listener configuration.
//!
//! A [`Config`] is built once, before any socket is opened, and shared read-only
//! with the listener and every parse task for the lifetime of the session.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use derive_more::Display;

use crate::constants::{
    DEFAULT_ADDRESS, DEFAULT_MAX_CONCURRENT_TASKS, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT,
    EVENT_CHANNEL_CAPACITY,
};
use crate::errors::ConfigError;

const ENV_ADDRESS: &str = "LOG_INTAKE_ADDRESS";
const ENV_PORT: &str = "LOG_INTAKE_PORT";
const ENV_PROTOCOL: &str = "LOG_INTAKE_PROTOCOL";
const ENV_MAX_MESSAGE_SIZE: &str = "LOG_INTAKE_MAX_MESSAGE_SIZE";
const ENV_ENABLE_GELF: &str = "LOG_INTAKE_ENABLE_GELF";
const ENV_JSON_MODE: &str = "LOG_INTAKE_JSON_MODE";
const ENV_MERGE_FIELDS_TO_ROOT: &str = "LOG_INTAKE_MERGE_FIELDS_TO_ROOT";
const ENV_SYSLOG_FORMAT_ONLY: &str = "LOG_INTAKE_SYSLOG_FORMAT_ONLY";
const ENV_ENABLE_JSON_VALIDATION: &str = "LOG_INTAKE_ENABLE_JSON_VALIDATION";
const ENV_VALIDATE_ALL_JSON_TYPES: &str = "LOG_INTAKE_VALIDATE_ALL_JSON_TYPES";
const ENV_JSON_SCHEMA: &str = "LOG_INTAKE_JSON_SCHEMA";
const ENV_DEBUG: &str = "LOG_INTAKE_DEBUG";
const ENV_MAX_CONCURRENT_TASKS: &str = "LOG_INTAKE_MAX_CONCURRENT_TASKS";
const ENV_READ_TIMEOUT_MS: &str = "LOG_INTAKE_READ_TIMEOUT_MS";

/// Socket transport used when GELF is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Protocol {
    #[display("tcp")]
    Tcp,
    #[display("udp")]
    Udp,
}

impl FromStr for Protocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(ConfigError::Invalid(format!(
                "Unsupported protocol '{other}'. Must be one of: tcp, udp"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub protocol: Protocol,
    pub address: String,
    pub port: u16,
    /// Size of the read buffer for one TCP connection or one datagram.
    pub max_message_size: usize,
    /// Listen for GELF messages instead of raw text. Ignored when `protocol` is TCP.
    pub enable_gelf: bool,
    pub json_mode: bool,
    /// Put the top-level keys of a JSON payload directly into the event fields
    /// instead of nesting the document under `log`.
    pub merge_fields_to_root: bool,
    pub enable_syslog_format_only: bool,
    pub enable_json_validation: bool,
    /// Drop every JSON payload whose `type` has no registered schema.
    pub validate_all_json_types: bool,
    /// Schema file per payload `type`.
    pub json_schema: HashMap<String, PathBuf>,
    /// Log why payloads are dropped.
    pub debug: bool,
    pub max_concurrent_tasks: usize,
    /// Deadline for the single read of a TCP connection. Expiry stops the listener.
    pub read_timeout: Option<Duration>,
    pub event_channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol: Protocol::Udp,
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            enable_gelf: false,
            json_mode: false,
            merge_fields_to_root: false,
            enable_syslog_format_only: false,
            enable_json_validation: false,
            validate_all_json_types: false,
            json_schema: HashMap::new(),
            debug: false,
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            read_timeout: None,
            event_channel_capacity: EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_iter(env::vars())
    }

    /// Builds configuration from key/value pairs (typically for tests).
    ///
    /// Unset or unparsable numeric values fall back to their defaults; an
    /// unknown protocol is an error.
    pub fn from_env_iter<I, K, V>(iter: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |key: &str| map.get(key).map(String::as_str);
        let defaults = Self::default();

        let protocol = match get(ENV_PROTOCOL) {
            Some(value) => value.parse()?,
            None => defaults.protocol,
        };
        let address = get(ENV_ADDRESS)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map_or(defaults.address, str::to_string);
        let port = get(ENV_PORT)
            .and_then(|v| v.trim().parse::<u16>().ok())
            .unwrap_or(defaults.port);
        let max_message_size = get(ENV_MAX_MESSAGE_SIZE)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(defaults.max_message_size);
        let max_concurrent_tasks = get(ENV_MAX_CONCURRENT_TASKS)
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(defaults.max_concurrent_tasks);
        let read_timeout = get(ENV_READ_TIMEOUT_MS)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        let json_schema = get(ENV_JSON_SCHEMA)
            .map(parse_schema_mapping)
            .transpose()?
            .unwrap_or_default();

        let config = Self {
            protocol,
            address,
            port,
            max_message_size,
            enable_gelf: parse_bool(get(ENV_ENABLE_GELF), false),
            json_mode: parse_bool(get(ENV_JSON_MODE), false),
            merge_fields_to_root: parse_bool(get(ENV_MERGE_FIELDS_TO_ROOT), false),
            enable_syslog_format_only: parse_bool(get(ENV_SYSLOG_FORMAT_ONLY), false),
            enable_json_validation: parse_bool(get(ENV_ENABLE_JSON_VALIDATION), false),
            validate_all_json_types: parse_bool(get(ENV_VALIDATE_ALL_JSON_TYPES), false),
            json_schema,
            debug: parse_bool(get(ENV_DEBUG), false),
            max_concurrent_tasks,
            read_timeout,
            event_channel_capacity: defaults.event_channel_capacity,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::Invalid("address cannot be empty".to_string()));
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid(
                "max message size must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid(
                "max concurrent tasks must be greater than 0".to_string(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event channel capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// `address:port` string handed to the socket bind call.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Whether a schema registry has to be built for this configuration.
    #[must_use]
    pub fn uses_schemas(&self) -> bool {
        let gelf_selected = self.enable_gelf && self.protocol != Protocol::Tcp;
        !gelf_selected
            && self.json_mode
            && (self.enable_json_validation || self.validate_all_json_types)
    }
}

/// Parses `type=path,type=path` into a schema mapping.
fn parse_schema_mapping(value: &str) -> Result<HashMap<String, PathBuf>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
                Ok((name.trim().to_string(), PathBuf::from(path.trim())))
            }
            _ => Err(ConfigError::Invalid(format!(
                "Invalid JSON schema entry '{entry}'. Expected type=path"
            ))),
        })
        .collect()
}

fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(|s| s.trim().to_ascii_lowercase()) {
        Some(ref v) if ["1", "true", "t", "yes", "y"].contains(&v.as_str()) => true,
        Some(ref v) if ["0", "false", "f", "no", "n"].contains(&v.as_str()) => false,
        _ => default,
    }
}
