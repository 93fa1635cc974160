// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised while building the intake from its configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read JSON schema '{name}' from {path}: {source}")]
    SchemaRead {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON schema '{name}' from {path}: {source}")]
    SchemaParse {
        name: String,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to compile JSON schema '{name}': {reason}")]
    SchemaCompile { name: String, reason: String },
}

/// Failures that terminate a listening session.
///
/// Only these travel over the error channel; every other failure is handled
/// where it happens.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Failed to bind {protocol} listener on {address}: {source}")]
    Bind {
        protocol: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out after {0:?} reading from TCP connection")]
    ReadTimeout(Duration),
}
