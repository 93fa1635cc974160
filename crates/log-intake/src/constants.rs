// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6000;

/// Upper bound for a single TCP read or UDP datagram.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4096;

/// Capacity of the channel between the listener and the sink.
pub const EVENT_CHANNEL_CAPACITY: usize = 100_000;

/// Parse/validate tasks allowed in flight before the read loop waits.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 1024;

pub const JSON_PARSE_FAILURE_TAG: &str = "_log_intake_json_parse_failure";
pub const SYSLOG_PARSE_FAILURE_TAG: &str = "_log_intake_syslog_parse_failure";
