// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Syslog header extraction.
//!
//! Recognizes RFC 5424 (`<PRI>VERSION TIMESTAMP HOST APP PROCID MSGID SD MSG`)
//! and RFC 3164 (`<PRI>Mmm dd hh:mm:ss HOST MSG`) framing. Lines that carry a
//! `<PRI>` but neither header are accepted with everything after the PRI as the
//! message.

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static PRI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^<(\d{1,3})>(.*)$").expect("valid PRI regex"));

#[allow(clippy::expect_used)]
static RFC5424: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\d{1,2} \S+ \S+ \S+ \S+ \S+ (?:-|(?:\[(?:[^\]\\]|\\.)*\])+)(?: (.*))?$")
        .expect("valid RFC 5424 regex")
});

#[allow(clippy::expect_used)]
static RFC3164: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^[A-Z][a-z]{2} [ \d]\d \d{2}:\d{2}:\d{2} \S+ (.*)$")
        .expect("valid RFC 3164 regex")
});

const MAX_PRI: u16 = 191;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyslogDetails {
    pub message: String,
    pub facility: &'static str,
    pub severity: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyslogError {
    #[error("missing <PRI> header")]
    MissingPri,
    #[error("PRI value {0} is out of range")]
    PriOutOfRange(u16),
}

/// Splits a syslog line into its message, facility keyword and severity keyword.
pub fn extract(line: &str) -> Result<SyslogDetails, SyslogError> {
    let caps = PRI.captures(line).ok_or(SyslogError::MissingPri)?;
    let pri = caps[1]
        .parse::<u16>()
        .map_err(|_| SyslogError::MissingPri)?;
    if pri > MAX_PRI {
        return Err(SyslogError::PriOutOfRange(pri));
    }
    let rest = caps.get(2).map_or("", |m| m.as_str());

    let message = if let Some(c) = RFC5424.captures(rest) {
        c.get(1).map_or("", |m| m.as_str())
    } else if let Some(c) = RFC3164.captures(rest) {
        c.get(1).map_or("", |m| m.as_str())
    } else {
        rest
    };

    Ok(SyslogDetails {
        message: message.to_string(),
        facility: facility_name(pri / 8),
        severity: severity_name(pri % 8),
    })
}

fn facility_name(code: u16) -> &'static str {
    match code {
        0 => "kern",
        1 => "user",
        2 => "mail",
        3 => "daemon",
        4 => "auth",
        5 => "syslog",
        6 => "lpr",
        7 => "news",
        8 => "uucp",
        9 => "clock",
        10 => "authpriv",
        11 => "ftp",
        12 => "ntp",
        13 => "audit",
        14 => "alert",
        15 => "cron",
        16 => "local0",
        17 => "local1",
        18 => "local2",
        19 => "local3",
        20 => "local4",
        21 => "local5",
        22 => "local6",
        23 => "local7",
        _ => "unknown",
    }
}

fn severity_name(code: u16) -> &'static str {
    match code {
        0 => "emerg",
        1 => "alert",
        2 => "crit",
        3 => "err",
        4 => "warning",
        5 => "notice",
        6 => "info",
        7 => "debug",
        _ => "unknown",
    }
}
