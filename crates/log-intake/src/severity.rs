// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! GELF level codes (syslog severities) and their display names.

use tracing::debug;

/// Name reported for level codes outside 0-7.
pub const UNKNOWN_LEVEL: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Informational,
    Debug,
}

const SEVERITIES: [Severity; 8] = [
    Severity::Emergency,
    Severity::Alert,
    Severity::Critical,
    Severity::Error,
    Severity::Warning,
    Severity::Notice,
    Severity::Informational,
    Severity::Debug,
];

impl Severity {
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| SEVERITIES.get(idx).copied())
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Severity::Emergency => "Emergency",
            Severity::Alert => "Alert",
            Severity::Critical => "Critical",
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Notice => "Notice",
            Severity::Informational => "Informational",
            Severity::Debug => "Debug",
        }
    }
}

/// Display name for a level code, [`UNKNOWN_LEVEL`] when out of range.
#[must_use]
pub fn level_name(code: i64) -> &'static str {
    match Severity::from_code(code) {
        Some(severity) => severity.name(),
        None => {
            debug!("Level {} is out of range", code);
            UNKNOWN_LEVEL
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn test_every_code_maps_to_its_name() {
        let expected = [
            "Emergency",
            "Alert",
            "Critical",
            "Error",
            "Warning",
            "Notice",
            "Informational",
            "Debug",
        ];
        for (code, name) in expected.iter().enumerate() {
            assert_eq!(level_name(code as i64), *name);
        }
    }

    #[test]
    #[traced_test]
    fn test_out_of_range_codes() {
        assert_eq!(Severity::from_code(-1), None);
        assert_eq!(Severity::from_code(8), None);
        assert_eq!(level_name(42), UNKNOWN_LEVEL);
        assert!(logs_contain("Level 42 is out of range"));
    }

    #[test]
    fn test_from_code_round_trips_name() {
        assert_eq!(
            Severity::from_code(6).map(Severity::name),
            Some("Informational")
        );
    }
}
