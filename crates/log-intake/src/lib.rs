// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Network log intake.
//!
//! Listens for log payloads over one transport (TCP, UDP or GELF over UDP),
//! normalizes every payload into an [`event::Event`] and pushes the events onto
//! a bounded channel consumed by an [`sink::EventSink`].
//!
//! ```text
//!   TCP / UDP / GELF socket
//!          │
//!          v
//!   ┌─────────────┐
//!   │  Listener   │ (single read loop, bounded task fan-out)
//!   └──────┬──────┘
//!          │ spawn per payload
//!          v
//!   ┌─────────────┐
//!   │   Parser    │ (syslog | json + schema | plain)
//!   └──────┬──────┘
//!          │
//!          v
//!   ┌─────────────┐
//!   │   Channel   │ (mpsc, bounded) ──> EventSink
//!   └─────────────┘
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod constants;
pub mod errors;
pub mod event;
pub mod gelf;
pub mod listener;
pub mod parser;
pub mod schema;
pub mod severity;
pub mod sink;
pub mod supervisor;
pub mod syslog;

pub use config::{Config, Protocol};
pub use errors::{ConfigError, ListenerError};
pub use event::{Event, Fields};
pub use sink::EventSink;
pub use supervisor::Supervisor;
