// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Every operational event the broker and its workers log is a small struct
//! implementing `Display` (the human-readable line) and [`StructuredLog`] (the
//! level and structured fields). Call sites never format log strings themselves.
//!
//! # Organization
//!
//! * `deployer` - agent start, stop, rollback
//! * `channel` - connections, retries, redelivery, dead-lettering
//! * `registry` - job transitions and workflow failures
//! * `broker` - service startup, admission, status reports, shutdown
//! * `workflow` - step dispatch, sequencing, cancellation
//! * `worker` - processor runs inside a worker agent
//! * `validation` - configuration validation problems
//!
//! # Usage Pattern
//!
//! ```rust
//! use processing_broker::observability::messages::deployer::AgentStarting;
//! use processing_broker::observability::messages::StructuredLog;
//!
//! AgentStarting { agent: "worker ocrd-dummy@localhost" }.log();
//! ```

use tracing::Span;

pub mod broker;
pub mod channel;
pub mod deployer;
pub mod registry;
pub mod validation;
pub mod worker;
pub mod workflow;

/// A log event that knows its own level and structured fields.
pub trait StructuredLog {
    /// Emit the event at its documented level
    fn log(&self);

    /// Open a span carrying the same fields
    fn span(&self, name: &str) -> Span;
}
