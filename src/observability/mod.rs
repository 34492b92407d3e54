// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structured logging for the broker, its deployer and its workers.
//!
//! All operational events are typed messages (see [`messages`]) emitted
//! through `tracing`. The binary installs a `tracing-subscriber` formatter
//! filtered by `RUST_LOG`; library code only ever emits.
//!
//! # Usage
//!
//! ```rust
//! use processing_broker::observability::messages::channel::ConsumerStarted;
//! use processing_broker::observability::messages::StructuredLog;
//!
//! ConsumerStarted { queue: "ocrd-dummy" }.log();
//! ```

pub mod messages;
