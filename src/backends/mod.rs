// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Processor backends run by worker agents.
//!
//! ## Command Backend
//! [`command::CommandProcessor`] runs the external executable named like the
//! processor, the way OCR-D processors are installed. It is what
//! `ProcessorMap::from_names` builds for every queue a worker serves.
//!
//! ## Stub Backend (Test-Only)
//! - **StubProcessor**: succeeds and records its requests
//! - **FailingProcessor**: always reports a failure
//! - **Note**: NOT available in production builds

pub mod command;
#[cfg(test)]
pub mod stub;
