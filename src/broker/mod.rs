// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The orchestrator service and its HTTP interface.

pub mod api;
mod catalog;
mod dispatch;
mod service;

pub use api::build_router;
pub use catalog::ProcessorCatalog;
pub use dispatch::Dispatcher;
pub use service::{Collaborators, ProcessingBroker};
