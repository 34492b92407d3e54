// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Workflow definitions and their execution as sequenced processing jobs.

pub mod definition;
pub mod executor;

pub use definition::{WorkflowDefinition, WorkflowStep};
pub use executor::{WorkflowExecutor, CANCELLED};
