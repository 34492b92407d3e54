// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::registry::JobState;
use thiserror::Error;

/// Errors returned by the job/workflow registry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// No record with this id. Returned to the caller, never logged as an error.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// The requested state does not follow the monotonic lifecycle from the
    /// current one, or the record is already terminal.
    #[error("Invalid transition for job '{id}': {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: JobState,
        to: JobState,
    },
}

impl RegistryError {
    pub fn job_not_found(id: impl ToString) -> Self {
        RegistryError::NotFound {
            kind: "Job",
            id: id.to_string(),
        }
    }

    pub fn workflow_not_found(id: impl ToString) -> Self {
        RegistryError::NotFound {
            kind: "Workflow",
            id: id.to_string(),
        }
    }
}
