// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors raised while admitting or expanding a workflow.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    /// The definition text could not be parsed
    #[error("Invalid workflow definition (line {line}): {reason}")]
    Definition { line: usize, reason: String },

    /// The definition contains no steps
    #[error("Workflow definition contains no steps")]
    Empty,

    /// A step names a processor nobody deployed
    #[error("Step {step} uses unknown processor '{processor}'")]
    UnknownProcessor { step: usize, processor: String },

    /// The workspace could not be resolved or queried
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// A page-wise step found nothing to fan out over
    #[error("Step {step}: input file group '{group}' has no pages")]
    NoPages { step: usize, group: String },
}
