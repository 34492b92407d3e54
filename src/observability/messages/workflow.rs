// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for workflow sequencing.

use crate::observability::messages::StructuredLog;
use crate::registry::{JobState, WorkflowId};
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A workflow was admitted and its sequencer started.
///
/// # Log Level
/// `info!`
pub struct WorkflowSubmitted<'a> {
    pub workflow_id: &'a WorkflowId,
    pub steps: usize,
    pub path_to_mets: &'a str,
}

impl Display for WorkflowSubmitted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Workflow {} submitted: {} step(s) on {}",
            self.workflow_id, self.steps, self.path_to_mets
        )
    }
}

impl StructuredLog for WorkflowSubmitted<'_> {
    fn log(&self) {
        tracing::info!(
            workflow_id = %self.workflow_id,
            steps = self.steps,
            path_to_mets = self.path_to_mets,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "workflow",
            span_name = name,
            workflow_id = %self.workflow_id,
        )
    }
}

/// All jobs of one step were registered and published.
///
/// # Log Level
/// `info!`
pub struct StepDispatched<'a> {
    pub workflow_id: &'a WorkflowId,
    /// 1-based
    pub step: usize,
    pub processor: &'a str,
    pub jobs: usize,
}

impl Display for StepDispatched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Workflow {} step {} ({}): dispatched {} job(s)",
            self.workflow_id, self.step, self.processor, self.jobs
        )
    }
}

impl StructuredLog for StepDispatched<'_> {
    fn log(&self) {
        tracing::info!(
            workflow_id = %self.workflow_id,
            step = self.step,
            processor = self.processor,
            jobs = self.jobs,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "workflow_step",
            span_name = name,
            workflow_id = %self.workflow_id,
            step = self.step,
            processor = self.processor,
        )
    }
}

/// The sequencer stopped; `state` is the aggregate at that moment.
///
/// # Log Level
/// `info!` on success, `warn!` otherwise
pub struct WorkflowFinished<'a> {
    pub workflow_id: &'a WorkflowId,
    pub state: JobState,
}

impl Display for WorkflowFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Workflow {} finished: {}", self.workflow_id, self.state)
    }
}

impl StructuredLog for WorkflowFinished<'_> {
    fn log(&self) {
        if self.state == JobState::Success {
            tracing::info!(workflow_id = %self.workflow_id, state = %self.state, "{}", self);
        } else {
            tracing::warn!(workflow_id = %self.workflow_id, state = %self.state, "{}", self);
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("workflow", span_name = name, workflow_id = %self.workflow_id)
    }
}

/// # Log Level
/// `info!`
pub struct WorkflowCancelled<'a> {
    pub workflow_id: &'a WorkflowId,
}

impl Display for WorkflowCancelled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Workflow {} cancelled", self.workflow_id)
    }
}

impl StructuredLog for WorkflowCancelled<'_> {
    fn log(&self) {
        tracing::info!(workflow_id = %self.workflow_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("workflow", span_name = name, workflow_id = %self.workflow_id)
    }
}
