// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for job and workflow state changes.

use crate::observability::messages::StructuredLog;
use crate::registry::{JobId, JobState, WorkflowId};
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A job moved to a new state.
///
/// # Log Level
/// `info!` for terminal states, `debug!` otherwise
pub struct JobTransitioned<'a> {
    pub job_id: &'a JobId,
    pub processor: &'a str,
    pub from: JobState,
    pub to: JobState,
}

impl Display for JobTransitioned<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Job {} ({}): {} -> {}",
            self.job_id, self.processor, self.from, self.to
        )
    }
}

impl StructuredLog for JobTransitioned<'_> {
    fn log(&self) {
        if self.to.is_terminal() {
            tracing::info!(
                job_id = %self.job_id,
                processor = self.processor,
                from = %self.from,
                to = %self.to,
                "{}", self
            );
        } else {
            tracing::debug!(
                job_id = %self.job_id,
                processor = self.processor,
                from = %self.from,
                to = %self.to,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "job",
            span_name = name,
            job_id = %self.job_id,
            processor = self.processor,
        )
    }
}

/// A stale or out-of-order state report was ignored.
///
/// # Log Level
/// `warn!` - Expected under at-least-once delivery, worth noticing
pub struct TransitionDiscarded<'a> {
    pub job_id: &'a JobId,
    pub current: JobState,
    pub reported: JobState,
}

impl Display for TransitionDiscarded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Discarding '{}' report for job {} already in state '{}'",
            self.reported, self.job_id, self.current
        )
    }
}

impl StructuredLog for TransitionDiscarded<'_> {
    fn log(&self) {
        tracing::warn!(
            job_id = %self.job_id,
            current = %self.current,
            reported = %self.reported,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("job", span_name = name, job_id = %self.job_id)
    }
}

/// # Log Level
/// `warn!`
pub struct WorkflowFailed<'a> {
    pub workflow_id: &'a WorkflowId,
    pub reason: &'a str,
}

impl Display for WorkflowFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Workflow {} failed: {}", self.workflow_id, self.reason)
    }
}

impl StructuredLog for WorkflowFailed<'_> {
    fn log(&self) {
        tracing::warn!(workflow_id = %self.workflow_id, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("workflow", span_name = name, workflow_id = %self.workflow_id)
    }
}
