// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types emitted inside worker agents.

use crate::observability::messages::StructuredLog;
use crate::registry::JobId;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// # Log Level
/// `info!`
pub struct WorkerStarted<'a> {
    pub processors: &'a [String],
}

impl Display for WorkerStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker consuming for {}", self.processors.join(", "))
    }
}

impl StructuredLog for WorkerStarted<'_> {
    fn log(&self) {
        tracing::info!(processors = self.processors.join(","), "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("worker", span_name = name)
    }
}

/// A worker picked up a job.
///
/// # Log Level
/// `info!`
pub struct ProcessingStarted<'a> {
    pub job_id: &'a JobId,
    pub processor: &'a str,
    pub page_id: Option<&'a str>,
}

impl Display for ProcessingStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.page_id {
            Some(page) => write!(
                f,
                "Running {} for job {} (page {})",
                self.processor, self.job_id, page
            ),
            None => write!(f, "Running {} for job {}", self.processor, self.job_id),
        }
    }
}

impl StructuredLog for ProcessingStarted<'_> {
    fn log(&self) {
        tracing::info!(
            job_id = %self.job_id,
            processor = self.processor,
            page_id = self.page_id,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "processing",
            span_name = name,
            job_id = %self.job_id,
            processor = self.processor,
        )
    }
}

/// A processor run ended.
///
/// # Log Level
/// `info!` on success, `warn!` with the diagnostic otherwise
pub struct ProcessingFinished<'a> {
    pub job_id: &'a JobId,
    pub processor: &'a str,
    pub elapsed: Duration,
    pub diagnostic: Option<&'a str>,
}

impl Display for ProcessingFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.diagnostic {
            None => write!(
                f,
                "Job {} ({}) succeeded in {:.2}s",
                self.job_id,
                self.processor,
                self.elapsed.as_secs_f64()
            ),
            Some(diagnostic) => write!(
                f,
                "Job {} ({}) failed after {:.2}s: {}",
                self.job_id,
                self.processor,
                self.elapsed.as_secs_f64(),
                diagnostic
            ),
        }
    }
}

impl StructuredLog for ProcessingFinished<'_> {
    fn log(&self) {
        let elapsed_ms = self.elapsed.as_millis() as u64;
        match self.diagnostic {
            None => tracing::info!(
                job_id = %self.job_id,
                processor = self.processor,
                elapsed_ms,
                "{}", self
            ),
            Some(diagnostic) => tracing::warn!(
                job_id = %self.job_id,
                processor = self.processor,
                elapsed_ms,
                diagnostic,
                "{}", self
            ),
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "processing",
            span_name = name,
            job_id = %self.job_id,
            processor = self.processor,
        )
    }
}

/// A dispatch message could not be decoded; it is dropped.
///
/// # Log Level
/// `error!`
pub struct MalformedDispatch<'a> {
    pub queue: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for MalformedDispatch<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dropping malformed message on {}: {}",
            self.queue, self.error
        )
    }
}

impl StructuredLog for MalformedDispatch<'_> {
    fn log(&self) {
        tracing::error!(queue = self.queue, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("worker", span_name = name, queue = self.queue)
    }
}
