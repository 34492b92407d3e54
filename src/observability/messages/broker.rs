// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the broker service: startup, admission, status reports
//! and shutdown.

use crate::observability::messages::StructuredLog;
use crate::registry::JobId;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// The broker finished startup and accepts requests.
///
/// # Log Level
/// `info!` - Important operational event
pub struct BrokerStarted<'a> {
    pub queue_url: &'a str,
    pub agents: usize,
    pub processors: &'a [String],
}

impl Display for BrokerStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Processing broker started with {} agent(s) on {}, serving {}",
            self.agents,
            self.queue_url,
            self.processors.join(", ")
        )
    }
}

impl StructuredLog for BrokerStarted<'_> {
    fn log(&self) {
        tracing::info!(
            queue_url = self.queue_url,
            agents = self.agents,
            processors = self.processors.join(","),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("broker", span_name = name, queue_url = self.queue_url)
    }
}

/// # Log Level
/// `info!`
pub struct HttpListening<'a> {
    pub address: &'a str,
}

impl Display for HttpListening<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Listening on http://{}", self.address)
    }
}

impl StructuredLog for HttpListening<'_> {
    fn log(&self) {
        tracing::info!(address = self.address, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("broker", span_name = name, address = self.address)
    }
}

/// A single-processor job was admitted and published.
///
/// # Log Level
/// `info!`
pub struct JobSubmitted<'a> {
    pub job_id: &'a JobId,
    pub processor: &'a str,
}

impl Display for JobSubmitted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Job {} submitted to {}", self.job_id, self.processor)
    }
}

impl StructuredLog for JobSubmitted<'_> {
    fn log(&self) {
        tracing::info!(job_id = %self.job_id, processor = self.processor, "{}", self);
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

/// A job could not be handed to the channel and was marked failed.
///
/// # Log Level
/// `error!`
pub struct DispatchFailed<'a> {
    pub job_id: &'a JobId,
    pub processor: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for DispatchFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to dispatch job {} to {}: {}",
            self.job_id, self.processor, self.error
        )
    }
}

impl StructuredLog for DispatchFailed<'_> {
    fn log(&self) {
        tracing::error!(
            job_id = %self.job_id,
            processor = self.processor,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("job", span_name = name, job_id = %self.job_id)
    }
}

/// A status report could not be applied and was acknowledged anyway.
///
/// # Log Level
/// `warn!`
pub struct StatusReportIgnored<'a> {
    pub error: &'a dyn std::error::Error,
}

impl Display for StatusReportIgnored<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Ignoring status report: {}", self.error)
    }
}

impl StructuredLog for StatusReportIgnored<'_> {
    fn log(&self) {
        tracing::warn!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("status", span_name = name)
    }
}

/// # Log Level
/// `info!`
pub struct BrokerStopping;

impl Display for BrokerStopping {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Stopping processing broker")
    }
}

impl StructuredLog for BrokerStopping {
    fn log(&self) {
        tracing::info!("{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("broker", span_name = name)
    }
}

/// Shutdown left agents running; the process still exits normally.
///
/// # Log Level
/// `error!`
pub struct ShutdownIncomplete<'a> {
    pub error: &'a dyn std::error::Error,
}

impl Display for ShutdownIncomplete<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Shutdown incomplete: {}", self.error)
    }
}

impl StructuredLog for ShutdownIncomplete<'_> {
    fn log(&self) {
        tracing::error!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("broker", span_name = name)
    }
}
