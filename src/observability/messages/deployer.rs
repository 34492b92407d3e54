// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for agent deployment and teardown.

use crate::deployer::AgentHandle;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// About to start an agent.
///
/// # Log Level
/// `info!` - Important operational event
pub struct AgentStarting<'a> {
    pub agent: &'a str,
}

impl Display for AgentStarting<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Starting {}", self.agent)
    }
}

impl StructuredLog for AgentStarting<'_> {
    fn log(&self) {
        tracing::info!(agent = self.agent, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("agent", span_name = name, agent = self.agent)
    }
}

/// Agent is up and tracked.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use processing_broker::deployer::AgentHandle;
/// use processing_broker::observability::messages::deployer::AgentStarted;
///
/// let handle = AgentHandle::Process { pid: 4711 };
/// let msg = AgentStarted {
///     agent: "worker ocrd-dummy@localhost",
///     handle: &handle,
/// };
///
/// assert_eq!(msg.to_string(), "Started worker ocrd-dummy@localhost (pid 4711)");
/// ```
pub struct AgentStarted<'a> {
    pub agent: &'a str,
    pub handle: &'a AgentHandle,
}

impl Display for AgentStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Started {} ({})", self.agent, self.handle)
    }
}

impl StructuredLog for AgentStarted<'_> {
    fn log(&self) {
        tracing::info!(agent = self.agent, handle = %self.handle, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "agent",
            span_name = name,
            agent = self.agent,
            handle = %self.handle,
        )
    }
}

/// Agent failed to start; a rollback follows.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct AgentStartFailed<'a> {
    pub agent: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for AgentStartFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Failed to start {}: {}", self.agent, self.error)
    }
}

impl StructuredLog for AgentStartFailed<'_> {
    fn log(&self) {
        tracing::error!(agent = self.agent, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("agent", span_name = name, agent = self.agent)
    }
}

/// Agents started by a failed deployment were stopped again.
///
/// # Log Level
/// `warn!` - Deployment left clean (or nearly clean) after a failure
pub struct DeploymentRolledBack<'a> {
    pub agent: &'a str,
    pub leftover: usize,
}

impl Display for DeploymentRolledBack<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.leftover == 0 {
            write!(f, "Rolled back deployment after {} failed", self.agent)
        } else {
            write!(
                f,
                "Rolled back deployment after {} failed; {} agent(s) could not be stopped",
                self.agent, self.leftover
            )
        }
    }
}

impl StructuredLog for DeploymentRolledBack<'_> {
    fn log(&self) {
        tracing::warn!(agent = self.agent, leftover = self.leftover, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "rollback",
            span_name = name,
            agent = self.agent,
            leftover = self.leftover,
        )
    }
}

/// # Log Level
/// `info!`
pub struct AgentStopped<'a> {
    pub agent: &'a str,
}

impl Display for AgentStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Stopped {}", self.agent)
    }
}

impl StructuredLog for AgentStopped<'_> {
    fn log(&self) {
        tracing::info!(agent = self.agent, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("agent", span_name = name, agent = self.agent)
    }
}

/// Agent could not be stopped (error or timeout); teardown continues.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct AgentStopFailed<'a> {
    pub agent: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for AgentStopFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Failed to stop {}: {}", self.agent, self.error)
    }
}

impl StructuredLog for AgentStopFailed<'_> {
    fn log(&self) {
        tracing::error!(agent = self.agent, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("agent", span_name = name, agent = self.agent)
    }
}

/// `kill_all` found nothing to stop.
///
/// # Log Level
/// `debug!`
pub struct NothingToStop;

impl Display for NothingToStop {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "No deployed agents to stop")
    }
}

impl StructuredLog for NothingToStop {
    fn log(&self) {
        tracing::debug!("{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("teardown", span_name = name)
    }
}
