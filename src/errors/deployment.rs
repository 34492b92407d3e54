// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for agent launch and teardown.

use std::time::Duration;

use thiserror::Error;

/// A launcher could not start or stop one agent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LaunchError {
    #[error("Failed to spawn '{program}': {reason}")]
    Spawn { program: String, reason: String },

    #[error("'{program}' exited with status {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("Agent did not report a usable handle: {0}")]
    MissingHandle(String),

    #[error("Timed out after {after:?}")]
    Timeout { after: Duration },
}

/// One agent that could not be stopped during teardown.
#[derive(Debug, Clone, PartialEq)]
pub struct TeardownFailure {
    pub agent: String,
    pub reason: String,
}

/// Errors surfaced by the deployer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeploymentError {
    /// An agent failed to start. Every agent started earlier in the same call has
    /// already been torn down; `rollback_failures` lists any that resisted.
    #[error("Failed to start {agent}: {source}{}", format_rollback(.rollback_failures))]
    AgentStartFailed {
        agent: String,
        #[source]
        source: LaunchError,
        rollback_failures: Vec<TeardownFailure>,
    },

    /// Teardown finished but some agents could not be stopped.
    #[error("Failed to stop {} agent(s): {}", .0.len(), format_failures(.0))]
    TeardownFailed(Vec<TeardownFailure>),
}

fn format_failures(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.agent, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_rollback(failures: &[TeardownFailure]) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        format!("; rollback left agents running: {}", format_failures(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_keeps_sub_second_precision() {
        let cases = vec![
            (Duration::from_millis(50), "Timed out after 50ms"),
            (Duration::from_millis(1500), "Timed out after 1.5s"),
            (Duration::from_secs(10), "Timed out after 10s"),
        ];

        for (after, expected) in cases {
            assert_eq!(LaunchError::Timeout { after }.to_string(), expected);
        }
    }

    #[test]
    fn teardown_error_names_every_agent() {
        let err = DeploymentError::TeardownFailed(vec![
            TeardownFailure {
                agent: "worker ocrd-dummy@host-a".to_string(),
                reason: "Timed out after 10s".to_string(),
            },
            TeardownFailure {
                agent: "broker@host-b".to_string(),
                reason: "connection refused".to_string(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to stop 2 agent(s)"));
        assert!(msg.contains("worker ocrd-dummy@host-a (Timed out after 10s)"));
        assert!(msg.contains("broker@host-b (connection refused)"));
    }

    #[test]
    fn start_error_without_rollback_failures_is_terse() {
        let err = DeploymentError::AgentStartFailed {
            agent: "broker@localhost".to_string(),
            source: LaunchError::Spawn {
                program: "docker".to_string(),
                reason: "not found".to_string(),
            },
            rollback_failures: vec![],
        };
        assert_eq!(
            err.to_string(),
            "Failed to start broker@localhost: Failed to spawn 'docker': not found"
        );
    }
}
