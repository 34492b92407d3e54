// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for configuration loading and validation.

use crate::errors::ValidationError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// One structural problem in the configuration document.
///
/// # Log Level
/// `error!` - The broker refuses to start
///
/// # Example
/// ```
/// use processing_broker::errors::ValidationError;
/// use processing_broker::observability::messages::validation::ConfigProblem;
/// use processing_broker::observability::messages::StructuredLog;
///
/// let problem = ValidationError::MissingField { path: "$.hosts".to_string() };
/// ConfigProblem { problem: &problem }.log();
/// ```
pub struct ConfigProblem<'a> {
    pub problem: &'a ValidationError,
}

impl Display for ConfigProblem<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Configuration problem: {}", self.problem)
    }
}

impl StructuredLog for ConfigProblem<'_> {
    fn log(&self) {
        tracing::error!(path = self.problem.path(), "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("config", span_name = name, path = self.problem.path())
    }
}

/// Validation finished with `problems` findings.
///
/// # Log Level
/// `error!` when anything was found, `info!` otherwise
pub struct ConfigValidated<'a> {
    pub source: &'a str,
    pub problems: usize,
}

impl Display for ConfigValidated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.problems == 0 {
            write!(f, "Configuration {} is valid", self.source)
        } else {
            write!(
                f,
                "Configuration {} has {} problem(s)",
                self.source, self.problems
            )
        }
    }
}

impl StructuredLog for ConfigValidated<'_> {
    fn log(&self) {
        if self.problems == 0 {
            tracing::info!(source = self.source, "{}", self);
        } else {
            tracing::error!(source = self.source, problems = self.problems, "{}", self);
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("config", span_name = name, source = self.source)
    }
}
