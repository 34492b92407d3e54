// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use thiserror::Error;

/// A single structural problem found while checking a raw configuration document.
///
/// Every variant carries the JSON-path style location of the offending field
/// (for example `$.hosts[0].workers[1].name`) so operators can fix the file without
/// guessing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A field required by the schema is absent
    #[error("Missing required field. At {path}")]
    MissingField { path: String },

    /// A field is present but has the wrong YAML type
    #[error("Expected {expected}. At {path}")]
    InvalidType {
        path: String,
        expected: &'static str,
    },

    /// A field has the right type but an unacceptable value
    #[error("{reason}. At {path}")]
    InvalidValue { path: String, reason: String },

    /// A field the schema does not know about
    #[error("Unknown field. At {path}")]
    UnknownField { path: String },
}

impl ValidationError {
    /// Location of the offending field
    pub fn path(&self) -> &str {
        match self {
            ValidationError::MissingField { path }
            | ValidationError::InvalidType { path, .. }
            | ValidationError::InvalidValue { path, .. }
            | ValidationError::UnknownField { path } => path,
        }
    }
}

/// Errors raised while loading configuration at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// The document does not satisfy the schema; all problems are listed.
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display_includes_path() {
        let err = ValidationError::InvalidValue {
            path: "$.hosts[0].workers[0].number_of_instance".to_string(),
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "must be at least 1. At $.hosts[0].workers[0].number_of_instance"
        );
        assert_eq!(err.path(), "$.hosts[0].workers[0].number_of_instance");
    }

    #[test]
    fn config_error_lists_every_validation_problem() {
        let err = ConfigError::Validation(vec![
            ValidationError::MissingField {
                path: "$.process_queue".to_string(),
            },
            ValidationError::UnknownField {
                path: "$.extra".to_string(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("Missing required field. At $.process_queue"));
        assert!(msg.contains("Unknown field. At $.extra"));
    }
}
