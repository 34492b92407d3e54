// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Service-level errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use super::{
    ChannelError, ConfigError, DeploymentError, RegistryError, ResourceError, WorkflowError,
};

/// Every error the broker service can return, at startup or per request.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Deployment(#[from] DeploymentError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// The requested processor is not served by any deployed worker
    #[error("Processor '{0}' is not deployed")]
    UnknownProcessor(String),

    /// The request is structurally wrong
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrokerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            BrokerError::Registry(RegistryError::NotFound { .. }) => StatusCode::NOT_FOUND,
            BrokerError::Registry(RegistryError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            BrokerError::UnknownProcessor(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BrokerError::InvalidRequest(_) | BrokerError::Workflow(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            BrokerError::Channel(_) => StatusCode::SERVICE_UNAVAILABLE,
            BrokerError::Resource(ResourceError::NotFound { .. }) => StatusCode::NOT_FOUND,
            BrokerError::Resource(ResourceError::Download { .. }) => StatusCode::BAD_GATEWAY,
            BrokerError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                StatusCode::NOT_FOUND
            }
            BrokerError::Config(_)
            | BrokerError::Deployment(_)
            | BrokerError::Resource(_)
            | BrokerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "detail": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::JobState;

    #[test]
    fn status_codes_follow_error_kind() {
        let cases: Vec<(BrokerError, StatusCode)> = vec![
            (
                RegistryError::job_not_found("abc").into(),
                StatusCode::NOT_FOUND,
            ),
            (
                RegistryError::InvalidTransition {
                    id: "abc".to_string(),
                    from: JobState::Success,
                    to: JobState::Running,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                BrokerError::UnknownProcessor("ocrd-nope".to_string()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ChannelError::Unavailable("down".to_string()).into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                DeploymentError::TeardownFailed(vec![]).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "wrong status for {}", err);
        }
    }
}
