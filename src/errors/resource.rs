// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors raised by the resource adapter.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Resource '{name}' of {executable} not found")]
    NotFound { executable: String, name: String },

    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    /// The user resource database exists but cannot be read
    #[error("Resource database {path} is invalid: {reason}")]
    InvalidDatabase { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
