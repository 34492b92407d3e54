// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors raised by message channel implementations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelError {
    /// The broker connection is down or refused the operation. Transient: callers
    /// see this only after the channel has exhausted its retries.
    #[error("Message broker unavailable: {0}")]
    Unavailable(String),

    /// A message could not be encoded or decoded
    #[error("Malformed message: {0}")]
    Encoding(String),

    /// A consumer could not be registered on the queue
    #[error("Failed to consume from queue '{queue}': {reason}")]
    Consumer { queue: String, reason: String },
}

impl ChannelError {
    /// Whether retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ChannelError::Unavailable(_))
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        ChannelError::Encoding(err.to_string())
    }
}
