// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message channel implementations.
//!
//! * [`NatsChannel`] - NATS JetStream: durable stream, durable pull consumers,
//!   explicit acknowledgement
//! * [`InMemoryChannel`] - process-local queues with the same delivery contract,
//!   used by tests and single-process setups
//!
//! Both retry publishes with exponential backoff while the broker is unreachable
//! and drop a message after [`MAX_DELIVERY_ATTEMPTS`] failed deliveries.

mod memory;
pub mod messages;
mod nats;

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};

use crate::config::consts::{
    DEFAULT_PUBLISH_ATTEMPTS, DEFAULT_PUBLISH_BACKOFF_MS, MAX_DELIVERY_ATTEMPTS,
};
use crate::config::TimeoutConfig;
use crate::errors::ChannelError;
use crate::observability::messages::channel::ChannelRetrying;
use crate::observability::messages::StructuredLog;

pub use memory::InMemoryChannel;
pub use messages::{DispatchMessage, StatusMessage};
pub use nats::{NatsChannel, NatsConnector};

/// Bounds on publish retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub min_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_PUBLISH_ATTEMPTS,
            min_delay: Duration::from_millis(DEFAULT_PUBLISH_BACKOFF_MS),
        }
    }
}

impl From<&TimeoutConfig> for RetryPolicy {
    fn from(timeouts: &TimeoutConfig) -> Self {
        Self {
            attempts: timeouts.publish_attempts.max(1),
            min_delay: timeouts.publish_backoff(),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_times(self.attempts.saturating_sub(1))
    }
}

/// Run `attempt` until it succeeds, fails permanently, or the policy is exhausted.
pub(crate) async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    attempt: F,
) -> Result<T, ChannelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChannelError>>,
{
    attempt
        .retry(policy.backoff())
        .when(ChannelError::is_transient)
        .notify(|error: &ChannelError, delay: Duration| {
            ChannelRetrying {
                operation,
                delay,
                error,
            }
            .log()
        })
        .await
}

/// Whether a message delivered `deliveries` times may be delivered again
pub(crate) fn may_redeliver(deliveries: u32) -> bool {
    deliveries < MAX_DELIVERY_ATTEMPTS
}
