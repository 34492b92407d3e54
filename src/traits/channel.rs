use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{QueueConfig, TimeoutConfig};
use crate::errors::ChannelError;

/// Publish/consume contract over a durable, at-least-once queue.
///
/// Implementations own reconnection and publish retries. A publish that returns
/// `Ok` has been durably enqueued; a publish that cannot reach the broker fails
/// with [`ChannelError::Unavailable`] and is never dropped silently.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    async fn publish(&self, queue: &str, message: Vec<u8>) -> Result<(), ChannelError>;

    /// Start delivering messages of `queue` to `handler`.
    ///
    /// A message is acknowledged only after the handler returns `Ok`; otherwise
    /// it is redelivered, up to the channel's delivery bound.
    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<ConsumerHandle, ChannelError>;
}

/// Receives delivered messages. Must be idempotent per job id.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()>;
}

/// Opens a [`MessageChannel`] to the configured message broker.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(
        &self,
        queue: &QueueConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<Arc<dyn MessageChannel>, ChannelError>;
}

/// A running consumer; stopping it lets the in-flight delivery finish first.
#[derive(Debug)]
pub struct ConsumerHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ConsumerHandle {
    pub fn new(token: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { token, task }
    }

    pub async fn stop(self) {
        self.token.cancel();
        let _ = self.task.await;
    }
}
