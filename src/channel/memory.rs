// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

use super::{may_redeliver, retry_transient, RetryPolicy};
use crate::errors::ChannelError;
use crate::observability::messages::channel::{ConsumerStarted, DeliveryFailed, MessageDropped};
use crate::observability::messages::StructuredLog;
use crate::traits::{ConsumerHandle, MessageChannel, MessageHandler};

/// Process-local implementation of the channel contract.
///
/// Messages published before any consumer exists stay queued. Competing
/// consumers on one queue share its messages. A handler error puts the message
/// back at the end of its queue until the delivery bound is reached.
///
/// [`set_available`](Self::set_available) simulates a broker outage: publishes
/// fail with [`ChannelError::Unavailable`] once retries are exhausted.
pub struct InMemoryChannel {
    queues: Mutex<HashMap<String, Arc<MemoryQueue>>>,
    available: AtomicBool,
    retry: RetryPolicy,
}

#[derive(Default)]
struct MemoryQueue {
    pending: Mutex<VecDeque<Envelope>>,
    ready: Notify,
}

struct Envelope {
    payload: Vec<u8>,
    deliveries: u32,
}

impl MemoryQueue {
    async fn push(&self, envelope: Envelope) {
        self.pending.lock().await.push_back(envelope);
        self.ready.notify_one();
    }

    async fn next(&self) -> Envelope {
        loop {
            if let Some(envelope) = self.pending.lock().await.pop_front() {
                return envelope;
            }
            self.ready.notified().await;
        }
    }
}

impl Default for InMemoryChannel {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl InMemoryChannel {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
            retry,
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Messages waiting in `queue`
    pub async fn pending(&self, queue: &str) -> usize {
        self.queue(queue).await.pending.lock().await.len()
    }

    /// Remove and return every message waiting in `queue`
    pub async fn drain(&self, queue: &str) -> Vec<Vec<u8>> {
        self.queue(queue)
            .await
            .pending
            .lock()
            .await
            .drain(..)
            .map(|envelope| envelope.payload)
            .collect()
    }

    async fn queue(&self, name: &str) -> Arc<MemoryQueue> {
        self.queues
            .lock()
            .await
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    async fn try_publish(&self, queue: &str, message: &[u8]) -> Result<(), ChannelError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable(
                "in-memory broker is offline".to_string(),
            ));
        }
        self.queue(queue)
            .await
            .push(Envelope {
                payload: message.to_vec(),
                deliveries: 0,
            })
            .await;
        Ok(())
    }
}

#[async_trait]
impl MessageChannel for InMemoryChannel {
    async fn publish(&self, queue: &str, message: Vec<u8>) -> Result<(), ChannelError> {
        let message: &[u8] = &message;
        let operation = format!("publish to {}", queue);
        retry_transient(&self.retry, &operation, move || async move {
            self.try_publish(queue, message).await
        })
        .await
    }

    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<ConsumerHandle, ChannelError> {
        let memory_queue = self.queue(queue).await;
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let name = queue.to_string();

        ConsumerStarted { queue: &name }.log();

        let task = tokio::spawn(async move {
            loop {
                let mut envelope = tokio::select! {
                    _ = cancelled.cancelled() => break,
                    envelope = memory_queue.next() => envelope,
                };
                envelope.deliveries += 1;

                if let Err(error) = handler.handle(&envelope.payload).await {
                    if may_redeliver(envelope.deliveries) {
                        DeliveryFailed {
                            queue: &name,
                            deliveries: envelope.deliveries,
                            error: &*error,
                        }
                        .log();
                        memory_queue.push(envelope).await;
                    } else {
                        MessageDropped {
                            queue: &name,
                            deliveries: envelope.deliveries,
                            error: &*error,
                        }
                        .log();
                    }
                }
            }
        });

        Ok(ConsumerHandle::new(token, task))
    }
}
