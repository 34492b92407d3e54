// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use async_nats::connection::State;
use async_nats::jetstream::consumer::{pull, AckPolicy, PullConsumer};
use async_nats::jetstream::{self, stream, AckKind};
use async_nats::{Client, ConnectOptions};
use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::{may_redeliver, retry_transient, RetryPolicy};
use crate::config::consts::{CONSUMER_ACK_WAIT_SECONDS, MAX_DELIVERY_ATTEMPTS, SUBJECT_PREFIX};
use crate::config::{QueueConfig, TimeoutConfig};
use crate::errors::ChannelError;
use crate::observability::messages::channel::{
    AckFailed, ChannelConnected, ConsumerStarted, DeliveryFailed, MessageDropped, StreamError,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{ChannelConnector, ConsumerHandle, MessageChannel, MessageHandler};

/// NATS JetStream implementation of the channel contract.
///
/// Every queue is a subject below `ocrd.processing` in one durable work-queue
/// stream. Consumers are durable pull consumers named after their queue, so
/// competing agents of the same processor share one consumer and each message
/// goes to exactly one of them. The client reconnects on its own; publishes
/// made while it is disconnected fail fast and are retried.
pub struct NatsChannel {
    client: Client,
    jetstream: jetstream::Context,
    stream: stream::Stream,
    retry: RetryPolicy,
}

impl NatsChannel {
    pub async fn connect(
        url: &str,
        username: &str,
        password: &str,
        stream_name: &str,
        retry: RetryPolicy,
    ) -> Result<Self, ChannelError> {
        let operation = format!("connect to {}", url);
        let client = retry_transient(&retry, &operation, move || async move {
            ConnectOptions::with_user_and_password(username.to_string(), password.to_string())
                .name("processing-broker")
                .connection_timeout(Duration::from_secs(5))
                .connect(url)
                .await
                .map_err(|e| ChannelError::Unavailable(format!("{}: {}", url, e)))
        })
        .await?;

        let jetstream = jetstream::new(client.clone());
        let stream = jetstream
            .get_or_create_stream(stream::Config {
                name: stream_name.to_string(),
                subjects: vec![format!("{}.>", SUBJECT_PREFIX)],
                retention: stream::RetentionPolicy::WorkQueue,
                ..Default::default()
            })
            .await
            .map_err(|e| ChannelError::Unavailable(format!("stream {}: {}", stream_name, e)))?;

        ChannelConnected {
            url,
            stream: stream_name,
        }
        .log();

        Ok(Self {
            client,
            jetstream,
            stream,
            retry,
        })
    }

    async fn try_publish(&self, queue: &str, message: &[u8]) -> Result<(), ChannelError> {
        if !matches!(self.client.connection_state(), State::Connected) {
            return Err(ChannelError::Unavailable(
                "not connected to the message broker".to_string(),
            ));
        }

        let ack = self
            .jetstream
            .publish(subject(queue), message.to_vec().into())
            .await
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;
        ack.await
            .map_err(|e| ChannelError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

fn subject(queue: &str) -> String {
    format!("{}.{}", SUBJECT_PREFIX, queue)
}

/// Durable pull consumer shared by every agent serving `queue`
fn consumer_config(queue: &str) -> pull::Config {
    let durable = durable_name(queue);
    pull::Config {
        durable_name: Some(durable),
        filter_subject: subject(queue),
        ack_policy: AckPolicy::Explicit,
        ack_wait: Duration::from_secs(CONSUMER_ACK_WAIT_SECONDS),
        max_deliver: i64::from(MAX_DELIVERY_ATTEMPTS),
        ..Default::default()
    }
}

/// Consumer names may not contain subject delimiters or wildcards
fn durable_name(queue: &str) -> String {
    queue
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' | ' ' => '_',
            other => other,
        })
        .collect()
}

#[async_trait]
impl MessageChannel for NatsChannel {
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
        let durable = durable_name(queue);
        let consumer_error = |e: &dyn std::fmt::Display| ChannelError::Consumer {
            queue: queue.to_string(),
            reason: e.to_string(),
        };

        let consumer: PullConsumer = self
            .stream
            .get_or_create_consumer(&durable, consumer_config(queue))
            .await
            .map_err(|e| consumer_error(&e))?;
        let mut messages = consumer.messages().await.map_err(|e| consumer_error(&e))?;

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let name = queue.to_string();
        ConsumerStarted { queue: &name }.log();

        let task = tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = cancelled.cancelled() => break,
                    next = messages.next() => next,
                };
                let message = match next {
                    Some(Ok(message)) => message,
                    Some(Err(error)) => {
                        StreamError {
                            queue: &name,
                            error: &error,
                        }
                        .log();
                        tokio::time::sleep(Duration::from_millis(250)).await;
                        continue;
                    }
                    None => break,
                };

                let deliveries = message
                    .info()
                    .map(|info| u32::try_from(info.delivered).unwrap_or(u32::MAX))
                    .unwrap_or(1);

                let acknowledgement = match handler.handle(&message.payload).await {
                    Ok(()) => message.ack().await,
                    Err(error) if may_redeliver(deliveries) => {
                        DeliveryFailed {
                            queue: &name,
                            deliveries,
                            error: &*error,
                        }
                        .log();
                        message.ack_with(AckKind::Nak(None)).await
                    }
                    Err(error) => {
                        MessageDropped {
                            queue: &name,
                            deliveries,
                            error: &*error,
                        }
                        .log();
                        message.ack_with(AckKind::Term).await
                    }
                };
                if let Err(error) = acknowledgement {
                    AckFailed {
                        queue: &name,
                        error: &*error,
                    }
                    .log();
                }
            }
        });

        Ok(ConsumerHandle::new(token, task))
    }
}

/// Connects the broker to the NATS server named in the configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NatsConnector;

#[async_trait]
impl ChannelConnector for NatsConnector {
    async fn connect(
        &self,
        queue: &QueueConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<Arc<dyn MessageChannel>, ChannelError> {
        let channel = NatsChannel::connect(
            &queue.url(),
            &queue.credentials.username,
            &queue.credentials.password,
            queue.stream(),
            RetryPolicy::from(timeouts),
        )
        .await?;
        Ok(Arc::new(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queues_map_to_subjects_below_prefix() {
        assert_eq!(subject("ocrd-dummy"), "ocrd.processing.ocrd-dummy");
    }

    #[test]
    fn consumers_ack_explicitly_and_bound_redelivery() {
        let config = consumer_config("ocrd.dummy");
        assert_eq!(config.durable_name.as_deref(), Some("ocrd_dummy"));
        assert_eq!(config.filter_subject, "ocrd.processing.ocrd.dummy");
        assert!(matches!(config.ack_policy, AckPolicy::Explicit));
        assert_eq!(config.max_deliver, i64::from(MAX_DELIVERY_ATTEMPTS));
        assert_eq!(
            config.ack_wait,
            Duration::from_secs(CONSUMER_ACK_WAIT_SECONDS)
        );
    }

    #[test]
    fn durable_names_avoid_delimiters() {
        assert_eq!(durable_name("ocrd-dummy"), "ocrd-dummy");
        assert_eq!(durable_name("a.b*c>d e"), "a_b_c_d_e");
    }
}
