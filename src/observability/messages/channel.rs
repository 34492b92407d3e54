// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the message channel: connections, publish retries,
//! consumer lifecycle and redelivery.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Connected to the message broker and ensured the durable stream exists.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ChannelConnected<'a> {
    pub url: &'a str,
    pub stream: &'a str,
}

impl Display for ChannelConnected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Connected to {} (stream {})", self.url, self.stream)
    }
}

impl StructuredLog for ChannelConnected<'_> {
    fn log(&self) {
        tracing::info!(url = self.url, stream = self.stream, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "channel",
            span_name = name,
            url = self.url,
            stream = self.stream,
        )
    }
}

/// A transient channel failure; the operation is retried after `delay`.
///
/// # Log Level
/// `warn!` - Degraded but recoverable
///
/// # Example
/// ```
/// use processing_broker::errors::ChannelError;
/// use processing_broker::observability::messages::channel::ChannelRetrying;
/// use std::time::Duration;
///
/// let error = ChannelError::Unavailable("connection refused".to_string());
/// let msg = ChannelRetrying {
///     operation: "publish to ocrd-dummy",
///     delay: Duration::from_millis(400),
///     error: &error,
/// };
///
/// tracing::warn!("{}", msg);
/// ```
pub struct ChannelRetrying<'a> {
    pub operation: &'a str,
    pub delay: Duration,
    pub error: &'a dyn std::error::Error,
}

impl Display for ChannelRetrying<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to {}, retrying in {:.2}s: {}",
            self.operation,
            self.delay.as_secs_f64(),
            self.error
        )
    }
}

impl StructuredLog for ChannelRetrying<'_> {
    fn log(&self) {
        tracing::warn!(
            operation = self.operation,
            delay_ms = self.delay.as_millis() as u64,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("channel", span_name = name, operation = self.operation)
    }
}

/// # Log Level
/// `info!`
pub struct ConsumerStarted<'a> {
    pub queue: &'a str,
}

impl Display for ConsumerStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Consuming from queue '{}'", self.queue)
    }
}

impl StructuredLog for ConsumerStarted<'_> {
    fn log(&self) {
        tracing::info!(queue = self.queue, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("consumer", span_name = name, queue = self.queue)
    }
}

/// A handler rejected a message; it will be delivered again.
///
/// # Log Level
/// `warn!` - Degraded but recoverable
pub struct DeliveryFailed<'a> {
    pub queue: &'a str,
    pub deliveries: u32,
    pub error: &'a dyn std::error::Error,
}

impl Display for DeliveryFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Handler on '{}' failed (delivery {}), message will be redelivered: {}",
            self.queue, self.deliveries, self.error
        )
    }
}

impl StructuredLog for DeliveryFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            queue = self.queue,
            deliveries = self.deliveries,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "consumer",
            span_name = name,
            queue = self.queue,
            deliveries = self.deliveries,
        )
    }
}

/// A message exhausted its delivery attempts and was discarded.
///
/// # Log Level
/// `error!` - Data loss requiring attention
pub struct MessageDropped<'a> {
    pub queue: &'a str,
    pub deliveries: u32,
    pub error: &'a dyn std::error::Error,
}

impl Display for MessageDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dropping message on '{}' after {} failed deliveries: {}",
            self.queue, self.deliveries, self.error
        )
    }
}

impl StructuredLog for MessageDropped<'_> {
    fn log(&self) {
        tracing::error!(
            queue = self.queue,
            deliveries = self.deliveries,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "consumer",
            span_name = name,
            queue = self.queue,
            deliveries = self.deliveries,
        )
    }
}

/// The consumer's message stream reported an error; the client is reconnecting.
///
/// # Log Level
/// `warn!`
pub struct StreamError<'a> {
    pub queue: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for StreamError<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Message stream for '{}' failed: {}", self.queue, self.error)
    }
}

impl StructuredLog for StreamError<'_> {
    fn log(&self) {
        tracing::warn!(queue = self.queue, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("consumer", span_name = name, queue = self.queue)
    }
}

/// # Log Level
/// `warn!` - The server will redeliver after the ack wait
pub struct AckFailed<'a> {
    pub queue: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for AckFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Failed to acknowledge message on '{}': {}", self.queue, self.error)
    }
}

impl StructuredLog for AckFailed<'_> {
    fn log(&self) {
        tracing::warn!(queue = self.queue, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("consumer", span_name = name, queue = self.queue)
    }
}
