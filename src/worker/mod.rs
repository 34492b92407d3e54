// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Processing worker runtime.
//!
//! A worker consumes the queue of every processor it serves. For each
//! dispatch message it reports `running`, runs the processor, and reports
//! `success` or `failed` on the message's result queue. The dispatch message
//! is acknowledged only after the final report was published, so a worker
//! that dies mid-job leaves the message for redelivery.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::channel::{DispatchMessage, StatusMessage};
use crate::config::ProcessorMap;
use crate::errors::ChannelError;
use crate::observability::messages::worker::{
    MalformedDispatch, ProcessingFinished, ProcessingStarted, WorkerStarted,
};
use crate::observability::messages::StructuredLog;
use crate::registry::JobState;
use crate::traits::{ConsumerHandle, MessageChannel, MessageHandler, Processor, ProcessorResponse};

pub struct ProcessingWorker {
    channel: Arc<dyn MessageChannel>,
    processors: ProcessorMap,
}

impl ProcessingWorker {
    pub fn new(channel: Arc<dyn MessageChannel>, processors: ProcessorMap) -> Self {
        Self {
            channel,
            processors,
        }
    }

    /// Register one consumer per served processor queue.
    pub async fn start(&self) -> Result<Vec<ConsumerHandle>, ChannelError> {
        let mut names: Vec<String> = self.processors.keys().cloned().collect();
        names.sort();

        let mut consumers = Vec::with_capacity(names.len());
        for (name, processor) in names.iter().filter_map(|n| self.processors.get(n).map(|p| (n, p))) {
            let handler = Arc::new(JobHandler {
                queue: name.clone(),
                processor: processor.clone(),
                channel: self.channel.clone(),
            });
            match self.channel.consume(name, handler).await {
                Ok(consumer) => consumers.push(consumer),
                Err(error) => {
                    for consumer in consumers {
                        consumer.stop().await;
                    }
                    return Err(error);
                }
            }
        }

        WorkerStarted { processors: &names }.log();
        Ok(consumers)
    }

    /// Serve until `shutdown` resolves, then let in-flight jobs finish.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> Result<(), ChannelError> {
        let consumers = self.start().await?;
        shutdown.await;
        for consumer in consumers {
            consumer.stop().await;
        }
        Ok(())
    }
}

struct JobHandler {
    queue: String,
    processor: Arc<dyn Processor>,
    channel: Arc<dyn MessageChannel>,
}

impl JobHandler {
    async fn report(
        &self,
        message: &DispatchMessage,
        state: JobState,
        diagnostic: Option<String>,
    ) -> Result<(), ChannelError> {
        let status = StatusMessage::new(message.job_id, state, diagnostic).encode()?;
        self.channel.publish(&message.result_queue, status).await
    }
}

#[async_trait]
impl MessageHandler for JobHandler {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()> {
        let message = match DispatchMessage::decode(payload) {
            Ok(message) => message,
            Err(error) => {
                // Redelivery cannot fix a malformed message.
                MalformedDispatch {
                    queue: &self.queue,
                    error: &error,
                }
                .log();
                return Ok(());
            }
        };

        self.report(&message, JobState::Running, None).await?;
        ProcessingStarted {
            job_id: &message.job_id,
            processor: self.processor.name(),
            page_id: message.page_id.as_deref(),
        }
        .log();

        let started = Instant::now();
        let diagnostic = match self.processor.process(message.to_request()).await {
            ProcessorResponse::Success => None,
            ProcessorResponse::Failure { diagnostic } => Some(diagnostic),
        };
        ProcessingFinished {
            job_id: &message.job_id,
            processor: self.processor.name(),
            elapsed: started.elapsed(),
            diagnostic: diagnostic.as_deref(),
        }
        .log();

        let state = if diagnostic.is_none() {
            JobState::Success
        } else {
            JobState::Failed
        };
        self.report(&message, state, diagnostic).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::{FailingProcessor, StubProcessor};
    use crate::channel::InMemoryChannel;
    use crate::config::consts::STATUS_QUEUE;
    use crate::registry::{Job, JobKind, JobRequest, Registry};
    use std::path::PathBuf;
    use std::time::Duration;

    fn job(registry: &Registry, processor: &str, page: Option<&str>) -> Job {
        registry.create(
            JobRequest {
                processor_name: processor.to_string(),
                path_to_mets: PathBuf::from("/ws/mets.xml"),
                input_file_groups: vec!["OCR-D-IMG".to_string()],
                output_file_groups: vec!["OCR-D-OUT".to_string()],
                page_id: page.map(str::to_string),
                parameters: Default::default(),
            },
            JobKind::SingleProcessor,
            None,
        )
    }

    async fn statuses(channel: &InMemoryChannel, count: usize) -> Vec<StatusMessage> {
        tokio::time::timeout(Duration::from_secs(5), async {
            while channel.pending(STATUS_QUEUE).await < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("status reports not published in time");
        channel
            .drain(STATUS_QUEUE)
            .await
            .iter()
            .map(|payload| StatusMessage::decode(payload).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn reports_running_then_outcome() {
        let channel = Arc::new(InMemoryChannel::default());
        let registry = Registry::new("/tmp/logs");
        let stub = Arc::new(StubProcessor::new("ocrd-dummy"));

        let mut processors = ProcessorMap::new();
        processors.insert("ocrd-dummy".to_string(), stub.clone());
        processors.insert(
            "ocrd-broken".to_string(),
            Arc::new(FailingProcessor::new("ocrd-broken")),
        );
        let worker = ProcessingWorker::new(channel.clone(), processors);
        let consumers = worker.start().await.unwrap();
        assert_eq!(consumers.len(), 2);

        let good = job(&registry, "ocrd-dummy", Some("PHYS_0001"));
        channel
            .publish("ocrd-dummy", DispatchMessage::for_job(&good, STATUS_QUEUE).encode().unwrap())
            .await
            .unwrap();
        let reports = statuses(&channel, 2).await;
        assert_eq!(
            reports.iter().map(|r| r.state).collect::<Vec<_>>(),
            vec![JobState::Running, JobState::Success]
        );
        assert!(reports.iter().all(|r| r.job_id == good.id));
        assert_eq!(stub.requests()[0].page_id.as_deref(), Some("PHYS_0001"));
        assert_eq!(stub.requests()[0].log_location, good.log_location);

        let bad = job(&registry, "ocrd-broken", None);
        channel
            .publish("ocrd-broken", DispatchMessage::for_job(&bad, STATUS_QUEUE).encode().unwrap())
            .await
            .unwrap();
        let reports = statuses(&channel, 2).await;
        assert_eq!(reports[1].state, JobState::Failed);
        assert_eq!(
            reports[1].diagnostic.as_deref(),
            Some("Simulated processor failure")
        );

        for consumer in consumers {
            consumer.stop().await;
        }
    }

    #[tokio::test]
    async fn malformed_dispatch_is_dropped() {
        let channel = Arc::new(InMemoryChannel::default());
        let stub = Arc::new(StubProcessor::new("ocrd-dummy"));
        let mut processors = ProcessorMap::new();
        processors.insert("ocrd-dummy".to_string(), stub.clone());
        let worker = ProcessingWorker::new(channel.clone(), processors);
        let consumers = worker.start().await.unwrap();

        channel.publish("ocrd-dummy", b"{broken".to_vec()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while channel.pending("ocrd-dummy").await > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(stub.requests().is_empty());
        assert_eq!(channel.pending(STATUS_QUEUE).await, 0);
        for consumer in consumers {
            consumer.stop().await;
        }
    }
}
