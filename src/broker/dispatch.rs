// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use super::catalog::ProcessorCatalog;
use crate::channel::DispatchMessage;
use crate::config::consts::STATUS_QUEUE;
use crate::errors::{BrokerError, ChannelError};
use crate::observability::messages::broker::DispatchFailed;
use crate::observability::messages::StructuredLog;
use crate::registry::{Job, JobRequest, Registry};
use crate::traits::MessageChannel;

/// Hands registered jobs to the channel.
///
/// Shared by single-job submission and workflow sequencing so that both fail
/// the same way: a job whose dispatch message cannot be enqueued is marked
/// `failed` instead of staying `queued` forever.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    channel: Arc<dyn MessageChannel>,
    catalog: Arc<ProcessorCatalog>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        channel: Arc<dyn MessageChannel>,
        catalog: Arc<ProcessorCatalog>,
    ) -> Self {
        Self {
            registry,
            channel,
            catalog,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn catalog(&self) -> &ProcessorCatalog {
        &self.catalog
    }

    /// Reject requests no worker can serve before anything is registered.
    pub fn admit(&self, request: &JobRequest) -> Result<(), BrokerError> {
        if !self.catalog.contains(&request.processor_name) {
            return Err(BrokerError::UnknownProcessor(request.processor_name.clone()));
        }
        if request.input_file_groups.is_empty() {
            return Err(BrokerError::InvalidRequest(
                "at least one input file group is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Publish the dispatch message of a registered job.
    pub async fn publish(&self, job: &Job) -> Result<(), ChannelError> {
        let result = match self.catalog.queue_for(&job.processor_name) {
            Some(queue) => match DispatchMessage::for_job(job, STATUS_QUEUE).encode() {
                Ok(payload) => self.channel.publish(queue, payload).await,
                Err(error) => Err(error),
            },
            None => Err(ChannelError::Consumer {
                queue: job.processor_name.clone(),
                reason: "no worker consumes this queue".to_string(),
            }),
        };

        if let Err(error) = &result {
            DispatchFailed {
                job_id: &job.id,
                processor: &job.processor_name,
                error,
            }
            .log();
            // A terminal job may only be one a fast worker already finished.
            if let Err(lost) = self
                .registry
                .fail_job(&job.id, format!("dispatch failed: {}", error))
            {
                DispatchFailed {
                    job_id: &job.id,
                    processor: &job.processor_name,
                    error: &lost,
                }
                .log();
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InMemoryChannel;
    use crate::registry::{JobKind, JobState};
    use std::path::PathBuf;

    fn request(processor: &str) -> JobRequest {
        JobRequest {
            processor_name: processor.to_string(),
            path_to_mets: PathBuf::from("/data/ws/mets.xml"),
            input_file_groups: vec!["OCR-D-IMG".to_string()],
            output_file_groups: vec![],
            page_id: None,
            parameters: Default::default(),
        }
    }

    fn dispatcher(channel: Arc<InMemoryChannel>) -> Dispatcher {
        Dispatcher::new(
            Arc::new(Registry::new("/tmp/logs")),
            channel,
            Arc::new(ProcessorCatalog::from_names(["ocrd-dummy"])),
        )
    }

    #[test]
    fn admit_checks_processor_and_inputs() {
        let dispatcher = dispatcher(Arc::new(InMemoryChannel::default()));

        assert!(dispatcher.admit(&request("ocrd-dummy")).is_ok());
        assert!(matches!(
            dispatcher.admit(&request("ocrd-nope")),
            Err(BrokerError::UnknownProcessor(name)) if name == "ocrd-nope"
        ));

        let mut no_inputs = request("ocrd-dummy");
        no_inputs.input_file_groups.clear();
        assert!(matches!(
            dispatcher.admit(&no_inputs),
            Err(BrokerError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn publish_enqueues_on_processor_queue() {
        let channel = Arc::new(InMemoryChannel::default());
        let dispatcher = dispatcher(channel.clone());
        let job = dispatcher
            .registry()
            .create(request("ocrd-dummy"), JobKind::SingleProcessor, None);

        dispatcher.publish(&job).await.unwrap();

        let messages = channel.drain("ocrd-dummy").await;
        assert_eq!(messages.len(), 1);
        let message = DispatchMessage::decode(&messages[0]).unwrap();
        assert_eq!(message.job_id, job.id);
        assert_eq!(message.result_queue, STATUS_QUEUE);
        assert_eq!(message.log_location, job.log_location);
    }

    #[tokio::test]
    async fn unavailable_channel_fails_the_job() {
        let channel = Arc::new(InMemoryChannel::default());
        channel.set_available(false);
        let dispatcher = dispatcher(channel);
        let job = dispatcher
            .registry()
            .create(request("ocrd-dummy"), JobKind::SingleProcessor, None);

        let err = dispatcher.publish(&job).await.unwrap_err();
        assert!(err.is_transient());

        let stored = dispatcher.registry().get(&job.id).unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert!(stored.diagnostic.unwrap().starts_with("dispatch failed"));
    }

    #[tokio::test]
    async fn failed_publish_leaves_a_finished_job_alone() {
        let channel = Arc::new(InMemoryChannel::default());
        channel.set_available(false);
        let dispatcher = dispatcher(channel);
        let job = dispatcher
            .registry()
            .create(request("ocrd-dummy"), JobKind::SingleProcessor, None);
        dispatcher
            .registry()
            .transition(&job.id, JobState::Success)
            .unwrap();

        assert!(dispatcher.publish(&job).await.is_err());

        let stored = dispatcher.registry().get(&job.id).unwrap();
        assert_eq!(stored.state, JobState::Success);
        assert!(stored.diagnostic.is_none());
    }
}
