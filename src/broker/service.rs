// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::catalog::ProcessorCatalog;
use super::dispatch::Dispatcher;
use crate::channel::{NatsConnector, StatusMessage};
use crate::config::consts::STATUS_QUEUE;
use crate::config::{BrokerConfig, ResourceSearchPath};
use crate::deployer::{DeployedAgent, Deployer, ProcessLauncher};
use crate::errors::{BrokerError, ConfigError, RegistryError, ResourceError};
use crate::observability::messages::broker::{
    BrokerStarted, BrokerStopping, JobSubmitted, ShutdownIncomplete, StatusReportIgnored,
};
use crate::observability::messages::registry::TransitionDiscarded;
use crate::observability::messages::validation::ConfigProblem;
use crate::observability::messages::StructuredLog;
use crate::registry::{Job, JobId, JobKind, JobRequest, Registry, WorkflowId, WorkflowStatus};
use crate::traits::{
    AgentLauncher, ChannelConnector, ConsumerHandle, MessageChannel, MessageHandler,
    ResourceLocator, ResourceRecord, WorkspaceResolver,
};
use crate::workflow::{WorkflowDefinition, WorkflowExecutor};
use crate::workspace::{DirectoryWorkspaceResolver, ResourceManager};

/// The pieces the broker talks to but does not own the implementation of.
pub struct Collaborators {
    pub launcher: Arc<dyn AgentLauncher>,
    pub connector: Arc<dyn ChannelConnector>,
    pub workspaces: Arc<dyn WorkspaceResolver>,
    pub resources: Arc<dyn ResourceLocator>,
}

impl Collaborators {
    /// Local/ssh/docker agents, NATS, directory workspaces
    pub fn production(search: ResourceSearchPath) -> Self {
        Self {
            launcher: Arc::new(ProcessLauncher::new()),
            connector: Arc::new(NatsConnector),
            workspaces: Arc::new(DirectoryWorkspaceResolver),
            resources: Arc::new(ResourceManager::new(search)),
        }
    }
}

/// Orchestrator service: owns the deployment, the registry and the
/// publisher side of the channel.
///
/// Submissions return as soon as the dispatch message is enqueued. Workers
/// report back on the status queue; the broker applies those reports to the
/// registry, which every query reads from.
pub struct ProcessingBroker {
    config: BrokerConfig,
    deployer: Deployer,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    executor: WorkflowExecutor,
    resources: Arc<dyn ResourceLocator>,
    status_consumer: Mutex<Option<ConsumerHandle>>,
}

struct Wiring {
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    status_consumer: ConsumerHandle,
}

impl ProcessingBroker {
    /// Validate, deploy, connect, and start listening for status reports.
    ///
    /// Any failure aborts startup. Agents deployed before a later step failed
    /// are stopped again.
    pub async fn start(
        raw: serde_yaml::Value,
        collaborators: Collaborators,
    ) -> Result<Self, BrokerError> {
        let config = BrokerConfig::from_value(raw).inspect_err(|error| {
            if let ConfigError::Validation(problems) = error {
                for problem in problems {
                    ConfigProblem { problem }.log();
                }
            }
        })?;

        let deployer = Deployer::new(collaborators.launcher, config.timeouts.agent_stop());
        let agents = deployer.deploy_all(&config).await?;

        let wiring = match Self::wire(&config, collaborators.connector.as_ref()).await {
            Ok(wiring) => wiring,
            Err(error) => {
                if let Err(teardown) = deployer.kill_all().await {
                    ShutdownIncomplete { error: &teardown }.log();
                }
                return Err(error);
            }
        };

        let executor =
            WorkflowExecutor::new(wiring.dispatcher.clone(), collaborators.workspaces);
        let processors = wiring.dispatcher.catalog().names();
        BrokerStarted {
            queue_url: &config.process_queue.url(),
            agents: agents.len(),
            processors: &processors,
        }
        .log();

        Ok(Self {
            config,
            deployer,
            registry: wiring.registry,
            dispatcher: wiring.dispatcher,
            executor,
            resources: collaborators.resources,
            status_consumer: Mutex::new(Some(wiring.status_consumer)),
        })
    }

    async fn wire(
        config: &BrokerConfig,
        connector: &dyn ChannelConnector,
    ) -> Result<Wiring, BrokerError> {
        let channel: Arc<dyn MessageChannel> =
            connector.connect(&config.process_queue, &config.timeouts).await?;
        let registry = Arc::new(Registry::new(config.logs_dir()));
        let catalog = Arc::new(ProcessorCatalog::from_config(config));
        let dispatcher = Dispatcher::new(registry.clone(), channel.clone(), catalog);

        let updater = Arc::new(StatusUpdater {
            registry: registry.clone(),
        });
        let status_consumer = channel.consume(STATUS_QUEUE, updater).await?;

        Ok(Wiring {
            registry,
            dispatcher,
            status_consumer,
        })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn list_processors(&self) -> Vec<String> {
        self.dispatcher.catalog().names()
    }

    /// Register a job for `processor` and enqueue it.
    pub async fn submit_job(
        &self,
        processor: &str,
        mut request: JobRequest,
    ) -> Result<Job, BrokerError> {
        request.processor_name = processor.to_string();
        self.dispatcher.admit(&request)?;

        let job = self
            .registry
            .create(request, JobKind::SingleProcessor, None);
        JobSubmitted {
            job_id: &job.id,
            processor: &job.processor_name,
        }
        .log();
        self.dispatcher.publish(&job).await?;
        Ok(job)
    }

    pub fn get_job(&self, id: &JobId) -> Result<Job, BrokerError> {
        Ok(self.registry.get(id)?)
    }

    /// Content of the job's log file
    pub async fn get_job_log(&self, id: &JobId) -> Result<String, BrokerError> {
        let job = self.registry.get(id)?;
        Ok(tokio::fs::read_to_string(&job.log_location).await?)
    }

    pub fn submit_workflow(
        &self,
        definition: &str,
        path_to_mets: PathBuf,
        page_wise: bool,
    ) -> Result<WorkflowId, BrokerError> {
        let definition = WorkflowDefinition::parse(definition)?;
        self.executor
            .submit_workflow(definition, path_to_mets, page_wise)
    }

    pub fn get_workflow(&self, id: &WorkflowId) -> Result<WorkflowStatus, BrokerError> {
        Ok(self.registry.get_workflow(id)?)
    }

    pub fn cancel_workflow(&self, id: &WorkflowId) -> Result<WorkflowStatus, BrokerError> {
        self.executor.cancel_workflow(id)
    }

    /// Resources registered for a deployed processor
    pub fn list_resources(&self, processor: &str) -> Result<Vec<ResourceRecord>, BrokerError> {
        self.known(processor)?;
        Ok(self.resources.registered(processor)?)
    }

    pub fn locate_resource(&self, processor: &str, name: &str) -> Result<PathBuf, BrokerError> {
        self.known(processor)?;
        self.resources
            .locate(processor, name, None)
            .ok_or_else(|| {
                ResourceError::NotFound {
                    executable: processor.to_string(),
                    name: name.to_string(),
                }
                .into()
            })
    }

    pub async fn fetch_resource(
        &self,
        processor: &str,
        url: &str,
        name: Option<&str>,
    ) -> Result<PathBuf, BrokerError> {
        self.known(processor)?;
        Ok(self.resources.fetch(processor, url, name).await?)
    }

    fn known(&self, processor: &str) -> Result<(), BrokerError> {
        if self.dispatcher.catalog().contains(processor) {
            Ok(())
        } else {
            Err(BrokerError::UnknownProcessor(processor.to_string()))
        }
    }

    pub async fn live_agents(&self) -> Vec<DeployedAgent> {
        self.deployer.live_agents().await
    }

    /// Stop every deployed agent; the service keeps answering queries.
    pub async fn stop_deployed_agents(&self) -> Result<(), BrokerError> {
        Ok(self.deployer.kill_all().await?)
    }

    /// Stop sequencing, stop listening, and tear the deployment down.
    ///
    /// Each agent gets the configured stop timeout; agents that did not stop
    /// are reported in the returned error.
    pub async fn shutdown(&self) -> Result<(), BrokerError> {
        BrokerStopping.log();
        self.executor.shutdown().await;
        if let Some(consumer) = self.status_consumer.lock().await.take() {
            consumer.stop().await;
        }
        Ok(self.deployer.kill_all().await?)
    }
}

/// Applies worker status reports to the registry.
///
/// Reports that cannot apply are acknowledged anyway: a stale or duplicate
/// report is expected under at-least-once delivery and will not get better on
/// redelivery.
struct StatusUpdater {
    registry: Arc<Registry>,
}

#[async_trait]
impl MessageHandler for StatusUpdater {
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<()> {
        let status = match StatusMessage::decode(payload) {
            Ok(status) => status,
            Err(error) => {
                StatusReportIgnored { error: &error }.log();
                return Ok(());
            }
        };

        match self
            .registry
            .transition_with(&status.job_id, status.state, status.diagnostic)
        {
            Ok(_) => {}
            Err(RegistryError::InvalidTransition { from, to, .. }) => TransitionDiscarded {
                job_id: &status.job_id,
                current: from,
                reported: to,
            }
            .log(),
            Err(error) => StatusReportIgnored { error: &error }.log(),
        }
        Ok(())
    }
}
