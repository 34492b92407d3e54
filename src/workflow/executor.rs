// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Step sequencing for submitted workflows.
//!
//! Every workflow gets one sequencer task. For each step it expands the step
//! into jobs (one per page of the first input file group when page-wise, one
//! for the whole document otherwise), registers all of them, publishes them,
//! and then waits on the registry until every job of the step is terminal.
//! The next step starts only when the whole step succeeded; the first failed
//! job ends the sequence. Page-wise siblings that are already running are left
//! to finish, their results are recorded but no longer matter.
//!
//! Sequencers never poll: they wait on the registry change counter, so a status
//! report is acted on as soon as the registry applies it.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use super::definition::WorkflowDefinition;
use crate::broker::Dispatcher;
use crate::errors::{BrokerError, WorkflowError};
use crate::observability::messages::broker::DispatchFailed;
use crate::observability::messages::workflow::{
    StepDispatched, WorkflowCancelled, WorkflowFinished, WorkflowSubmitted,
};
use crate::observability::messages::StructuredLog;
use crate::registry::{
    Job, JobId, JobKind, JobRequest, JobState, Registry, WorkflowId, WorkflowRecord,
    WorkflowStatus,
};
use crate::traits::WorkspaceResolver;

/// Failure reason recorded for cancelled workflows
pub const CANCELLED: &str = "cancelled";

/// Why a sequencer stopped before the last step succeeded.
#[derive(Debug)]
enum Halt {
    Cancelled,
    /// A job failed; the aggregate already reflects it
    JobFailed,
    Aborted(String),
}

#[derive(Clone)]
pub struct WorkflowExecutor {
    dispatcher: Dispatcher,
    workspaces: Arc<dyn WorkspaceResolver>,
    sequencers: Arc<DashMap<WorkflowId, CancellationToken>>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl WorkflowExecutor {
    pub fn new(dispatcher: Dispatcher, workspaces: Arc<dyn WorkspaceResolver>) -> Self {
        Self {
            dispatcher,
            workspaces,
            sequencers: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    fn registry(&self) -> &Arc<Registry> {
        self.dispatcher.registry()
    }

    /// Admit a workflow and start sequencing it in the background.
    ///
    /// Every step must name a deployed processor and the workspace must
    /// resolve; otherwise nothing is registered.
    pub fn submit_workflow(
        &self,
        definition: WorkflowDefinition,
        path_to_mets: PathBuf,
        page_wise: bool,
    ) -> Result<WorkflowId, BrokerError> {
        let catalog = self.dispatcher.catalog();
        definition.validate(|processor| catalog.contains(processor))?;
        self.workspaces.resolve(&path_to_mets)?;

        let steps = definition.steps.len();
        let id = self
            .registry()
            .create_workflow(definition.steps, path_to_mets.clone(), page_wise);
        let mets = path_to_mets.to_string_lossy();
        let submitted = WorkflowSubmitted {
            workflow_id: &id,
            steps,
            path_to_mets: &mets,
        };
        submitted.log();
        let span = submitted.span("sequencer");
        let token = self.shutdown.child_token();
        self.sequencers.insert(id, token.clone());
        self.tracker
            .spawn(self.clone().run(id, token).instrument(span));
        Ok(id)
    }

    /// Stop submitting further steps of a workflow.
    ///
    /// Dispatched jobs keep running. The workflow aggregates to `failed` with
    /// reason `cancelled` unless it already finished.
    pub fn cancel_workflow(&self, id: &WorkflowId) -> Result<WorkflowStatus, BrokerError> {
        self.registry().workflow_record(id)?;
        if let Some((_, token)) = self.sequencers.remove(id) {
            token.cancel();
        }
        if self.registry().fail_workflow(id, CANCELLED)? {
            WorkflowCancelled { workflow_id: id }.log();
        }
        Ok(self.registry().get_workflow(id)?)
    }

    /// Number of workflows still being sequenced
    pub fn active(&self) -> usize {
        self.sequencers.len()
    }

    /// Cancel every sequencer and wait for all of them to stop.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }

    async fn run(self, id: WorkflowId, token: CancellationToken) {
        let reason = match self.sequence(&id, &token).await {
            Ok(()) | Err(Halt::JobFailed) => None,
            Err(Halt::Cancelled) => Some(CANCELLED.to_string()),
            Err(Halt::Aborted(reason)) => Some(reason),
        };
        if let Some(reason) = reason {
            if let Ok(true) = self.registry().fail_workflow(&id, &reason) {
                if reason == CANCELLED {
                    WorkflowCancelled { workflow_id: &id }.log();
                }
            }
        }

        self.sequencers.remove(&id);
        if let Ok(status) = self.registry().get_workflow(&id) {
            WorkflowFinished {
                workflow_id: &id,
                state: status.state,
            }
            .log();
        }
    }

    async fn sequence(&self, id: &WorkflowId, token: &CancellationToken) -> Result<(), Halt> {
        let record = self
            .registry()
            .workflow_record(id)
            .map_err(|e| Halt::Aborted(e.to_string()))?;

        for (index, step) in record.steps.iter().enumerate() {
            if token.is_cancelled() {
                return Err(Halt::Cancelled);
            }

            let requests = self
                .expand(&record, index)
                .map_err(|e| Halt::Aborted(e.to_string()))?;
            let jobs: Vec<Job> = requests
                .into_iter()
                .map(|request| {
                    self.registry()
                        .create(request, JobKind::WorkflowStep, Some(*id))
                })
                .collect();
            let job_ids: Vec<JobId> = jobs.iter().map(|job| job.id).collect();
            self.registry()
                .attach_step_jobs(id, index, job_ids.clone())
                .map_err(|e| Halt::Aborted(e.to_string()))?;

            self.dispatch(&jobs).await?;
            StepDispatched {
                workflow_id: id,
                step: index + 1,
                processor: &step.processor_name,
                jobs: jobs.len(),
            }
            .log();

            self.wait_for_step(&job_ids, token).await?;
        }
        Ok(())
    }

    /// One job request per page (page-wise) or one for the whole document.
    fn expand(
        &self,
        record: &WorkflowRecord,
        index: usize,
    ) -> Result<Vec<JobRequest>, WorkflowError> {
        let step = &record.steps[index];
        let request = JobRequest {
            processor_name: step.processor_name.clone(),
            path_to_mets: record.path_to_mets.clone(),
            input_file_groups: step.input_file_groups.clone(),
            output_file_groups: step.output_file_groups.clone(),
            page_id: None,
            parameters: step.parameters.clone(),
        };
        if !record.step_is_page_wise(index) {
            return Ok(vec![request]);
        }

        // Resolved per step: earlier steps add files to the workspace.
        let workspace = self.workspaces.resolve(&record.path_to_mets)?;
        let group = step.input_file_groups.first().cloned().unwrap_or_default();
        let pages = workspace.page_ids(&group);
        if pages.is_empty() {
            return Err(WorkflowError::NoPages {
                step: index + 1,
                group,
            });
        }

        Ok(pages
            .into_iter()
            .map(|page| JobRequest {
                page_id: Some(page),
                ..request.clone()
            })
            .collect())
    }

    async fn dispatch(&self, jobs: &[Job]) -> Result<(), Halt> {
        for (position, job) in jobs.iter().enumerate() {
            if let Err(error) = self.dispatcher.publish(job).await {
                for skipped in &jobs[position + 1..] {
                    if let Err(lost) = self
                        .registry()
                        .fail_job(&skipped.id, format!("not dispatched: {}", error))
                    {
                        DispatchFailed {
                            job_id: &skipped.id,
                            processor: &skipped.processor_name,
                            error: &lost,
                        }
                        .log();
                    }
                }
                return Err(Halt::JobFailed);
            }
        }
        Ok(())
    }

    async fn wait_for_step(&self, jobs: &[JobId], token: &CancellationToken) -> Result<(), Halt> {
        let mut changes = self.registry().subscribe();
        loop {
            changes.borrow_and_update();

            let mut finished = true;
            for id in jobs {
                let job = self
                    .registry()
                    .get(id)
                    .map_err(|e| Halt::Aborted(e.to_string()))?;
                match job.state {
                    JobState::Failed => return Err(Halt::JobFailed),
                    JobState::Success => {}
                    JobState::Unset | JobState::Queued | JobState::Running => finished = false,
                }
            }
            if finished {
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(Halt::Cancelled),
                changed = changes.changed() => {
                    if changed.is_err() {
                        return Err(Halt::Aborted("registry closed".to_string()));
                    }
                }
            }
        }
    }
}
