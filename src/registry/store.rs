// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::Utc;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tokio::sync::watch;

use super::model::{Job, JobId, JobKind, JobRequest, JobState, WorkflowId};
use super::workflow::{aggregate_state, JobSummary, StepStatus, WorkflowRecord, WorkflowStatus};
use crate::errors::RegistryError;
use crate::observability::messages::registry::{
    JobTransitioned, TransitionDiscarded, WorkflowFailed,
};
use crate::observability::messages::StructuredLog;
use crate::workflow::WorkflowStep;

/// Authoritative store of job and workflow records.
///
/// Every mutation of a job happens while holding that job's map entry, so
/// transitions for one id are strictly ordered while different ids proceed in
/// parallel. Readers get owned snapshots; nothing outside the registry holds a
/// reference into it.
///
/// Each successful mutation bumps a change counter that sequencers can wait on
/// through [`Registry::subscribe`].
pub struct Registry {
    jobs: DashMap<JobId, Job>,
    workflows: DashMap<WorkflowId, WorkflowRecord>,
    logs_dir: PathBuf,
    changes: watch::Sender<u64>,
}

impl Registry {
    pub fn new(logs_dir: impl Into<PathBuf>) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            jobs: DashMap::new(),
            workflows: DashMap::new(),
            logs_dir: logs_dir.into(),
            changes,
        }
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    /// Register a new job in state `queued` under a fresh id.
    pub fn create(
        &self,
        request: JobRequest,
        kind: JobKind,
        workflow_id: Option<WorkflowId>,
    ) -> Job {
        let job = Job::queued(request, kind, workflow_id, &self.logs_dir);
        self.jobs.insert(job.id, job.clone());
        self.notify();
        job
    }

    pub fn transition(&self, id: &JobId, next: JobState) -> Result<Job, RegistryError> {
        self.transition_with(id, next, None)
    }

    /// Move a job forward, recording timestamps and an optional diagnostic.
    ///
    /// Fails with `InvalidTransition` when `next` does not follow the current
    /// state; the record is left untouched in that case.
    pub fn transition_with(
        &self,
        id: &JobId,
        next: JobState,
        diagnostic: Option<String>,
    ) -> Result<Job, RegistryError> {
        let snapshot = {
            let mut entry = self
                .jobs
                .get_mut(id)
                .ok_or_else(|| RegistryError::job_not_found(id))?;
            let job = entry.value_mut();

            if !job.state.can_transition_to(next) {
                return Err(RegistryError::InvalidTransition {
                    id: id.to_string(),
                    from: job.state,
                    to: next,
                });
            }

            let previous = job.state;
            let now = Utc::now();
            job.state = next;
            match next {
                JobState::Running => job.started_at = Some(now),
                JobState::Success | JobState::Failed => job.finished_at = Some(now),
                JobState::Queued | JobState::Unset => {}
            }
            if diagnostic.is_some() {
                job.diagnostic = diagnostic;
            }

            JobTransitioned {
                job_id: id,
                processor: &job.processor_name,
                from: previous,
                to: next,
            }
            .log();
            job.clone()
        };

        self.notify();
        Ok(snapshot)
    }

    /// Fail a job the broker gave up on.
    ///
    /// A job that already reached a terminal state keeps it and the discarded
    /// transition is logged. Returns whether the job was failed by this call.
    pub fn fail_job(&self, id: &JobId, diagnostic: String) -> Result<bool, RegistryError> {
        match self.transition_with(id, JobState::Failed, Some(diagnostic)) {
            Ok(_) => Ok(true),
            Err(RegistryError::InvalidTransition { from, to, .. }) => {
                TransitionDiscarded {
                    job_id: id,
                    current: from,
                    reported: to,
                }
                .log();
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    pub fn get(&self, id: &JobId) -> Result<Job, RegistryError> {
        self.jobs
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::job_not_found(id))
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn create_workflow(
        &self,
        steps: Vec<WorkflowStep>,
        path_to_mets: PathBuf,
        page_wise: bool,
    ) -> WorkflowId {
        let id = WorkflowId::new();
        self.workflows.insert(
            id,
            WorkflowRecord {
                id,
                steps,
                path_to_mets,
                page_wise,
                jobs: Vec::new(),
                submitted_at: Utc::now(),
                failure: None,
                finished: None,
            },
        );
        self.notify();
        id
    }

    /// Record the complete job set of one step.
    pub fn attach_step_jobs(
        &self,
        id: &WorkflowId,
        step: usize,
        jobs: Vec<JobId>,
    ) -> Result<(), RegistryError> {
        {
            let mut entry = self
                .workflows
                .get_mut(id)
                .ok_or_else(|| RegistryError::workflow_not_found(id))?;
            let record = entry.value_mut();
            if record.jobs.len() <= step {
                record.jobs.resize_with(step + 1, Vec::new);
            }
            record.jobs[step] = jobs;
        }
        self.notify();
        Ok(())
    }

    /// Mark a workflow failed for a reason outside its jobs.
    ///
    /// The first reason wins, and a workflow that already reached a terminal
    /// state is left alone. Returns whether the record changed.
    pub fn fail_workflow(&self, id: &WorkflowId, reason: &str) -> Result<bool, RegistryError> {
        // Latches the outcome if the jobs already decided it.
        if self.get_workflow(id)?.state.is_terminal() {
            return Ok(false);
        }

        let changed = {
            let mut entry = self
                .workflows
                .get_mut(id)
                .ok_or_else(|| RegistryError::workflow_not_found(id))?;
            let record = entry.value_mut();
            if record.finished.is_some() || record.failure.is_some() {
                false
            } else {
                record.failure = Some(reason.to_string());
                record.finished = Some(JobState::Failed);
                true
            }
        };

        if changed {
            WorkflowFailed {
                workflow_id: id,
                reason,
            }
            .log();
            self.notify();
        }
        Ok(changed)
    }

    pub fn workflow_record(&self, id: &WorkflowId) -> Result<WorkflowRecord, RegistryError> {
        self.workflows
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RegistryError::workflow_not_found(id))
    }

    /// Current snapshot of a workflow with its aggregate state
    pub fn get_workflow(&self, id: &WorkflowId) -> Result<WorkflowStatus, RegistryError> {
        let record = self.workflow_record(id)?;

        let mut steps = Vec::with_capacity(record.steps.len());
        let mut states = Vec::with_capacity(record.jobs.len());
        let mut diagnostic = record.failure.clone();

        for (index, step) in record.steps.iter().enumerate() {
            let Some(job_ids) = record.jobs.get(index) else {
                steps.push(StepStatus {
                    processor_name: step.processor_name.clone(),
                    page_wise: record.step_is_page_wise(index),
                    jobs: Vec::new(),
                });
                continue;
            };

            let mut jobs = Vec::with_capacity(job_ids.len());
            let mut step_states = Vec::with_capacity(job_ids.len());
            for job_id in job_ids {
                let job = self.get(job_id)?;
                if job.state == JobState::Failed && diagnostic.is_none() {
                    diagnostic = Some(format!(
                        "step {} ({}) failed: {}",
                        index + 1,
                        job.processor_name,
                        job.diagnostic.as_deref().unwrap_or("no diagnostic")
                    ));
                }
                step_states.push(job.state);
                jobs.push(JobSummary {
                    job_id: job.id,
                    page_id: job.page_id,
                    state: job.state,
                });
            }
            states.push(step_states);
            steps.push(StepStatus {
                processor_name: step.processor_name.clone(),
                page_wise: record.step_is_page_wise(index),
                jobs,
            });
        }

        let status = WorkflowStatus {
            workflow_id: record.id,
            state: aggregate_state(record.steps.len(), &states, record.failure.is_some()),
            path_to_mets: record.path_to_mets,
            submitted_at: record.submitted_at,
            diagnostic,
            steps,
        };
        self.settle(id, status)
    }

    /// Reconcile a freshly derived status with the latched outcome under the
    /// workflow entry, latching it when the status is terminal.
    fn settle(
        &self,
        id: &WorkflowId,
        mut status: WorkflowStatus,
    ) -> Result<WorkflowStatus, RegistryError> {
        let mut entry = self
            .workflows
            .get_mut(id)
            .ok_or_else(|| RegistryError::workflow_not_found(id))?;
        let record = entry.value_mut();

        if let Some(failure) = &record.failure {
            status.diagnostic = Some(failure.clone());
        }
        match record.finished {
            Some(state) => status.state = state,
            None if status.state.is_terminal() => record.finished = Some(status.state),
            None => {}
        }
        if status.state == JobState::Success {
            status.diagnostic = None;
        }
        Ok(status)
    }

    /// Receiver that changes whenever any record changes
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn request(processor: &str) -> JobRequest {
        JobRequest {
            processor_name: processor.to_string(),
            path_to_mets: PathBuf::from("/data/ws/mets.xml"),
            input_file_groups: vec!["OCR-D-IMG".to_string()],
            output_file_groups: vec!["OCR-D-BIN".to_string()],
            page_id: None,
            parameters: Default::default(),
        }
    }

    fn step(processor: &str) -> WorkflowStep {
        WorkflowStep {
            processor_name: processor.to_string(),
            input_file_groups: vec!["OCR-D-IMG".to_string()],
            output_file_groups: vec!["OCR-D-OUT".to_string()],
            parameters: Default::default(),
            page_wise: None,
        }
    }

    #[test]
    fn create_starts_queued_with_log_location() {
        let registry = Registry::new("/tmp/logs");
        let job = registry.create(request("ocrd-dummy"), JobKind::SingleProcessor, None);

        let stored = registry.get(&job.id).unwrap();
        assert_eq!(stored.state, JobState::Queued);
        assert_eq!(
            stored.log_location,
            PathBuf::from(format!("/tmp/logs/processing_job_{}.log", job.id))
        );
        assert!(stored.started_at.is_none());
    }

    #[test]
    fn transitions_record_timestamps_and_diagnostic() {
        let registry = Registry::new("/tmp/logs");
        let job = registry.create(request("ocrd-dummy"), JobKind::SingleProcessor, None);

        let running = registry.transition(&job.id, JobState::Running).unwrap();
        assert!(running.started_at.is_some());
        assert!(running.finished_at.is_none());

        let failed = registry
            .transition_with(&job.id, JobState::Failed, Some("exit status 1".to_string()))
            .unwrap();
        assert!(failed.finished_at.is_some());
        assert_eq!(failed.diagnostic.as_deref(), Some("exit status 1"));
    }

    #[test]
    fn stale_running_after_success_is_rejected() {
        let registry = Registry::new("/tmp/logs");
        let job = registry.create(request("ocrd-dummy"), JobKind::SingleProcessor, None);

        registry.transition(&job.id, JobState::Success).unwrap();
        let err = registry.transition(&job.id, JobState::Running).unwrap_err();

        assert_eq!(
            err,
            RegistryError::InvalidTransition {
                id: job.id.to_string(),
                from: JobState::Success,
                to: JobState::Running,
            }
        );
        assert_eq!(registry.get(&job.id).unwrap().state, JobState::Success);
    }

    #[test]
    fn fail_job_spares_terminal_jobs() {
        struct TestCase {
            name: &'static str,
            reached: Vec<JobState>,
            expected_changed: bool,
            expected_state: JobState,
        }

        let test_cases = vec![
            TestCase {
                name: "queued job fails",
                reached: vec![],
                expected_changed: true,
                expected_state: JobState::Failed,
            },
            TestCase {
                name: "running job fails",
                reached: vec![JobState::Running],
                expected_changed: true,
                expected_state: JobState::Failed,
            },
            TestCase {
                name: "finished job keeps its success",
                reached: vec![JobState::Running, JobState::Success],
                expected_changed: false,
                expected_state: JobState::Success,
            },
        ];

        for case in test_cases {
            let registry = Registry::new("/tmp/logs");
            let job = registry.create(request("ocrd-dummy"), JobKind::SingleProcessor, None);
            for state in &case.reached {
                registry.transition(&job.id, *state).unwrap();
            }

            let changed = registry
                .fail_job(&job.id, "dispatch failed: down".to_string())
                .unwrap();
            assert_eq!(changed, case.expected_changed, "case '{}'", case.name);
            assert_eq!(
                registry.get(&job.id).unwrap().state,
                case.expected_state,
                "case '{}'",
                case.name
            );
        }

        let registry = Registry::new("/tmp/logs");
        assert!(matches!(
            registry.fail_job(&JobId::new(), "gone".to_string()),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let registry = Registry::new("/tmp/logs");
        assert!(matches!(
            registry.get(&JobId::new()),
            Err(RegistryError::NotFound { kind: "Job", .. })
        ));
        assert!(matches!(
            registry.transition(&JobId::new(), JobState::Running),
            Err(RegistryError::NotFound { .. })
        ));
        assert!(matches!(
            registry.get_workflow(&WorkflowId::new()),
            Err(RegistryError::NotFound { kind: "Workflow", .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_submissions_keep_every_entry() {
        let registry = Arc::new(Registry::new("/tmp/logs"));

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .create(request(&format!("proc-{}", i)), JobKind::SingleProcessor, None)
                        .id
                })
            })
            .collect();

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }

        assert_eq!(registry.job_count(), 64);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(registry.get(id).unwrap().processor_name, format!("proc-{}", i));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_transitions_never_regress() {
        let registry = Arc::new(Registry::new("/tmp/logs"));
        let job = registry.create(request("ocrd-dummy"), JobKind::SingleProcessor, None);

        let mut tasks = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            let id = job.id;
            tasks.push(tokio::spawn(async move {
                let next = if i % 2 == 0 {
                    JobState::Running
                } else {
                    JobState::Success
                };
                registry.transition(&id, next).ok().map(|job| job.state)
            }));
        }

        let mut observed = Vec::new();
        for task in tasks {
            if let Some(state) = task.await.unwrap() {
                observed.push(state);
            }
        }

        // At most one running and exactly one terminal transition can succeed.
        assert_eq!(observed.iter().filter(|s| **s == JobState::Success).count(), 1);
        assert!(observed.iter().filter(|s| **s == JobState::Running).count() <= 1);
        assert_eq!(registry.get(&job.id).unwrap().state, JobState::Success);
    }

    #[test]
    fn workflow_state_follows_its_jobs() {
        let registry = Registry::new("/tmp/logs");
        let workflow_id = registry.create_workflow(
            vec![step("ocrd-a"), step("ocrd-b")],
            PathBuf::from("/data/ws/mets.xml"),
            false,
        );
        assert_eq!(registry.get_workflow(&workflow_id).unwrap().state, JobState::Running);

        let a = registry.create(request("ocrd-a"), JobKind::WorkflowStep, Some(workflow_id));
        registry.attach_step_jobs(&workflow_id, 0, vec![a.id]).unwrap();
        registry.transition(&a.id, JobState::Success).unwrap();
        assert_eq!(registry.get_workflow(&workflow_id).unwrap().state, JobState::Running);

        let b = registry.create(request("ocrd-b"), JobKind::WorkflowStep, Some(workflow_id));
        registry.attach_step_jobs(&workflow_id, 1, vec![b.id]).unwrap();
        registry.transition(&b.id, JobState::Success).unwrap();

        let status = registry.get_workflow(&workflow_id).unwrap();
        assert_eq!(status.state, JobState::Success);
        assert_eq!(status.steps[1].jobs[0].job_id, b.id);
    }

    #[test]
    fn failed_job_fails_workflow_with_diagnostic() {
        let registry = Registry::new("/tmp/logs");
        let workflow_id = registry.create_workflow(
            vec![step("ocrd-a"), step("ocrd-b")],
            PathBuf::from("/data/ws/mets.xml"),
            false,
        );
        let a = registry.create(request("ocrd-a"), JobKind::WorkflowStep, Some(workflow_id));
        registry.attach_step_jobs(&workflow_id, 0, vec![a.id]).unwrap();
        registry
            .transition_with(&a.id, JobState::Failed, Some("exit status 2".to_string()))
            .unwrap();

        let status = registry.get_workflow(&workflow_id).unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(
            status.diagnostic.as_deref(),
            Some("step 1 (ocrd-a) failed: exit status 2")
        );
    }

    #[test]
    fn explicit_failure_keeps_first_reason_and_spares_success() {
        let registry = Registry::new("/tmp/logs");
        let workflow_id = registry.create_workflow(
            vec![step("ocrd-a")],
            PathBuf::from("/data/ws/mets.xml"),
            false,
        );
        assert!(registry.fail_workflow(&workflow_id, "cancelled").unwrap());
        assert!(!registry.fail_workflow(&workflow_id, "later").unwrap());
        let status = registry.get_workflow(&workflow_id).unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.diagnostic.as_deref(), Some("cancelled"));

        let done = registry.create_workflow(
            vec![step("ocrd-a")],
            PathBuf::from("/data/ws/mets.xml"),
            false,
        );
        let job = registry.create(request("ocrd-a"), JobKind::WorkflowStep, Some(done));
        registry.attach_step_jobs(&done, 0, vec![job.id]).unwrap();
        registry.transition(&job.id, JobState::Success).unwrap();
        assert!(!registry.fail_workflow(&done, "cancelled").unwrap());
        assert_eq!(registry.get_workflow(&done).unwrap().state, JobState::Success);
    }

    #[test]
    fn cancellation_of_a_running_workflow_outlives_its_last_success() {
        let registry = Registry::new("/tmp/logs");
        let workflow_id = registry.create_workflow(
            vec![step("ocrd-a")],
            PathBuf::from("/data/ws/mets.xml"),
            false,
        );
        let job = registry.create(request("ocrd-a"), JobKind::WorkflowStep, Some(workflow_id));
        registry.attach_step_jobs(&workflow_id, 0, vec![job.id]).unwrap();
        registry.transition(&job.id, JobState::Running).unwrap();

        assert!(registry.fail_workflow(&workflow_id, "cancelled").unwrap());
        registry.transition(&job.id, JobState::Success).unwrap();

        let status = registry.get_workflow(&workflow_id).unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.diagnostic.as_deref(), Some("cancelled"));
        assert_eq!(status.steps[0].jobs[0].state, JobState::Success);
    }

    #[test]
    fn cancel_racing_the_final_success_settles_once() {
        for _ in 0..200 {
            let registry = Registry::new("/tmp/logs");
            let workflow_id = registry.create_workflow(
                vec![step("ocrd-a")],
                PathBuf::from("/data/ws/mets.xml"),
                false,
            );
            let job = registry.create(request("ocrd-a"), JobKind::WorkflowStep, Some(workflow_id));
            registry.attach_step_jobs(&workflow_id, 0, vec![job.id]).unwrap();
            registry.transition(&job.id, JobState::Running).unwrap();

            let (cancelled, observed) = std::thread::scope(|scope| {
                let finisher = scope.spawn(|| {
                    registry.transition(&job.id, JobState::Success).unwrap();
                });
                let canceller =
                    scope.spawn(|| registry.fail_workflow(&workflow_id, "cancelled").unwrap());
                let poller = scope.spawn(|| {
                    (0..50)
                        .map(|_| registry.get_workflow(&workflow_id).unwrap().state)
                        .filter(|state| state.is_terminal())
                        .collect::<Vec<_>>()
                });
                finisher.join().unwrap();
                (canceller.join().unwrap(), poller.join().unwrap())
            });

            let settled = registry.get_workflow(&workflow_id).unwrap().state;
            let expected = if cancelled {
                JobState::Failed
            } else {
                JobState::Success
            };
            assert_eq!(settled, expected);
            assert!(
                observed.iter().all(|state| *state == settled),
                "observed {:?}, settled {:?}",
                observed,
                settled
            );
        }
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let registry = Registry::new("/tmp/logs");
        let mut changes = registry.subscribe();
        let job = registry.create(request("ocrd-dummy"), JobKind::SingleProcessor, None);
        changes.changed().await.unwrap();

        registry.transition(&job.id, JobState::Running).unwrap();
        assert!(changes.has_changed().unwrap());
    }
}
