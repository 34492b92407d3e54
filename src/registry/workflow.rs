// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Workflow records and their derived state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use super::model::{JobId, JobState, WorkflowId};
use crate::workflow::WorkflowStep;

/// Canonical record of one workflow. While it runs, its state is derived from
/// the states of its jobs on every read; the first terminal state observed is
/// latched in `finished` and never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRecord {
    pub id: WorkflowId,
    pub steps: Vec<WorkflowStep>,
    pub path_to_mets: PathBuf,
    /// Default for steps without their own `page_wise` setting
    pub page_wise: bool,
    /// Job ids per step index; a step appears once all its jobs are registered
    pub jobs: Vec<Vec<JobId>>,
    pub submitted_at: DateTime<Utc>,
    /// Set when the workflow failed for a reason other than a failed job
    pub failure: Option<String>,
    pub finished: Option<JobState>,
}

impl WorkflowRecord {
    pub fn step_is_page_wise(&self, index: usize) -> bool {
        self.steps
            .get(index)
            .and_then(|step| step.page_wise)
            .unwrap_or(self.page_wise)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub page_id: Option<String>,
    pub state: JobState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepStatus {
    pub processor_name: String,
    pub page_wise: bool,
    pub jobs: Vec<JobSummary>,
}

/// Snapshot of a workflow with its aggregate state.
///
/// Clients address workflows the same way as jobs, so the id is serialized as `job_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowStatus {
    #[serde(rename = "job_id")]
    pub workflow_id: WorkflowId,
    pub state: JobState,
    pub path_to_mets: PathBuf,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    pub steps: Vec<StepStatus>,
}

/// `success` iff every step has registered jobs and all of them succeeded,
/// `failed` iff any job failed or the workflow was failed explicitly,
/// `running` otherwise.
pub fn aggregate_state(step_count: usize, steps: &[Vec<JobState>], failed: bool) -> JobState {
    if failed || steps.iter().flatten().any(|s| *s == JobState::Failed) {
        return JobState::Failed;
    }
    let complete = steps.len() == step_count
        && steps
            .iter()
            .all(|jobs| !jobs.is_empty() && jobs.iter().all(|s| *s == JobState::Success));
    if complete {
        JobState::Success
    } else {
        JobState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use JobState::*;

    #[test]
    fn aggregate_table() {
        let cases: Vec<(&str, usize, Vec<Vec<JobState>>, bool, JobState)> = vec![
            ("nothing dispatched yet", 2, vec![], false, Running),
            ("first step running", 2, vec![vec![Running]], false, Running),
            ("first step done", 2, vec![vec![Success]], false, Running),
            ("all steps done", 2, vec![vec![Success], vec![Success]], false, Success),
            ("one page failed", 1, vec![vec![Success, Failed, Running]], false, Failed),
            ("pages still running", 1, vec![vec![Success, Running, Success]], false, Running),
            ("explicit failure", 2, vec![vec![Success]], true, Failed),
            ("empty step never succeeds", 1, vec![vec![]], false, Running),
        ];

        for (name, count, steps, failed, expected) in cases {
            assert_eq!(
                aggregate_state(count, &steps, failed),
                expected,
                "case '{}'",
                name
            );
        }
    }
}
