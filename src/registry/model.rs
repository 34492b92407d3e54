// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Job records and the job lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

id_type!(
    /// Unique id of a job, generated at submission
    JobId
);
id_type!(
    /// Unique id of a workflow, generated at submission
    WorkflowId
);

/// Job lifecycle: `unset -> queued -> running -> success | failed`.
///
/// Transitions only move forward. `queued -> success` is allowed since a fast
/// worker's `running` report may arrive after its terminal one and is then
/// discarded. A terminal state is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Unset,
    Queued,
    Running,
    Success,
    Failed,
}

impl JobState {
    fn rank(self) -> u8 {
        match self {
            JobState::Unset => 0,
            JobState::Queued => 1,
            JobState::Running => 2,
            JobState::Success | JobState::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Success | JobState::Failed)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        !self.is_terminal() && next != JobState::Unset && next.rank() > self.rank()
    }
}

impl Display for JobState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Unset => "unset",
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Success => "success",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    SingleProcessor,
    WorkflowStep,
}

/// What a client submits to run one processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub processor_name: String,
    pub path_to_mets: PathBuf,
    #[serde(alias = "input_file_grps")]
    pub input_file_groups: Vec<String>,
    #[serde(default, alias = "output_file_grps")]
    pub output_file_groups: Vec<String>,
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// Canonical record of one job, owned by the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Job {
    #[serde(rename = "job_id")]
    pub id: JobId,
    pub kind: JobKind,
    pub processor_name: String,
    pub path_to_mets: PathBuf,
    pub input_file_groups: Vec<String>,
    pub output_file_groups: Vec<String>,
    pub page_id: Option<String>,
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub state: JobState,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub log_location: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
}

impl Job {
    pub(crate) fn queued(
        request: JobRequest,
        kind: JobKind,
        workflow_id: Option<WorkflowId>,
        logs_dir: &Path,
    ) -> Self {
        let id = JobId::new();
        Self {
            id,
            kind,
            processor_name: request.processor_name,
            path_to_mets: request.path_to_mets,
            input_file_groups: request.input_file_groups,
            output_file_groups: request.output_file_groups,
            page_id: request.page_id,
            parameters: request.parameters,
            state: JobState::Queued,
            submitted_at: Utc::now(),
            started_at: None,
            finished_at: None,
            log_location: job_log_location(logs_dir, &id),
            diagnostic: None,
            workflow_id,
        }
    }
}

/// Deterministic log file of a job
pub fn job_log_location(logs_dir: &Path, id: &JobId) -> PathBuf {
    logs_dir.join(format!("processing_job_{}.log", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use JobState::*;

        let cases = [
            (Unset, Queued, true),
            (Queued, Running, true),
            (Queued, Success, true),
            (Queued, Failed, true),
            (Running, Success, true),
            (Running, Failed, true),
            (Queued, Queued, false),
            (Running, Running, false),
            (Running, Queued, false),
            (Success, Running, false),
            (Success, Failed, false),
            (Failed, Success, false),
            (Queued, Unset, false),
        ];

        for (from, to, expected) in cases {
            assert_eq!(
                from.can_transition_to(to),
                expected,
                "{} -> {} should be {}",
                from,
                to,
                if expected { "allowed" } else { "rejected" }
            );
        }
    }

    #[test]
    fn ids_round_trip_through_strings() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<WorkflowId>().is_err());
    }

    #[test]
    fn log_location_is_derived_from_id() {
        let id = JobId::new();
        let location = job_log_location(Path::new("/var/log/ocrd"), &id);
        assert_eq!(
            location,
            PathBuf::from(format!("/var/log/ocrd/processing_job_{}.log", id))
        );
    }

    #[test]
    fn request_accepts_short_group_names() {
        let request: JobRequest = serde_json::from_str(
            r#"{"path_to_mets": "/data/ws/mets.xml", "input_file_grps": ["OCR-D-IMG"], "output_file_grps": ["OCR-D-BIN"]}"#,
        )
        .unwrap();
        assert_eq!(request.input_file_groups, vec!["OCR-D-IMG"]);
        assert!(request.parameters.is_empty());
        assert!(request.page_id.is_none());
    }
}
