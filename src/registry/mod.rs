// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod model;
mod store;
mod workflow;

pub use model::{job_log_location, Job, JobId, JobKind, JobRequest, JobState, WorkflowId};
pub use store::Registry;
pub use workflow::{aggregate_state, JobSummary, StepStatus, WorkflowRecord, WorkflowStatus};
