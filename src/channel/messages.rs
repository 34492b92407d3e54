// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Wire messages exchanged between the broker and processing workers.
//!
//! Both directions are JSON. The broker publishes a [`DispatchMessage`] on the
//! queue named after the processor; workers report progress with
//! [`StatusMessage`]s on the queue named in `result_queue`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::errors::ChannelError;
use crate::registry::{Job, JobId, JobState};
use crate::traits::ProcessorRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchMessage {
    pub job_id: JobId,
    pub processor_name: String,
    pub path_to_mets: PathBuf,
    pub input_file_groups: Vec<String>,
    pub output_file_groups: Vec<String>,
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub result_queue: String,
    pub log_location: PathBuf,
}

impl DispatchMessage {
    pub fn for_job(job: &Job, result_queue: &str) -> Self {
        Self {
            job_id: job.id,
            processor_name: job.processor_name.clone(),
            path_to_mets: job.path_to_mets.clone(),
            input_file_groups: job.input_file_groups.clone(),
            output_file_groups: job.output_file_groups.clone(),
            page_id: job.page_id.clone(),
            parameters: job.parameters.clone(),
            result_queue: result_queue.to_string(),
            log_location: job.log_location.clone(),
        }
    }

    pub fn to_request(&self) -> ProcessorRequest {
        ProcessorRequest {
            job_id: self.job_id.to_string(),
            path_to_mets: self.path_to_mets.clone(),
            input_file_groups: self.input_file_groups.clone(),
            output_file_groups: self.output_file_groups.clone(),
            page_id: self.page_id.clone(),
            parameters: self.parameters.clone(),
            log_location: self.log_location.clone(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ChannelError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ChannelError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub job_id: JobId,
    pub state: JobState,
    #[serde(default)]
    pub diagnostic: Option<String>,
    pub reported_at: DateTime<Utc>,
}

impl StatusMessage {
    pub fn new(job_id: JobId, state: JobState, diagnostic: Option<String>) -> Self {
        Self {
            job_id,
            state,
            diagnostic,
            reported_at: Utc::now(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, ChannelError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ChannelError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_state_is_lowercase_on_the_wire() {
        let message = StatusMessage::new(JobId::new(), JobState::Success, None);
        let json: serde_json::Value = serde_json::from_slice(&message.encode().unwrap()).unwrap();
        assert_eq!(json["state"], "success");
    }

    #[test]
    fn garbage_is_an_encoding_error() {
        let err = DispatchMessage::decode(b"{not json").unwrap_err();
        assert!(matches!(err, ChannelError::Encoding(_)));
        assert!(!err.is_transient());
    }
}
