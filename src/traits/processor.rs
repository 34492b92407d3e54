use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Everything a processing algorithm needs to run one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorRequest {
    pub job_id: String,
    pub path_to_mets: PathBuf,
    pub input_file_groups: Vec<String>,
    pub output_file_groups: Vec<String>,
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    /// Where the processor's own output (stdout/stderr) is appended
    pub log_location: PathBuf,
}

/// Outcome of one processor run. A failure is data, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorResponse {
    Success,
    Failure { diagnostic: String },
}

impl ProcessorResponse {
    pub fn failure(diagnostic: impl Into<String>) -> Self {
        ProcessorResponse::Failure {
            diagnostic: diagnostic.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProcessorResponse::Success)
    }
}

/// A processing algorithm, invoked by name with parameters.
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, req: ProcessorRequest) -> ProcessorResponse;

    fn name(&self) -> &str;
}
