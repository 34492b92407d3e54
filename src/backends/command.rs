// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::traits::{Processor, ProcessorRequest, ProcessorResponse};

/// Runs a processor as an external executable.
///
/// The executable is invoked in the directory of the METS file as
///
/// ```text
/// <program> -m <mets> -I <in,...> [-O <out,...>] -p <json parameters> [-g <page>]
/// ```
///
/// with stdout and stderr appended to the job's log file. A non-zero exit
/// status is a failed job, not an error.
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    name: String,
    program: String,
}

impl CommandProcessor {
    /// The executable is named like the processor and looked up on `PATH`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            program: name.clone(),
            name,
        }
    }

    pub fn with_program(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
        }
    }

    pub fn arguments(&self, req: &ProcessorRequest) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            req.path_to_mets.to_string_lossy().into_owned(),
            "-I".to_string(),
            req.input_file_groups.join(","),
        ];
        if !req.output_file_groups.is_empty() {
            args.push("-O".to_string());
            args.push(req.output_file_groups.join(","));
        }
        args.push("-p".to_string());
        args.push(serde_json::to_string(&req.parameters).unwrap_or_else(|_| "{}".to_string()));
        if let Some(page) = &req.page_id {
            args.push("-g".to_string());
            args.push(page.clone());
        }
        args
    }

    async fn run(&self, req: &ProcessorRequest) -> std::io::Result<ExitStatus> {
        if let Some(dir) = req.log_location.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let args = self.arguments(req);

        let mut log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&req.log_location)
            .await?;
        log.write_all(format!("# job {}: {} {}\n", req.job_id, self.program, args.join(" ")).as_bytes())
            .await?;
        let stdout = log.into_std().await;
        let stderr = stdout.try_clone()?;

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        if let Some(workspace) = req.path_to_mets.parent().filter(|dir| is_dir(dir)) {
            command.current_dir(workspace);
        }
        command.status().await
    }
}

fn is_dir(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.is_dir()
}

#[async_trait]
impl Processor for CommandProcessor {
    async fn process(&self, req: ProcessorRequest) -> ProcessorResponse {
        match self.run(&req).await {
            Ok(status) if status.success() => ProcessorResponse::Success,
            Ok(status) => ProcessorResponse::failure(format!("{} exited with {}", self.program, status)),
            Err(error) => {
                ProcessorResponse::failure(format!("failed to run {}: {}", self.program, error))
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
