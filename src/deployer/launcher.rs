// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::agent::{AgentHandle, AgentSpec, DeployedAgent};
use crate::config::{is_local_address, DeployType, SshConfig};
use crate::errors::LaunchError;
use crate::traits::AgentLauncher;

/// Starts agents as host processes or docker containers.
///
/// | deploy type | local host              | remote host                          |
/// |-------------|-------------------------|--------------------------------------|
/// | native      | child process           | `ssh` + `nohup`, pid echoed back     |
/// | docker      | `docker run -d`         | `docker -H ssh://user@host run -d`   |
///
/// Remote access is key based only.
#[derive(Default)]
pub struct ProcessLauncher {
    children: Mutex<HashMap<u32, Child>>,
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    async fn start_local_process(&self, spec: &AgentSpec) -> Result<AgentHandle, LaunchError> {
        let program = native_program(spec)?;
        let mut command = Command::new(program);
        command
            .args(&spec.launch.args)
            .envs(spec.launch.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(false);

        match &spec.launch.log_file {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| spawn_error(program, e))?;
                }
                let log = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| spawn_error(program, e))?;
                let err = log.try_clone().map_err(|e| spawn_error(program, e))?;
                command.stdout(log).stderr(err);
            }
            None => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
        }

        let child = command.spawn().map_err(|e| spawn_error(program, e))?;
        let pid = child
            .id()
            .ok_or_else(|| LaunchError::MissingHandle(format!("{} exited immediately", program)))?;
        self.children.lock().await.insert(pid, child);
        Ok(AgentHandle::Process { pid })
    }

    async fn start_remote_process(
        &self,
        spec: &AgentSpec,
        ssh: &SshConfig,
    ) -> Result<AgentHandle, LaunchError> {
        let program = native_program(spec)?;
        let mut words: Vec<String> = spec
            .launch
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, shell_quote(v)))
            .collect();
        words.push(shell_quote(program));
        words.extend(spec.launch.args.iter().map(|a| shell_quote(a)));
        let remote = format!("nohup {} >/dev/null 2>&1 & echo $!", words.join(" "));

        let output = run("ssh", &ssh_args(ssh, &spec.host, &remote)).await?;
        let pid = output
            .trim()
            .parse::<u32>()
            .map_err(|_| LaunchError::MissingHandle(format!("unexpected pid output '{}'", output.trim())))?;
        Ok(AgentHandle::Process { pid })
    }

    async fn start_container(&self, spec: &AgentSpec) -> Result<AgentHandle, LaunchError> {
        let mut args = docker_host_args(spec);
        args.extend(docker_run_args(spec)?);
        let output = run("docker", &args).await?;
        let id = output.trim().to_string();
        if id.is_empty() {
            return Err(LaunchError::MissingHandle(
                "docker run printed no container id".to_string(),
            ));
        }
        Ok(AgentHandle::Container { id })
    }
}

#[async_trait]
impl AgentLauncher for ProcessLauncher {
    async fn start(&self, spec: &AgentSpec) -> Result<AgentHandle, LaunchError> {
        match (spec.deploy_type, remote_ssh(spec)) {
            (DeployType::Docker, _) => self.start_container(spec).await,
            (DeployType::Native, None) => self.start_local_process(spec).await,
            (DeployType::Native, Some(ssh)) => self.start_remote_process(spec, ssh).await,
        }
    }

    async fn stop(&self, agent: &DeployedAgent) -> Result<(), LaunchError> {
        match &agent.handle {
            AgentHandle::Container { id } => {
                let mut args = docker_host_args(&agent.spec);
                args.extend(["rm".to_string(), "-f".to_string(), id.clone()]);
                run("docker", &args).await.map(|_| ())
            }
            AgentHandle::Process { pid } => match remote_ssh(&agent.spec) {
                Some(ssh) => {
                    let remote = format!("kill {}", pid);
                    run("ssh", &ssh_args(ssh, &agent.spec.host, &remote))
                        .await
                        .map(|_| ())
                }
                None => {
                    let child = self.children.lock().await.remove(pid);
                    match child {
                        Some(mut child) => child
                            .kill()
                            .await
                            .map_err(|e| spawn_error("kill", e)),
                        None => run("kill", &[pid.to_string()]).await.map(|_| ()),
                    }
                }
            },
        }
    }
}

fn remote_ssh(spec: &AgentSpec) -> Option<&SshConfig> {
    if is_local_address(&spec.host) {
        None
    } else {
        spec.ssh.as_ref()
    }
}

fn native_program(spec: &AgentSpec) -> Result<&str, LaunchError> {
    spec.launch.program.as_deref().ok_or_else(|| LaunchError::Spawn {
        program: spec.label(),
        reason: "no program configured for native agent".to_string(),
    })
}

fn spawn_error(program: &str, err: std::io::Error) -> LaunchError {
    LaunchError::Spawn {
        program: program.to_string(),
        reason: err.to_string(),
    }
}

/// Run a command to completion and return its stdout
async fn run(program: &str, args: &[String]) -> Result<String, LaunchError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| spawn_error(program, e))?;

    if !output.status.success() {
        return Err(LaunchError::CommandFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn ssh_args(ssh: &SshConfig, host: &str, remote_command: &str) -> Vec<String> {
    let mut args = vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-p".to_string(),
        ssh.port.to_string(),
    ];
    if let Some(key) = &ssh.path_to_privkey {
        args.push("-i".to_string());
        args.push(key.display().to_string());
    }
    args.push(format!("{}@{}", ssh.username, host));
    args.push(remote_command.to_string());
    args
}

fn docker_host_args(spec: &AgentSpec) -> Vec<String> {
    match remote_ssh(spec) {
        Some(ssh) => vec![
            "-H".to_string(),
            format!("ssh://{}@{}:{}", ssh.username, spec.host, ssh.port),
        ],
        None => Vec::new(),
    }
}

fn docker_run_args(spec: &AgentSpec) -> Result<Vec<String>, LaunchError> {
    let image = spec.launch.image.as_deref().ok_or_else(|| LaunchError::Spawn {
        program: "docker".to_string(),
        reason: format!("no image configured for {}", spec.label()),
    })?;

    let mut args = vec!["run".to_string(), "-d".to_string()];
    for (host_port, container_port) in &spec.launch.ports {
        args.push("-p".to_string());
        args.push(format!("{}:{}", host_port, container_port));
    }
    for (key, value) in &spec.launch.env {
        args.push("-e".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push(image.to_string());
    if let Some(program) = &spec.launch.program {
        args.push(program.clone());
    }
    args.extend(spec.launch.args.iter().cloned());
    Ok(args)
}

fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}
