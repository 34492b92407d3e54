// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_AGENT_STOP_SECONDS, DEFAULT_DATABASE_IMAGE, DEFAULT_LOGS_DIR,
    DEFAULT_PUBLISH_ATTEMPTS, DEFAULT_PUBLISH_BACKOFF_MS, DEFAULT_QUEUE_IMAGE,
    DEFAULT_SSH_PORT, DEFAULT_STREAM_NAME, DEFAULT_WORKER_COMMAND,
};
use crate::config::validation::validate_config;
use crate::errors::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for the processing broker.
///
/// Describes the message broker agent, the optional database agent, and which
/// processing workers run on which hosts. It is built once at startup from a
/// validated document and passed by reference to each component; nothing mutates
/// it afterwards.
///
/// # Example
/// ```yaml
/// process_queue:
///   address: localhost
///   port: 4222
///   credentials:
///     username: admin
///     password: admin
/// hosts:
///   - address: localhost
///     workers:
///       - name: ocrd-dummy
///         number_of_instance: 2
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    pub process_queue: QueueConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub hosts: Vec<HostConfig>,
    #[serde(default)]
    pub logs_dir: Option<PathBuf>,
    #[serde(default)]
    pub worker_command: Option<String>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl BrokerConfig {
    /// Directory holding per-job log files
    pub fn logs_dir(&self) -> PathBuf {
        self.logs_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOGS_DIR))
    }

    /// Executable used to start native workers
    pub fn worker_command(&self) -> &str {
        self.worker_command
            .as_deref()
            .unwrap_or(DEFAULT_WORKER_COMMAND)
    }

    /// Names of every processor some host deploys workers for, in config order
    pub fn processor_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for worker in self.hosts.iter().flat_map(|h| h.workers.iter()) {
            if !names.contains(&worker.name) {
                names.push(worker.name.clone());
            }
        }
        names
    }

    /// Validate a raw document and build the immutable configuration from it
    pub fn from_value(raw: serde_yaml::Value) -> Result<Self, ConfigError> {
        validate_config(&raw).map_err(ConfigError::Validation)?;
        serde_yaml::from_value(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Connection and deployment settings for the message broker agent.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    pub address: String,
    pub port: u16,
    pub credentials: Credentials,
    #[serde(default)]
    pub ssh: Option<SshConfig>,
    #[serde(default)]
    pub skip_deployment: bool,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub stream: Option<String>,
}

impl QueueConfig {
    pub fn image(&self) -> &str {
        self.image.as_deref().unwrap_or(DEFAULT_QUEUE_IMAGE)
    }

    pub fn stream(&self) -> &str {
        self.stream.as_deref().unwrap_or(DEFAULT_STREAM_NAME)
    }

    /// Client URL for the broker; "local" maps to the loopback address
    pub fn url(&self) -> String {
        format!("nats://{}:{}", connect_address(&self.address), self.port)
    }
}

/// Connection and deployment settings for the optional database agent.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub ssh: Option<SshConfig>,
    #[serde(default)]
    pub skip_deployment: bool,
    #[serde(default)]
    pub image: Option<String>,
}

impl DatabaseConfig {
    pub fn image(&self) -> &str {
        self.image.as_deref().unwrap_or(DEFAULT_DATABASE_IMAGE)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Key-based SSH access to a remote host.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SshConfig {
    pub username: String,
    #[serde(default)]
    pub path_to_privkey: Option<PathBuf>,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

/// A host and the processing workers placed on it.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    pub address: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub path_to_privkey: Option<PathBuf>,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    pub workers: Vec<WorkerConfig>,
}

impl HostConfig {
    /// SSH settings for a remote host, `None` for the local machine
    pub fn ssh(&self) -> Option<SshConfig> {
        if is_local_address(&self.address) {
            return None;
        }
        self.username.as_ref().map(|username| SshConfig {
            username: username.clone(),
            path_to_privkey: self.path_to_privkey.clone(),
            port: self.ssh_port,
        })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    pub name: String,
    #[serde(default = "default_instances")]
    pub number_of_instance: usize,
    #[serde(default)]
    pub deploy_type: DeployType,
    #[serde(default)]
    pub image: Option<String>,
}

fn default_instances() -> usize {
    1
}

/// How an agent is brought up on its host.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeployType {
    #[default]
    Native,
    Docker,
}

/// Bounds on teardown and publish retries.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    #[serde(default = "default_agent_stop_seconds")]
    pub agent_stop_seconds: u64,
    #[serde(default = "default_publish_attempts")]
    pub publish_attempts: usize,
    #[serde(default = "default_publish_backoff_ms")]
    pub publish_backoff_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            agent_stop_seconds: DEFAULT_AGENT_STOP_SECONDS,
            publish_attempts: DEFAULT_PUBLISH_ATTEMPTS,
            publish_backoff_ms: DEFAULT_PUBLISH_BACKOFF_MS,
        }
    }
}

impl TimeoutConfig {
    pub fn agent_stop(&self) -> Duration {
        Duration::from_secs(self.agent_stop_seconds)
    }

    pub fn publish_backoff(&self) -> Duration {
        Duration::from_millis(self.publish_backoff_ms)
    }
}

fn default_agent_stop_seconds() -> u64 {
    DEFAULT_AGENT_STOP_SECONDS
}

fn default_publish_attempts() -> usize {
    DEFAULT_PUBLISH_ATTEMPTS
}

fn default_publish_backoff_ms() -> u64 {
    DEFAULT_PUBLISH_BACKOFF_MS
}

/// Whether an address designates the machine the broker runs on
pub fn is_local_address(address: &str) -> bool {
    matches!(address, "local" | "localhost" | "127.0.0.1" | "::1")
}

fn connect_address(address: &str) -> &str {
    if address == "local" {
        "127.0.0.1"
    } else {
        address
    }
}

/// Read a config file into a raw document without checking it.
///
/// Files ending in `.toml` are read as TOML, everything else as YAML.
pub fn load_raw_config<P: AsRef<Path>>(path: P) -> Result<serde_yaml::Value, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let is_toml = path.extension().is_some_and(|ext| ext == "toml");
    if is_toml {
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    } else {
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Load and validate a config file.
///
/// Structural validation runs on the raw document before anything is
/// deserialized, so every problem is reported with its field path.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<BrokerConfig, ConfigError> {
    let raw = load_raw_config(path)?;
    BrokerConfig::from_value(raw)
}
