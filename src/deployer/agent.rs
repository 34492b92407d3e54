// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Agent descriptors derived from the broker configuration.

use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::config::consts::WORKER_PASSWORD_ENV;
use crate::config::{BrokerConfig, DeployType, HostConfig, SshConfig, WorkerConfig};

const NATS_CLIENT_PORT: u16 = 4222;
const MONGO_PORT: u16 = 27017;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Broker,
    Database,
    Worker,
}

impl Display for AgentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AgentKind::Broker => "broker",
            AgentKind::Database => "database",
            AgentKind::Worker => "worker",
        })
    }
}

/// How to start an agent, independent of where it runs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LaunchParameters {
    /// Container image; required for docker agents
    pub image: Option<String>,
    /// Executable for native agents, optional command override for containers
    pub program: Option<String>,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    /// `(host port, container port)` pairs published by docker agents
    pub ports: Vec<(u16, u16)>,
    /// Where a local native agent's stdout/stderr go
    pub log_file: Option<PathBuf>,
}

/// One agent to run on one host. Immutable for the lifetime of a deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSpec {
    pub kind: AgentKind,
    pub host: String,
    pub processor_name: Option<String>,
    pub deploy_type: DeployType,
    pub ssh: Option<SshConfig>,
    pub launch: LaunchParameters,
}

impl AgentSpec {
    /// Every agent the configuration asks for, in start order: the message
    /// broker, then the database, then the workers of each host. Agents marked
    /// `skip_deployment` are expected to run already and are left out.
    pub fn plan(config: &BrokerConfig) -> Vec<AgentSpec> {
        let mut plan = Vec::new();

        let queue = &config.process_queue;
        if !queue.skip_deployment {
            plan.push(AgentSpec {
                kind: AgentKind::Broker,
                host: queue.address.clone(),
                processor_name: None,
                deploy_type: DeployType::Docker,
                ssh: queue.ssh.clone(),
                launch: LaunchParameters {
                    image: Some(queue.image().to_string()),
                    args: vec![
                        "-js".to_string(),
                        "--user".to_string(),
                        queue.credentials.username.clone(),
                        "--pass".to_string(),
                        queue.credentials.password.clone(),
                    ],
                    ports: vec![(queue.port, NATS_CLIENT_PORT)],
                    ..LaunchParameters::default()
                },
            });
        }

        if let Some(database) = config.database.as_ref().filter(|db| !db.skip_deployment) {
            let env = database
                .credentials
                .as_ref()
                .map(|c| {
                    vec![
                        ("MONGO_INITDB_ROOT_USERNAME".to_string(), c.username.clone()),
                        ("MONGO_INITDB_ROOT_PASSWORD".to_string(), c.password.clone()),
                    ]
                })
                .unwrap_or_default();
            plan.push(AgentSpec {
                kind: AgentKind::Database,
                host: database.address.clone(),
                processor_name: None,
                deploy_type: DeployType::Docker,
                ssh: database.ssh.clone(),
                launch: LaunchParameters {
                    image: Some(database.image().to_string()),
                    env,
                    ports: vec![(database.port, MONGO_PORT)],
                    ..LaunchParameters::default()
                },
            });
        }

        for host in &config.hosts {
            for worker in &host.workers {
                for instance in 0..worker.number_of_instance {
                    plan.push(Self::worker(config, host, worker, instance));
                }
            }
        }

        plan
    }

    fn worker(
        config: &BrokerConfig,
        host: &HostConfig,
        worker: &WorkerConfig,
        instance: usize,
    ) -> AgentSpec {
        let queue = &config.process_queue;
        let logs_dir = config.logs_dir();
        let args = vec![
            "worker".to_string(),
            "--processor".to_string(),
            worker.name.clone(),
            "--queue-url".to_string(),
            queue.url(),
            "--username".to_string(),
            queue.credentials.username.clone(),
            "--stream".to_string(),
            queue.stream().to_string(),
            "--log-dir".to_string(),
            logs_dir.display().to_string(),
        ];

        AgentSpec {
            kind: AgentKind::Worker,
            host: host.address.clone(),
            processor_name: Some(worker.name.clone()),
            deploy_type: worker.deploy_type,
            ssh: host.ssh(),
            launch: LaunchParameters {
                image: worker.image.clone(),
                program: Some(config.worker_command().to_string()),
                args,
                env: vec![(
                    WORKER_PASSWORD_ENV.to_string(),
                    queue.credentials.password.clone(),
                )],
                ports: Vec::new(),
                log_file: Some(logs_dir.join(format!(
                    "worker_{}_{}.log",
                    worker.name, instance
                ))),
            },
        }
    }

    /// Short human-readable name, e.g. `worker ocrd-dummy@10.0.0.12`
    pub fn label(&self) -> String {
        match &self.processor_name {
            Some(name) => format!("{} {}@{}", self.kind, name, self.host),
            None => format!("{}@{}", self.kind, self.host),
        }
    }
}

/// Reference to a running agent as reported by its launcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentHandle {
    Process { pid: u32 },
    Container { id: String },
}

impl Display for AgentHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentHandle::Process { pid } => write!(f, "pid {}", pid),
            AgentHandle::Container { id } => write!(f, "container {}", id),
        }
    }
}

/// A started agent. Only the deployer creates and terminates these.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployedAgent {
    pub spec: AgentSpec,
    pub handle: AgentHandle,
    pub host: String,
}

impl DeployedAgent {
    pub fn new(spec: AgentSpec, handle: AgentHandle) -> Self {
        let host = spec.host.clone();
        Self { spec, handle, host }
    }

    pub fn label(&self) -> String {
        self.spec.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(yaml: &str) -> BrokerConfig {
        BrokerConfig::from_value(serde_yaml::from_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn plan_orders_broker_database_workers() {
        let cfg = config(
            r#"
process_queue:
  address: localhost
  port: 5672
  credentials: {username: admin, password: secret}
database:
  address: localhost
  port: 27018
  credentials: {username: root, password: root}
hosts:
  - address: localhost
    workers:
      - name: ocrd-dummy
        number_of_instance: 2
      - name: ocrd-tesserocr-recognize
        deploy_type: docker
        image: ocrd/tesserocr
"#,
        );

        let plan = AgentSpec::plan(&cfg);
        let labels: Vec<String> = plan.iter().map(AgentSpec::label).collect();
        assert_eq!(
            labels,
            vec![
                "broker@localhost",
                "database@localhost",
                "worker ocrd-dummy@localhost",
                "worker ocrd-dummy@localhost",
                "worker ocrd-tesserocr-recognize@localhost",
            ]
        );

        assert_eq!(plan[0].launch.ports, vec![(5672, 4222)]);
        assert!(plan[0].launch.args.contains(&"secret".to_string()));
        assert_eq!(plan[1].launch.ports, vec![(27018, 27017)]);
        assert_eq!(plan[4].deploy_type, DeployType::Docker);
        assert_eq!(plan[4].launch.image.as_deref(), Some("ocrd/tesserocr"));

        let worker = &plan[2];
        assert_eq!(worker.launch.program.as_deref(), Some("processing-broker"));
        assert!(worker.launch.args.windows(2).any(|w| w == ["--processor", "ocrd-dummy"]));
        assert!(worker
            .launch
            .args
            .windows(2)
            .any(|w| w == ["--queue-url", "nats://localhost:5672"]));
        assert_eq!(
            worker.launch.env,
            vec![(WORKER_PASSWORD_ENV.to_string(), "secret".to_string())]
        );
        assert_ne!(plan[2].launch.log_file, plan[3].launch.log_file);
    }

    #[test]
    fn skipped_agents_are_not_planned() {
        let cfg = config(
            r#"
process_queue:
  address: mq.example.org
  port: 4222
  credentials: {username: admin, password: admin}
  skip_deployment: true
hosts:
  - address: 10.0.0.5
    username: cloud
    path_to_privkey: /keys/id_rsa
    workers:
      - name: ocrd-dummy
"#,
        );

        let plan = AgentSpec::plan(&cfg);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].kind, AgentKind::Worker);
        let ssh = plan[0].ssh.as_ref().unwrap();
        assert_eq!(ssh.username, "cloud");
        assert_eq!(ssh.path_to_privkey, Some(PathBuf::from("/keys/id_rsa")));
    }
}
