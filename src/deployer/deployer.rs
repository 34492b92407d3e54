// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::agent::{AgentSpec, DeployedAgent};
use crate::config::BrokerConfig;
use crate::errors::{DeploymentError, LaunchError, TeardownFailure};
use crate::observability::messages::deployer::{
    AgentStartFailed, AgentStarted, AgentStarting, AgentStopFailed, AgentStopped,
    DeploymentRolledBack, NothingToStop,
};
use crate::observability::messages::StructuredLog;
use crate::traits::AgentLauncher;

/// Owns the lifecycle of every agent it started.
///
/// The tracked set is the live set: an agent is added right after its launcher
/// reports a handle and removed only once it has been stopped. All mutations go
/// through the one lock, so concurrent `deploy_all`/`kill_all` calls are
/// serialized.
pub struct Deployer {
    launcher: Arc<dyn AgentLauncher>,
    live: Mutex<Vec<DeployedAgent>>,
    stop_timeout: Duration,
}

impl Deployer {
    pub fn new(launcher: Arc<dyn AgentLauncher>, stop_timeout: Duration) -> Self {
        Self {
            launcher,
            live: Mutex::new(Vec::new()),
            stop_timeout,
        }
    }

    /// Start every agent the configuration describes, in plan order.
    ///
    /// Fails fast: on the first agent that cannot be started, every agent
    /// started by this call is stopped again (newest first) before the error
    /// is returned.
    pub async fn deploy_all(
        &self,
        config: &BrokerConfig,
    ) -> Result<Vec<DeployedAgent>, DeploymentError> {
        let mut live = self.live.lock().await;
        let mut started: Vec<DeployedAgent> = Vec::new();

        for spec in AgentSpec::plan(config) {
            let label = spec.label();
            AgentStarting { agent: &label }.log();

            match self.launcher.start(&spec).await {
                Ok(handle) => {
                    let agent = DeployedAgent::new(spec, handle);
                    AgentStarted {
                        agent: &label,
                        handle: &agent.handle,
                    }
                    .log();
                    live.push(agent.clone());
                    started.push(agent);
                }
                Err(source) => {
                    AgentStartFailed {
                        agent: &label,
                        error: &source,
                    }
                    .log();

                    let rollback_failures = self.stop_tracked(&mut live, started).await;
                    DeploymentRolledBack {
                        agent: &label,
                        leftover: rollback_failures.len(),
                    }
                    .log();

                    return Err(DeploymentError::AgentStartFailed {
                        agent: label,
                        source,
                        rollback_failures,
                    });
                }
            }
        }

        Ok(started)
    }

    /// Stop every tracked agent, newest first.
    ///
    /// Every agent is attempted even when earlier ones fail; failures are
    /// reported together. Agents that could not be stopped stay tracked so a
    /// later call can retry them.
    pub async fn kill_all(&self) -> Result<(), DeploymentError> {
        let mut live = self.live.lock().await;
        if live.is_empty() {
            NothingToStop.log();
            return Ok(());
        }

        let targets = live.clone();
        let failures = self.stop_tracked(&mut live, targets).await;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(DeploymentError::TeardownFailed(failures))
        }
    }

    /// Snapshot of the agents currently tracked
    pub async fn live_agents(&self) -> Vec<DeployedAgent> {
        self.live.lock().await.clone()
    }

    async fn stop_tracked(
        &self,
        live: &mut Vec<DeployedAgent>,
        targets: Vec<DeployedAgent>,
    ) -> Vec<TeardownFailure> {
        let mut failures = Vec::new();

        for agent in targets.into_iter().rev() {
            let label = agent.label();
            match self.stop_one(&agent).await {
                Ok(()) => {
                    AgentStopped { agent: &label }.log();
                    if let Some(index) = live.iter().position(|a| *a == agent) {
                        live.remove(index);
                    }
                }
                Err(error) => {
                    AgentStopFailed {
                        agent: &label,
                        error: &error,
                    }
                    .log();
                    failures.push(TeardownFailure {
                        agent: label,
                        reason: error.to_string(),
                    });
                }
            }
        }

        failures
    }

    async fn stop_one(&self, agent: &DeployedAgent) -> Result<(), LaunchError> {
        match tokio::time::timeout(self.stop_timeout, self.launcher.stop(agent)).await {
            Ok(result) => result,
            Err(_) => Err(LaunchError::Timeout {
                after: self.stop_timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployer::agent::AgentHandle;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Launcher double that fails or hangs for chosen agents
    #[derive(Default)]
    struct ScriptedLauncher {
        fail_start_of: Option<String>,
        hang_on_stop_of: Option<String>,
        next_pid: AtomicU32,
        events: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl AgentLauncher for ScriptedLauncher {
        async fn start(&self, spec: &AgentSpec) -> Result<AgentHandle, LaunchError> {
            let label = spec.label();
            self.events.lock().unwrap().push(format!("start {}", label));
            if self.fail_start_of.as_deref() == Some(label.as_str()) {
                return Err(LaunchError::Spawn {
                    program: "ssh".to_string(),
                    reason: "host unreachable".to_string(),
                });
            }
            Ok(AgentHandle::Process {
                pid: self.next_pid.fetch_add(1, Ordering::SeqCst) + 100,
            })
        }

        async fn stop(&self, agent: &DeployedAgent) -> Result<(), LaunchError> {
            let label = agent.label();
            self.events.lock().unwrap().push(format!("stop {}", label));
            if self.hang_on_stop_of.as_deref() == Some(label.as_str()) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok(())
        }
    }

    fn config() -> BrokerConfig {
        BrokerConfig::from_value(
            serde_yaml::from_str(
                r#"
process_queue:
  address: localhost
  port: 4222
  credentials: {username: admin, password: admin}
hosts:
  - address: localhost
    workers:
      - name: ocrd-a
  - address: 10.0.0.9
    username: cloud
    workers:
      - name: ocrd-b
"#,
            )
            .unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn kill_all_with_nothing_deployed_succeeds() {
        let deployer = Deployer::new(Arc::new(ScriptedLauncher::default()), Duration::from_secs(1));
        assert!(deployer.kill_all().await.is_ok());
        assert!(deployer.live_agents().await.is_empty());
    }

    #[tokio::test]
    async fn deploy_then_kill_all_in_reverse_order() {
        let launcher = Arc::new(ScriptedLauncher::default());
        let deployer = Deployer::new(launcher.clone(), Duration::from_secs(1));

        let agents = deployer.deploy_all(&config()).await.unwrap();
        assert_eq!(agents.len(), 3);
        assert_eq!(deployer.live_agents().await.len(), 3);

        deployer.kill_all().await.unwrap();
        assert!(deployer.live_agents().await.is_empty());

        let events = launcher.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start broker@localhost",
                "start worker ocrd-a@localhost",
                "start worker ocrd-b@10.0.0.9",
                "stop worker ocrd-b@10.0.0.9",
                "stop worker ocrd-a@localhost",
                "stop broker@localhost",
            ]
        );
    }

    #[tokio::test]
    async fn unreachable_agent_rolls_back_everything() {
        let launcher = Arc::new(ScriptedLauncher {
            fail_start_of: Some("worker ocrd-b@10.0.0.9".to_string()),
            ..ScriptedLauncher::default()
        });
        let deployer = Deployer::new(launcher.clone(), Duration::from_secs(1));

        let err = deployer.deploy_all(&config()).await.unwrap_err();
        match err {
            DeploymentError::AgentStartFailed {
                agent,
                rollback_failures,
                ..
            } => {
                assert_eq!(agent, "worker ocrd-b@10.0.0.9");
                assert!(rollback_failures.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(deployer.live_agents().await.is_empty());

        let events = launcher.events.lock().unwrap().clone();
        assert_eq!(
            &events[3..],
            &["stop worker ocrd-a@localhost", "stop broker@localhost"]
        );
    }

    #[tokio::test]
    async fn hanging_agent_times_out_and_others_are_still_stopped() {
        let launcher = Arc::new(ScriptedLauncher {
            hang_on_stop_of: Some("worker ocrd-a@localhost".to_string()),
            ..ScriptedLauncher::default()
        });
        let deployer = Deployer::new(launcher.clone(), Duration::from_millis(50));
        deployer.deploy_all(&config()).await.unwrap();

        let err = deployer.kill_all().await.unwrap_err();
        let DeploymentError::TeardownFailed(failures) = err else {
            panic!("expected teardown failure");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].agent, "worker ocrd-a@localhost");
        assert_eq!(failures[0].reason, "Timed out after 50ms");

        // Only the agent that resisted is still tracked
        let live = deployer.live_agents().await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].label(), "worker ocrd-a@localhost");
        assert!(launcher
            .events
            .lock()
            .unwrap()
            .contains(&"stop broker@localhost".to_string()));
    }
}
