use async_trait::async_trait;

use crate::deployer::{AgentHandle, AgentSpec, DeployedAgent};
use crate::errors::LaunchError;

/// Brings a single agent up or down on its host.
///
/// The deployer decides order, rollback and timeouts; a launcher only knows how to
/// start and stop one agent.
#[async_trait]
pub trait AgentLauncher: Send + Sync {
    async fn start(&self, spec: &AgentSpec) -> Result<AgentHandle, LaunchError>;

    async fn stop(&self, agent: &DeployedAgent) -> Result<(), LaunchError>;
}
