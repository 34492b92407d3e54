// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Agent lifecycle across hosts: which agents run where, and bringing them up
//! and down.

mod agent;
#[allow(clippy::module_inception)]
mod deployer;
mod launcher;

pub use crate::config::validate_config;
pub use agent::{AgentHandle, AgentKind, AgentSpec, DeployedAgent, LaunchParameters};
pub use deployer::Deployer;
pub use launcher::ProcessLauncher;
