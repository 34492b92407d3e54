// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod broker;
mod channel;
mod config;
mod deployment;
mod registry;
mod resource;
mod workflow;

pub use broker::BrokerError;
pub use channel::ChannelError;
pub use config::{ConfigError, ValidationError};
pub use deployment::{DeploymentError, LaunchError, TeardownFailure};
pub use registry::RegistryError;
pub use resource::ResourceError;
pub use workflow::WorkflowError;
