// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod loader;
mod processor_map;
mod resources;
mod validation;

pub mod consts;

pub use loader::{
    is_local_address, load_and_validate_config, load_raw_config, BrokerConfig, Credentials,
    DatabaseConfig, DeployType, HostConfig, QueueConfig, SshConfig, TimeoutConfig, WorkerConfig,
};
pub use processor_map::ProcessorMap;
pub use resources::{path_variable, ResourceSearchPath};
pub use validation::validate_config;
