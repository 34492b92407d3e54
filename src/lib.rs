// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // processor backends
pub mod broker;     // orchestrator service + HTTP API
pub mod channel;    // message channel implementations
pub mod config;     // config loading + validation
pub mod deployer;   // agent lifecycle
pub mod errors;     // error handling
pub mod observability;
pub mod registry;   // job/workflow state
pub mod traits;     // unified abstractions
pub mod worker;     // processing worker runtime
pub mod workflow;   // workflow definitions + sequencing
pub mod workspace;  // workspace + resource adapters
