// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Adapters for the workspace and resource collaborators.

pub mod directory;
pub mod resources;

pub use directory::{DirectoryWorkspace, DirectoryWorkspaceResolver, WORKSPACE_INDEX};
pub use resources::{ResourceDatabase, ResourceManager};
