use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ResourceError;

/// One entry of a resource database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default = "default_resource_type")]
    pub kind: String,
    #[serde(default)]
    pub size: u64,
}

fn default_resource_type() -> String {
    "file".to_string()
}

/// Lookup-and-fetch of processor resources under a fixed search path.
#[async_trait]
pub trait ResourceLocator: Send + Sync {
    /// Every location the resource may live at, in lookup order
    fn candidates(&self, executable: &str, name: &str, module_dir: Option<&Path>) -> Vec<PathBuf>;

    /// First candidate that exists
    fn locate(&self, executable: &str, name: &str, module_dir: Option<&Path>) -> Option<PathBuf> {
        self.candidates(executable, name, module_dir)
            .into_iter()
            .find(|candidate| candidate.exists())
    }

    /// Resources recorded for `executable` in the user database
    fn registered(&self, executable: &str) -> Result<Vec<ResourceRecord>, ResourceError>;

    /// Download `url` into the user resource directory and register it
    async fn fetch(&self, executable: &str, url: &str, name: Option<&str>) -> Result<PathBuf, ResourceError>;
}
