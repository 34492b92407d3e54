// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Processor resources: lookup along the search path, download, and the
//! user resource database (`resources.yml`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::ResourceSearchPath;
use crate::errors::ResourceError;
use crate::traits::{ResourceLocator, ResourceRecord};

const EXECUTABLE_PREFIX: &str = "ocrd-";

/// Resources per executable, as stored in `resources.yml`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceDatabase(pub BTreeMap<String, Vec<ResourceRecord>>);

impl ResourceDatabase {
    /// A missing or empty file is an empty database.
    pub fn load(path: &Path) -> Result<Self, ResourceError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Self::parse(&text).map_err(|reason| ResourceError::InvalidDatabase {
            path: path.display().to_string(),
            reason,
        })
    }

    /// The document must map `ocrd-*` executables to lists of records.
    fn parse(text: &str) -> Result<Self, String> {
        let document: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
        let entries = match document {
            serde_yaml::Value::Null => return Ok(Self::default()),
            serde_yaml::Value::Mapping(entries) => entries,
            _ => return Err("expected a mapping of executables to resource lists".to_string()),
        };

        let mut database = BTreeMap::new();
        for (key, value) in entries {
            let executable = key
                .as_str()
                .filter(|name| name.starts_with(EXECUTABLE_PREFIX))
                .ok_or_else(|| format!("{:?} is not an ocrd-* executable name", key))?
                .to_string();
            if !value.is_sequence() {
                return Err(format!("resources of {} must be a list", executable));
            }
            let records: Vec<ResourceRecord> = serde_yaml::from_value(value)
                .map_err(|e| format!("resources of {}: {}", executable, e))?;
            database.insert(executable, records);
        }
        Ok(Self(database))
    }

    pub fn save(&self, path: &Path) -> Result<(), ResourceError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let text = serde_yaml::to_string(&self.0).map_err(|e| ResourceError::InvalidDatabase {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Insert or replace the record of the same name
    pub fn add(&mut self, executable: &str, record: ResourceRecord) {
        let records = self.0.entry(executable.to_string()).or_default();
        records.retain(|existing| existing.name != record.name);
        records.push(record);
    }

    /// Records matching every given filter
    pub fn find(
        &self,
        executable: Option<&str>,
        url: Option<&str>,
        name: Option<&str>,
    ) -> Vec<(String, ResourceRecord)> {
        self.0
            .iter()
            .filter(|(exe, _)| executable.map_or(true, |e| e == exe.as_str()))
            .flat_map(|(exe, records)| records.iter().map(move |r| (exe.clone(), r.clone())))
            .filter(|(_, r)| url.map_or(true, |u| u == r.url))
            .filter(|(_, r)| name.map_or(true, |n| n == r.name))
            .collect()
    }
}

/// Resource lookup and download under one search path.
pub struct ResourceManager {
    search: ResourceSearchPath,
    client: reqwest::Client,
}

impl ResourceManager {
    pub fn new(search: ResourceSearchPath) -> Self {
        Self {
            search,
            client: reqwest::Client::new(),
        }
    }

    pub fn search_path(&self) -> &ResourceSearchPath {
        &self.search
    }

    pub fn database(&self) -> Result<ResourceDatabase, ResourceError> {
        ResourceDatabase::load(&self.search.user_database())
    }

    /// Record an existing file in the user database. Without `url` the file
    /// location itself is recorded.
    pub fn add_to_user_database(
        &self,
        executable: &str,
        path: &Path,
        url: Option<&str>,
    ) -> Result<ResourceRecord, ResourceError> {
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let record = ResourceRecord {
            url: url
                .map(str::to_string)
                .unwrap_or_else(|| format!("file://{}", path.display())),
            description: format!("Found at {}", path.display()),
            kind: if metadata.is_dir() { "directory" } else { "file" }.to_string(),
            size: metadata.len(),
            name,
        };

        let database_path = self.search.user_database();
        let mut database = ResourceDatabase::load(&database_path)?;
        database.add(executable, record.clone());
        database.save(&database_path)?;
        Ok(record)
    }

    pub fn find_resources(
        &self,
        executable: Option<&str>,
        url: Option<&str>,
        name: Option<&str>,
    ) -> Result<Vec<(String, ResourceRecord)>, ResourceError> {
        Ok(self.database()?.find(executable, url, name))
    }

    async fn download(&self, url: &str, destination: &Path) -> Result<(), ResourceError> {
        let failed = |reason: String| ResourceError::Download {
            url: url.to_string(),
            reason,
        };

        if let Some(source) = url.strip_prefix("file://") {
            tokio::fs::copy(source, destination)
                .await
                .map_err(|e| failed(e.to_string()))?;
            return Ok(());
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?;
        let body = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        tokio::fs::write(destination, &body).await?;
        Ok(())
    }
}

fn name_from_url(url: &str) -> Option<&str> {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.trim_end_matches('/').rsplit('/').next())
        .filter(|name| !name.is_empty() && !name.contains(':'))
}

#[async_trait]
impl ResourceLocator for ResourceManager {
    fn candidates(&self, executable: &str, name: &str, module_dir: Option<&Path>) -> Vec<PathBuf> {
        self.search.candidates(executable, name, module_dir)
    }

    fn registered(&self, executable: &str) -> Result<Vec<ResourceRecord>, ResourceError> {
        Ok(self
            .find_resources(Some(executable), None, None)?
            .into_iter()
            .map(|(_, record)| record)
            .collect())
    }

    /// Already present files are registered again but not downloaded twice.
    async fn fetch(
        &self,
        executable: &str,
        url: &str,
        name: Option<&str>,
    ) -> Result<PathBuf, ResourceError> {
        let name = name
            .or_else(|| name_from_url(url))
            .ok_or_else(|| ResourceError::Download {
                url: url.to_string(),
                reason: "cannot derive a resource name from the URL".to_string(),
            })?;

        let dir = self.search.user_resource_dir(executable);
        tokio::fs::create_dir_all(&dir).await?;
        let destination = dir.join(name);
        if !destination.exists() {
            self.download(url, &destination).await?;
        }

        self.add_to_user_database(executable, &destination, Some(url))?;
        Ok(destination)
    }
}
