// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::BrokerConfig;

/// Processors the deployment serves and the queue each one consumes.
///
/// Built once from the validated configuration. A processor is known exactly
/// when some host deploys a worker for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessorCatalog {
    entries: Vec<(String, String)>,
}

impl ProcessorCatalog {
    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::from_names(config.processor_names())
    }

    /// Every processor consumes the queue of the same name
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<(String, String)> = Vec::new();
        for name in names {
            let name = name.into();
            if !entries.iter().any(|(known, _)| *known == name) {
                entries.push((name.clone(), name));
            }
        }
        Self { entries }
    }

    pub fn queue_for(&self, processor: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == processor)
            .map(|(_, queue)| queue.as_str())
    }

    pub fn contains(&self, processor: &str) -> bool {
        self.queue_for(processor).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique_and_ordered() {
        let catalog = ProcessorCatalog::from_names(["ocrd-b", "ocrd-a", "ocrd-b"]);
        assert_eq!(catalog.names(), vec!["ocrd-b", "ocrd-a"]);
        assert_eq!(catalog.queue_for("ocrd-a"), Some("ocrd-a"));
        assert!(!catalog.contains("ocrd-c"));
    }
}
