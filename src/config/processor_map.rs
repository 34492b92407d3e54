// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::backends::command::CommandProcessor;
use crate::traits::Processor;
use std::collections::HashMap;
use std::sync::Arc;

/// Processors served by one worker agent, keyed by processor name.
///
/// The name doubles as the queue the worker consumes from. `Arc` lets the
/// consumer tasks of several queues share the same processor instances.
///
/// # Examples
///
/// ```ignore
/// use std::sync::Arc;
/// use processing_broker::config::ProcessorMap;
/// use processing_broker::backends::command::CommandProcessor;
///
/// let mut processors = ProcessorMap::new();
/// processors.insert(
///     "ocrd-dummy".to_string(),
///     Arc::new(CommandProcessor::new("ocrd-dummy")),
/// );
/// assert!(processors.contains_key("ocrd-dummy"));
/// ```
#[derive(Clone, Default)]
pub struct ProcessorMap(pub HashMap<String, Arc<dyn Processor>>);

impl ProcessorMap {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// One external command processor per name
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut processors = Self::new();
        for name in names {
            let name = name.as_ref();
            processors.insert(name.to_string(), Arc::new(CommandProcessor::new(name)));
        }
        processors
    }

    pub fn insert(&mut self, name: String, processor: Arc<dyn Processor>) {
        self.0.insert(name, processor);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Processor>> {
        self.0.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<dyn Processor>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ProcessorMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorMap")
            .field("processor_count", &self.0.len())
            .field("processor_names", &self.0.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl From<HashMap<String, Arc<dyn Processor>>> for ProcessorMap {
    fn from(map: HashMap<String, Arc<dyn Processor>>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_names_table_driven() {
        struct TestCase {
            name: &'static str,
            names: Vec<&'static str>,
            expected_count: usize,
        }

        let test_cases = vec![
            TestCase {
                name: "empty",
                names: vec![],
                expected_count: 0,
            },
            TestCase {
                name: "single processor",
                names: vec!["ocrd-dummy"],
                expected_count: 1,
            },
            TestCase {
                name: "duplicate names collapse",
                names: vec!["ocrd-dummy", "ocrd-dummy", "ocrd-tesserocr-recognize"],
                expected_count: 2,
            },
        ];

        for case in test_cases {
            let processors = ProcessorMap::from_names(&case.names);
            assert_eq!(
                processors.len(),
                case.expected_count,
                "Test case '{}': wrong processor count",
                case.name
            );
            for name in &case.names {
                let processor = processors.get(name).unwrap();
                assert_eq!(processor.name(), *name, "Test case '{}'", case.name);
            }
        }
    }
}
