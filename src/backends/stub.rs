// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Mutex;

use crate::traits::{Processor, ProcessorRequest, ProcessorResponse};

/// Succeeds without doing anything and remembers what it was asked to do
pub struct StubProcessor {
    pub name: String,
    requests: Mutex<Vec<ProcessorRequest>>,
}

impl StubProcessor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProcessorRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Processor for StubProcessor {
    async fn process(&self, req: ProcessorRequest) -> ProcessorResponse {
        self.requests.lock().unwrap().push(req);
        ProcessorResponse::Success
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A processor that always fails for testing failure scenarios
pub struct FailingProcessor {
    pub name: String,
}

impl FailingProcessor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Processor for FailingProcessor {
    async fn process(&self, _req: ProcessorRequest) -> ProcessorResponse {
        ProcessorResponse::failure("Simulated processor failure")
    }

    fn name(&self) -> &str {
        &self.name
    }
}
