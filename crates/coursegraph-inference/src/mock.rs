//! Mock completion backend for deterministic testing.
//!
//! Responses are selected by substring match against the outgoing prompt,
//! so a test can script one reply per slide or batch without a network.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use coursegraph_core::{CompletionBackend, Error, Result};

/// One recorded completion call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub system: String,
    pub prompt: String,
    pub json: bool,
}

#[derive(Debug, Default)]
struct MockState {
    /// (needle, response) pairs tried in insertion order against the prompt.
    mappings: Vec<(String, String)>,
    /// Prompts containing any of these needles fail with an inference error.
    failures: Vec<String>,
    default_response: String,
    calls: Vec<MockCall>,
}

/// Scriptable completion backend.
#[derive(Clone, Default)]
pub struct MockCompletionBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockCompletionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond with `response` whenever the prompt contains `needle`.
    /// Mappings are matched in insertion order; the first hit wins.
    pub fn with_response_for(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.state
            .lock()
            .expect("mock state lock")
            .mappings
            .push((needle.into(), response.into()));
        self
    }

    /// Response returned when no mapping matches.
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        self.state.lock().expect("mock state lock").default_response = response.into();
        self
    }

    /// Fail with an inference error whenever the prompt contains `needle`.
    pub fn with_failure_for(self, needle: impl Into<String>) -> Self {
        self.state
            .lock()
            .expect("mock state lock")
            .failures
            .push(needle.into());
        self
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().expect("mock state lock").calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().expect("mock state lock").calls.len()
    }

    fn respond(&self, system: &str, prompt: &str, json: bool) -> Result<String> {
        let mut state = self.state.lock().expect("mock state lock");
        state.calls.push(MockCall {
            system: system.to_string(),
            prompt: prompt.to_string(),
            json,
        });

        if let Some(needle) = state.failures.iter().find(|n| prompt.contains(n.as_str())) {
            return Err(Error::Inference(format!(
                "mock failure triggered by '{}'",
                needle
            )));
        }

        let hit = state
            .mappings
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, response)| response.clone());
        Ok(hit.unwrap_or_else(|| state.default_response.clone()))
    }
}

#[async_trait]
impl CompletionBackend for MockCompletionBackend {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        self.respond(system, prompt, false)
    }

    async fn complete_json(&self, system: &str, prompt: &str) -> Result<String> {
        self.respond(system, prompt, true)
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
