//! Scripted language model for development and testing

use crate::error::{ModelError, Result};
use crate::model::{CompletionRequest, LanguageModel, ModelMetadata};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// Returned once the script runs out.
const FALLBACK_RESPONSE: &str = r#"{"interpretation": "mock model has no scripted response", "sequence": [], "composite_name": null, "confidence": 0.0, "user_feedback": "No language model is configured", "creative_reasoning": null}"#;

/// Replays queued responses in order and records every request.
#[derive(Default)]
pub struct MockModel {
    script: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::new();
        for response in responses {
            model.push_response(response);
        }
        model
    }

    /// Sleep before answering, to exercise call timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_response(&self, response: impl Into<String>) {
        self.script.lock().push_back(Ok(response.into()));
    }

    pub fn push_error(&self, err: ModelError) {
        self.script.lock().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().pop_front();
        match next {
            Some(response) => response,
            None => {
                tracing::debug!(pass = request.pass.as_str(), "mock script exhausted");
                Ok(FALLBACK_RESPONSE.to_string())
            }
        }
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            name: "Mock Language Model".to_string(),
            backend: "mock".to_string(),
            model: "scripted".to_string(),
        }
    }
}
