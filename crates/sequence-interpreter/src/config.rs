use serde::{Deserialize, Serialize};

/// Thresholds and budgets for the three-pass pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Pass 1 confidence at or above which validation is skipped.
    pub high_confidence_skip: f64,
    /// Minimum confidence for a result to be learned downstream.
    pub learn_threshold: f64,
    /// Per-call timeout.
    pub call_timeout_ms: u64,
    pub generation_tokens: u32,
    pub validation_tokens: u32,
    pub regeneration_tokens: u32,
    pub creative_temperature: f32,
    /// Fixed seed for creative axis assignment; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            high_confidence_skip: 0.88,
            learn_threshold: 0.80,
            call_timeout_ms: 30_000,
            generation_tokens: 900,
            validation_tokens: 700,
            regeneration_tokens: 900,
            creative_temperature: 1.0,
            seed: None,
        }
    }
}

impl InterpreterConfig {
    /// Confidence ceiling applied when an item had to be substituted.
    pub fn substitution_cap(&self) -> f64 {
        (self.learn_threshold - 0.05).max(0.0)
    }
}

/// Which language model backend to construct, and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// `anthropic` or `mock`.
    pub backend: String,
    pub model: String,
    pub endpoint: String,
    pub api_version: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: "anthropic".to_string(),
            model: "claude-3-haiku-20240307".to_string(),
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            api_version: "2023-06-01".to_string(),
            api_key: None,
        }
    }
}
