use crate::error::Result;
use async_trait::async_trait;

/// Which interpreter pass issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Generate,
    Validate,
    Regenerate,
}

impl Pass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pass::Generate => "generate",
            Pass::Validate => "validate",
            Pass::Regenerate => "regenerate",
        }
    }
}

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub pass: Pass,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ModelMetadata {
    pub name: String,
    pub backend: String,
    pub model: String,
}

/// Text-completion backend used by the interpreter.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `request.prompt` and return the raw response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Get model metadata
    fn metadata(&self) -> ModelMetadata;
}
