//! HTTP client for the Anthropic Messages API.

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::model::{CompletionRequest, LanguageModel, ModelMetadata};
use async_trait::async_trait;
use reqwest::StatusCode;

pub struct AnthropicModel {
    config: ModelConfig,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicModel {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ModelError::Config("ANTHROPIC_API_KEY not set".to_string()))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ModelError::Config(e.to_string()))?;
        Ok(Self {
            config,
            api_key,
            client,
        })
    }
}

fn classify(err: reqwest::Error) -> ModelError {
    if err.is_timeout() {
        ModelError::Timeout(err.to_string())
    } else {
        ModelError::Api(err.to_string())
    }
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        #[derive(serde::Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(serde::Serialize)]
        struct MessagesReq<'a> {
            model: &'a str,
            max_tokens: u32,
            temperature: f32,
            messages: [Message<'a>; 1],
        }

        let req = MessagesReq {
            model: &self.config.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let resp = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&req)
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        // 529 is the API's "overloaded" status.
        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 529 {
            return Err(ModelError::RateLimited(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api(format!("HTTP {status}: {body}")));
        }

        #[derive(serde::Deserialize)]
        struct ContentBlock {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            text: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct RespBody {
            content: Vec<ContentBlock>,
        }

        let body: RespBody = resp.json().await.map_err(classify)?;
        let text: String = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        tracing::debug!(pass = request.pass.as_str(), chars = text.len(), "model responded");
        Ok(text.trim().to_string())
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            name: "Anthropic Messages".to_string(),
            backend: "anthropic".to_string(),
            model: self.config.model.clone(),
        }
    }
}
