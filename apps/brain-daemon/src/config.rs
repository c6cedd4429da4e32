use actuator_link::HandshakeConfig;
use anyhow::Context;
use command_pipeline::PipelineConfig;
use phrase_cache::CacheConfig;
use robot_executor::MotionConfig;
use sequence_interpreter::{InterpreterConfig, ModelConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub instruction_set: PathBuf,
    pub scene_context: PathBuf,
    pub phrase_bank: PathBuf,
    pub handshake: HandshakeConfig,
    pub motion: MotionConfig,
    pub cache: CacheConfig,
    pub interpreter: InterpreterConfig,
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            instruction_set: PathBuf::from("data/instruction_set.json"),
            scene_context: PathBuf::from("data/scene_context.json"),
            phrase_bank: PathBuf::from("data/phrase_bank.json"),
            handshake: HandshakeConfig::default(),
            motion: MotionConfig::default(),
            cache: CacheConfig::default(),
            interpreter: InterpreterConfig::default(),
            model: ModelConfig::default(),
            pipeline: PipelineConfig {
                history_path: Some(PathBuf::from("data/command_history.jsonl")),
                ..PipelineConfig::default()
            },
        }
    }
}

impl DaemonConfig {
    /// Read `path` (YAML), falling back to defaults when it is absent, then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config: {}", path.display()))?;
                serde_yaml::from_str(&raw)
                    .with_context(|| format!("parsing yaml: {}", path.display()))?
            }
            Some(path) => {
                warn!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("ANTHROPIC_API_KEY").filter(|k| !k.is_empty()) {
            self.model.api_key = Some(key);
        }
        if let Some(model) = lookup("ANTHROPIC_MODEL").filter(|m| !m.is_empty()) {
            info!(%model, "model overridden from environment");
            self.model.model = model;
        }
        if let Some(value) = lookup("FUZZY_MATCH_THRESHOLD") {
            match value.parse::<f64>() {
                Ok(t) => self.cache.match_threshold = t,
                Err(_) => warn!(%value, "ignoring invalid FUZZY_MATCH_THRESHOLD"),
            }
        }
        if let Some(value) = lookup("LLM_CONFIDENCE_THRESHOLD") {
            match value.parse::<f64>() {
                Ok(t) => self.pipeline.bands.confirm_below = t,
                Err(_) => warn!(%value, "ignoring invalid LLM_CONFIDENCE_THRESHOLD"),
            }
        }
    }
}
