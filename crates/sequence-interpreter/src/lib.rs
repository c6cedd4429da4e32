//! sequence-interpreter: natural language to instruction sequences
//!
//! Turns free-form commands into instruction sequences with a hosted language
//! model, using a generate / validate / regenerate pipeline that always
//! returns a structured [`Interpretation`].

mod error;
pub use error::{ModelError, Result};

mod config;
pub use config::{InterpreterConfig, ModelConfig};

mod model;
pub use model::{CompletionRequest, LanguageModel, ModelMetadata, Pass};

pub mod creative;
pub use creative::{is_creative, CreativeAssignment, IngredientLogic, Structure};

pub mod json;

mod prompt;
pub use prompt::{generation_prompt, validation_prompt, ValidNames};

mod substitution;
pub use substitution::{apply_substitutions, substitute_for, Substitution};

mod directive;
pub use directive::{composite_name_for, detect_alias, refers_to_usual, LearningDirective, USUAL_ALIAS};

mod interpreter;
pub use interpreter::{Interpretation, SequenceInterpreter};

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "anthropic")]
pub mod anthropic;

use std::sync::Arc;

/// Initialize the sequence interpreter system
pub fn init() -> Result<()> {
    tracing::info!("Initializing sequence interpreter system");
    Ok(())
}

/// Create a language model backend based on configuration
pub fn create_model(config: &ModelConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.backend.as_str() {
        #[cfg(feature = "mock")]
        "mock" => Ok(Arc::new(mock::MockModel::new())),
        #[cfg(feature = "anthropic")]
        "anthropic" => {
            let model = anthropic::AnthropicModel::new(config.clone())?;
            Ok(Arc::new(model))
        }
        other => Err(ModelError::Config(format!("unsupported model backend: {other}"))),
    }
}
