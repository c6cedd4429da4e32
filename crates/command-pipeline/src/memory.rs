//! Persists learning directives once their command has run.

use crate::Result;
use instruction_set::{InstructionRegistry, LearnRequest, SharedRegistry};
use phrase_cache::SharedPhraseBank;
use sequence_interpreter::{composite_name_for, Interpretation};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySummary {
    pub composite_name: String,
    pub alias: String,
    pub steps: usize,
    pub message: String,
}

pub struct MemoryWriter {
    registry: SharedRegistry,
    bank: SharedPhraseBank,
}

fn is_builtin(registry: &InstructionRegistry, name: &str) -> bool {
    registry.is_primitive(name) || registry.document().composites.contains_key(name)
}

impl MemoryWriter {
    pub fn new(registry: SharedRegistry, bank: SharedPhraseBank) -> Self {
        Self { registry, bank }
    }

    /// Save the interpreted sequence as a learned composite and link the
    /// directive's alias to it.
    ///
    /// Returns `None` when the interpretation carries no directive or the
    /// registry refuses the composite. A built-in name is never overwritten;
    /// the composite is stored under a name derived from the alias instead.
    pub fn commit(&self, interpretation: &Interpretation) -> Result<Option<MemorySummary>> {
        let Some(directive) = &interpretation.learning_directive else {
            return Ok(None);
        };

        let name = {
            let mut registry = self.registry.write();
            let name = if is_builtin(&registry, &directive.composite_name) {
                composite_name_for(&directive.alias)
            } else {
                directive.composite_name.clone()
            };
            let description = if interpretation.interpretation.is_empty() {
                format!("Learned from: {}", interpretation.command)
            } else {
                interpretation.interpretation.clone()
            };
            let learned = registry.learn(LearnRequest {
                name: name.clone(),
                description,
                parameters: Default::default(),
                sequence: interpretation.sequence.clone(),
                confidence: interpretation.confidence,
                source_phrase: interpretation.command.clone(),
            })?;
            if !learned {
                warn!(%name, alias = %directive.alias, "composite not saved, alias skipped");
                return Ok(None);
            }
            name
        };

        self.bank
            .lock()
            .add_alias(&directive.alias, &name, &interpretation.command)?;
        info!(composite = %name, alias = %directive.alias, "memory committed");

        let steps = interpretation.sequence.len();
        Ok(Some(MemorySummary {
            message: format!(
                "Saved composite '{name}' ({steps} steps). Alias '{alias}' -> '{name}' saved to phrase bank. \
                 Will be available in future sessions.",
                alias = directive.alias
            ),
            composite_name: name,
            alias: directive.alias.clone(),
            steps,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bundled_registry, interpretation};
    use instruction_set::InstructionCall;
    use phrase_cache::{CacheConfig, PhraseBank};
    use sequence_interpreter::LearningDirective;
    use serde_json::json;

    fn layer(item: &str) -> InstructionCall {
        InstructionCall::new("add_layer", json!({ "item": item }).as_object().cloned().unwrap())
    }

    #[test]
    fn writes_composite_and_alias() -> anyhow::Result<()> {
        let registry = bundled_registry().into_shared();
        let bank = PhraseBank::in_memory(CacheConfig::default()).into_shared();
        let writer = MemoryWriter::new(registry.clone(), bank.clone());

        let mut interp = interpretation(
            "bread cheese bread, remember this as my usual",
            vec![layer("bread"), layer("cheese"), layer("bread")],
            0.9,
        );
        interp.learning_directive = Some(LearningDirective {
            alias: "my usual".into(),
            composite_name: "learned_my_usual".into(),
        });

        let summary = writer.commit(&interp)?.unwrap();
        assert_eq!(summary.composite_name, "learned_my_usual");
        assert_eq!(summary.steps, 3);
        assert!(summary.message.starts_with("Saved composite 'learned_my_usual' (3 steps)."));
        assert!(registry.read().learned_composites().contains_key("learned_my_usual"));
        assert_eq!(
            bank.lock()
                .resolve_alias("My usual")
                .map(|a| a.maps_to_composite.clone()),
            Some("learned_my_usual".to_string())
        );
        Ok(())
    }

    #[test]
    fn builtin_names_are_not_shadowed() -> anyhow::Result<()> {
        let registry = bundled_registry().into_shared();
        let bank = PhraseBank::in_memory(CacheConfig::default()).into_shared();
        let writer = MemoryWriter::new(registry.clone(), bank.clone());

        let mut interp = interpretation(
            "go home every time i say retreat",
            vec![InstructionCall::bare("go_home")],
            0.95,
        );
        interp.learning_directive = Some(LearningDirective {
            alias: "retreat".into(),
            composite_name: "go_home".into(),
        });

        let summary = writer.commit(&interp)?.unwrap();
        assert_eq!(summary.composite_name, "learned_retreat");
        assert!(registry.read().document().composites["go_home"].learned_at.is_none());
        assert!(bank.lock().resolve_alias("retreat").is_some());
        Ok(())
    }

    #[test]
    fn no_directive_means_no_write() -> anyhow::Result<()> {
        let registry = bundled_registry().into_shared();
        let bank = PhraseBank::in_memory(CacheConfig::default()).into_shared();
        let writer = MemoryWriter::new(registry, bank.clone());
        let interp = interpretation("go home", vec![InstructionCall::bare("go_home")], 0.95);
        assert!(writer.commit(&interp)?.is_none());
        assert!(bank.lock().aliases().is_empty());
        Ok(())
    }
}
