use crate::{PipelineError, Result};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct CommandMetrics {
    pub commands: IntCounter,
    pub exact_hits: IntCounter,
    pub fuzzy_hits: IntCounter,
    pub alias_hits: IntCounter,
    pub interpretations: IntCounter,
    pub phrases_learned: IntCounter,
    pub composites_learned: IntCounter,
    pub failures: IntCounter,
    pub emergency_stops: IntCounter,
    /// Moves whose acknowledgment never arrived, as of the last plan.
    pub ack_timeouts: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub cmd: CommandMetrics,
}

fn counter(name: &str, help: &str) -> Result<IntCounter> {
    IntCounter::new(name, help).map_err(|e| PipelineError::Metrics(e.to_string()))
}

impl MetricsHub {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let cmd = CommandMetrics {
            commands: counter("sr_commands_total", "Commands processed")?,
            exact_hits: counter("sr_cache_exact_hits", "Commands served by an exact phrase match")?,
            fuzzy_hits: counter("sr_cache_fuzzy_hits", "Commands served by a fuzzy phrase match")?,
            alias_hits: counter("sr_alias_hits", "Commands resolved through a learned alias")?,
            interpretations: counter("sr_interpretations", "Commands sent to the language model")?,
            phrases_learned: counter("sr_phrases_learned", "Phrase to sequence mappings learned")?,
            composites_learned: counter("sr_composites_learned", "Composites added to the registry")?,
            failures: counter("sr_command_failures", "Commands that failed to parse or execute")?,
            emergency_stops: counter("sr_emergency_stops", "Emergency halts issued")?,
            ack_timeouts: IntGauge::new("sr_ack_timeouts", "Moves executed without acknowledgment")
                .map_err(|e| PipelineError::Metrics(e.to_string()))?,
        };
        let _ = registry.register(Box::new(cmd.commands.clone()));
        let _ = registry.register(Box::new(cmd.exact_hits.clone()));
        let _ = registry.register(Box::new(cmd.fuzzy_hits.clone()));
        let _ = registry.register(Box::new(cmd.alias_hits.clone()));
        let _ = registry.register(Box::new(cmd.interpretations.clone()));
        let _ = registry.register(Box::new(cmd.phrases_learned.clone()));
        let _ = registry.register(Box::new(cmd.composites_learned.clone()));
        let _ = registry.register(Box::new(cmd.failures.clone()));
        let _ = registry.register(Box::new(cmd.emergency_stops.clone()));
        let _ = registry.register(Box::new(cmd.ack_timeouts.clone()));
        Ok(Self { registry, cmd })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
