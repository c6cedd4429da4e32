//! Three-pass natural-language interpreter.
//!
//! 1. Generate: one model call with the full registry context.
//! 2. Validate: a second call that fixes invalid names, run only when a local
//!    check found problems and no skip condition applies.
//! 3. Regenerate: the Pass 1 prompt again with the validator's issues as
//!    correction hints, run only for genuine issues.
//!
//! [`SequenceInterpreter::interpret`] never fails: model errors and
//! unparseable output become zero-confidence results with user feedback.

use crate::config::InterpreterConfig;
use crate::creative::{self, CreativeAssignment};
use crate::directive::{self, LearningDirective};
use crate::error::ModelError;
use crate::json::{number_field, parse_object, sequence_field, string_field, string_list_field};
use crate::model::{CompletionRequest, LanguageModel, Pass};
use crate::prompt::{generation_prompt, validation_prompt, ValidNames};
use crate::substitution::{self, Substitution};
use instruction_set::{param_str, InstructionCall, InstructionRegistry, SharedRegistry};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const DIRECTIONS: [&str; 6] = ["right", "left", "up", "down", "forward", "backward"];

/// Structured result of interpreting one command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interpretation {
    pub command: String,
    pub interpretation: String,
    pub sequence: Vec<InstructionCall>,
    pub composite_name: Option<String>,
    pub confidence: f64,
    pub validated: bool,
    pub issues: Vec<String>,
    pub user_feedback: Option<String>,
    pub is_creative: bool,
    pub creative_reasoning: Option<String>,
    /// Pass 1 output before validation, for display.
    pub pass1_sequence: Vec<InstructionCall>,
    /// Raw model text or error when the result could not be used.
    pub raw_response: Option<String>,
    pub substitutions: Vec<Substitution>,
    pub learning_directive: Option<LearningDirective>,
    /// Model calls made for this command.
    pub passes: u8,
}

impl Interpretation {
    fn empty(command: &str, is_creative: bool) -> Self {
        Self {
            command: command.to_string(),
            interpretation: String::new(),
            sequence: Vec::new(),
            composite_name: None,
            confidence: 0.0,
            validated: false,
            issues: Vec::new(),
            user_feedback: None,
            is_creative,
            creative_reasoning: None,
            pass1_sequence: Vec::new(),
            raw_response: None,
            substitutions: Vec::new(),
            learning_directive: None,
            passes: 0,
        }
    }

    fn failed(command: &str, is_creative: bool, err: &ModelError) -> Self {
        let feedback = err.user_feedback();
        Self {
            interpretation: feedback.clone(),
            user_feedback: Some(feedback),
            raw_response: Some(err.to_string()),
            passes: 1,
            ..Self::empty(command, is_creative)
        }
    }

    fn unparseable(command: &str, is_creative: bool, raw: String) -> Self {
        Self {
            interpretation: raw.chars().take(300).collect(),
            issues: vec!["Pass 1 returned non-JSON response".to_string()],
            user_feedback: Some("Couldn't parse the language model response".to_string()),
            raw_response: Some(raw),
            passes: 1,
            ..Self::empty(command, is_creative)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Items placed by `add_layer` steps, in order.
    pub fn layers(&self) -> Vec<String> {
        layers(&self.sequence)
    }
}

fn layers(sequence: &[InstructionCall]) -> Vec<String> {
    sequence
        .iter()
        .filter(|call| call.instruction == "add_layer")
        .filter_map(|call| param_str(&call.params, "item").map(str::to_string))
        .collect()
}

/// Problems visible without a model call.
fn local_issues(sequence: &[InstructionCall], registry: &InstructionRegistry) -> Vec<String> {
    let mut issues = Vec::new();
    for call in sequence {
        if !registry.contains(&call.instruction) {
            issues.push(format!("unknown instruction: {}", call.instruction));
            continue;
        }
        if let Some(item) = param_str(&call.params, "item") {
            if !registry.has_item(item) {
                issues.push(format!("unknown item: {item}"));
            }
        }
        if let Some(location) = param_str(&call.params, "location") {
            if registry.location(location).is_none() {
                issues.push(format!("unknown location: {location}"));
            }
        }
        if call.instruction == "move_relative" {
            if let Some(direction) = param_str(&call.params, "direction") {
                if !DIRECTIONS.contains(&direction.to_lowercase().as_str()) {
                    issues.push(format!("unknown direction: {direction}"));
                }
            }
        }
    }
    issues
}

/// Validator issues worth a regeneration pass.
fn genuine(issues: &[String]) -> Vec<String> {
    issues
        .iter()
        .filter(|issue| {
            let lower = issue.to_lowercase();
            !lower.contains("unparseable") && !lower.contains("error")
        })
        .cloned()
        .collect()
}

pub struct SequenceInterpreter {
    model: Arc<dyn LanguageModel>,
    registry: SharedRegistry,
    config: InterpreterConfig,
    rng: Mutex<StdRng>,
}

impl SequenceInterpreter {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        registry: SharedRegistry,
        config: InterpreterConfig,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            model,
            registry,
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    async fn call(
        &self,
        pass: Pass,
        prompt: String,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ModelError> {
        let request = CompletionRequest {
            pass,
            prompt,
            temperature,
            max_tokens,
        };
        let limit = Duration::from_millis(self.config.call_timeout_ms);
        match tokio::time::timeout(limit, self.model.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::Timeout(format!(
                "{} pass after {} ms",
                pass.as_str(),
                self.config.call_timeout_ms
            ))),
        }
    }

    /// Interpret `command` into an instruction sequence.
    pub async fn interpret(&self, command: &str) -> Interpretation {
        let command = command.trim();
        let is_creative = creative::is_creative(command);
        if command.chars().count() < 2 {
            return Interpretation {
                user_feedback: Some("Command too short to interpret".to_string()),
                ..Interpretation::empty(command, is_creative)
            };
        }

        let (context, items) = {
            let reg = self.registry.read();
            (reg.llm_context(), reg.items().keys().cloned().collect::<Vec<_>>())
        };
        let assignment: Option<CreativeAssignment> = is_creative.then(|| {
            let named = self.registry.read().items_mentioned(command);
            creative::assign(named, &mut *self.rng.lock())
        });
        if let Some(a) = &assignment {
            info!(structure = %a.structure, logic = %a.logic, "creative assignment");
        }

        // Pass 1
        let temperature = if is_creative {
            self.config.creative_temperature
        } else {
            0.0
        };
        let prompt = generation_prompt(&context, command, assignment.as_ref(), &items, &[]);
        let raw = match self
            .call(Pass::Generate, prompt, temperature, self.config.generation_tokens)
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%command, error = %err, "generation call failed");
                return Interpretation::failed(command, is_creative, &err);
            }
        };
        let Some(parsed) = parse_object(&raw) else {
            warn!(%command, raw = %raw.chars().take(120).collect::<String>(), "generation response unparseable");
            return Interpretation::unparseable(command, is_creative, raw);
        };

        let sequence = sequence_field(&parsed, "sequence");
        let mut result = Interpretation {
            interpretation: string_field(&parsed, "interpretation").unwrap_or_default(),
            pass1_sequence: sequence.clone(),
            sequence,
            composite_name: string_field(&parsed, "composite_name"),
            confidence: number_field(&parsed, "confidence")
                .unwrap_or(0.5)
                .clamp(0.0, 1.0),
            user_feedback: string_field(&parsed, "user_feedback"),
            creative_reasoning: string_field(&parsed, "creative_reasoning"),
            passes: 1,
            ..Interpretation::empty(command, is_creative)
        };
        self.substitute(&mut result);

        // Pass 2
        let (issues, recipe) = {
            let reg = self.registry.read();
            (
                local_issues(&result.sequence, &reg),
                reg.matching_recipe(&result.layers()).map(str::to_string),
            )
        };
        let skip = result.sequence.is_empty()
            || is_creative
            || result.confidence >= self.config.high_confidence_skip
            || recipe.is_some()
            || issues.is_empty();
        if skip {
            debug!(%command, confidence = result.confidence, recipe = ?recipe, "validation skipped");
            result.validated = true;
        } else {
            info!(%command, issues = ?issues, "validating sequence");
            self.validate(&mut result).await;
        }

        // Pass 3
        let corrections = genuine(&result.issues);
        if !corrections.is_empty() {
            self.regenerate(&mut result, &context, assignment.as_ref(), &items, corrections)
                .await;
        }

        self.finish(&mut result);
        result
    }

    async fn validate(&self, result: &mut Interpretation) {
        let prompt = {
            let reg = self.registry.read();
            let names = ValidNames {
                instructions: reg
                    .instructions()
                    .into_iter()
                    .filter(|i| i.llm_visible())
                    .map(|i| i.name)
                    .collect(),
                items: reg.items().keys().cloned().collect(),
                locations: reg.locations().keys().cloned().collect(),
                zones: reg
                    .locations()
                    .iter()
                    .filter(|(_, loc)| loc.kind.as_deref() == Some("assembly_zone"))
                    .map(|(name, _)| name.clone())
                    .collect(),
            };
            validation_prompt(
                &result.command,
                &result.interpretation,
                &result.sequence,
                &names,
            )
        };

        result.passes += 1;
        match self
            .call(Pass::Validate, prompt, 0.0, self.config.validation_tokens)
            .await
        {
            Ok(raw) => match parse_object(&raw).filter(|obj| obj.contains_key("sequence")) {
                Some(obj) => {
                    result.sequence = sequence_field(&obj, "sequence");
                    result.validated = obj
                        .get("valid")
                        .and_then(serde_json::Value::as_bool)
                        .unwrap_or(true);
                    result.issues = string_list_field(&obj, "issues");
                    if !result.issues.is_empty() {
                        info!(issues = ?result.issues, "validator reported issues");
                    }
                }
                None => {
                    warn!("validator response unparseable, keeping generated sequence");
                    result.validated = false;
                    result.issues = vec!["Validator response unparseable".to_string()];
                }
            },
            Err(err) => {
                warn!(error = %err, "validation call failed");
                result.validated = false;
                result.issues = vec![format!("Validation error: {err}")];
            }
        }
    }

    async fn regenerate(
        &self,
        result: &mut Interpretation,
        context: &str,
        assignment: Option<&CreativeAssignment>,
        items: &[String],
        corrections: Vec<String>,
    ) {
        info!(hints = corrections.len(), "regenerating with corrections");
        let prompt = generation_prompt(context, &result.command, assignment, items, &corrections);
        result.passes += 1;
        let raw = match self
            .call(Pass::Regenerate, prompt, 0.0, self.config.regeneration_tokens)
            .await
        {
            Ok(raw) => raw,
            Err(err) => {
                warn!(error = %err, "regeneration call failed, keeping validated result");
                return;
            }
        };
        let Some(obj) = parse_object(&raw).filter(|obj| obj.contains_key("sequence")) else {
            warn!("regeneration response unparseable, keeping validated result");
            return;
        };

        result.sequence = sequence_field(&obj, "sequence");
        if let Some(interpretation) = string_field(&obj, "interpretation") {
            result.interpretation = interpretation;
        }
        if let Some(confidence) = number_field(&obj, "confidence") {
            result.confidence = confidence.clamp(0.0, 1.0);
        }
        if obj.contains_key("user_feedback") {
            result.user_feedback = string_field(&obj, "user_feedback");
        }
        if let Some(reasoning) = string_field(&obj, "creative_reasoning") {
            result.creative_reasoning = Some(reasoning);
        }
        result.issues = corrections
            .iter()
            .map(|issue| format!("[P3 fixed] {issue}"))
            .collect();
        result.validated = true;
        self.substitute(result);
    }

    /// Swap unknown items and cap confidence below the learn threshold.
    fn substitute(&self, result: &mut Interpretation) {
        let swaps = {
            let reg = self.registry.read();
            substitution::apply_substitutions(&mut result.sequence, &reg)
        };
        let model_substituted = result
            .user_feedback
            .as_deref()
            .map(|fb| fb.to_lowercase().contains("i don't have"))
            .unwrap_or(false);
        if !swaps.is_empty() {
            info!(swaps = swaps.len(), "substituted unknown items");
            if result.user_feedback.is_none() {
                result.user_feedback = substitution::feedback(&swaps);
            }
            result.substitutions.extend(swaps);
        }
        if !result.substitutions.is_empty() || model_substituted {
            result.confidence = result.confidence.min(self.config.substitution_cap());
        }
    }

    fn finish(&self, result: &mut Interpretation) {
        {
            let reg = self.registry.read();
            let before = result.sequence.len();
            let mut dropped = Vec::new();
            result.sequence.retain(|call| {
                let known = reg.contains(&call.instruction);
                if !known {
                    dropped.push(call.instruction.clone());
                }
                known
            });
            if result.sequence.len() != before {
                warn!(dropped = ?dropped, "dropped steps with unknown instructions");
                result
                    .issues
                    .extend(dropped.iter().map(|name| format!("dropped unknown instruction: {name}")));
            }
        }

        if result.is_creative {
            result.composite_name = None;
            return;
        }

        if let Some(alias) = directive::detect_alias(&result.command) {
            let composite_name = result
                .composite_name
                .clone()
                .unwrap_or_else(|| directive::composite_name_for(&alias));
            if result.user_feedback.is_none() {
                result.user_feedback = Some(format!(
                    "Mapping noted, '{alias}' will be saved as an alias for {composite_name}"
                ));
            }
            result.composite_name = Some(composite_name.clone());
            result.learning_directive = Some(LearningDirective {
                alias,
                composite_name,
            });
        }
    }
}
