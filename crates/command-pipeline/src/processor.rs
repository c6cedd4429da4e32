//! One command in, one [`CommandOutcome`] out.
//!
//! Routing order: emergency keywords, learned aliases, the sequence cache,
//! the intent cache, and finally the language-model interpreter. Interpreted
//! results are gated by [`ConfidenceBands`]; plans run on a blocking thread
//! since the actuator handshake blocks.

use crate::config::{Band, ConfidenceBands, PipelineConfig};
use crate::{
    CommandHistory, CommandOutcome, CommandRecord, EmergencyDetector, MemoryWriter, MetricsHub,
    Origin, PipelineError, Result, Route,
};
use actuator_link::HaltHandle;
use instruction_set::{Compiler, ExecutionPlan, LearnRequest, Params, SharedRegistry};
use parking_lot::Mutex;
use phrase_cache::{EntrySource, MatchKind, SharedPhraseBank};
use robot_executor::{ExecError, Executor};
use sequence_interpreter::{
    detect_alias, refers_to_usual, Interpretation, SequenceInterpreter, USUAL_ALIAS,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A plan held back until the user answers yes or no.
struct PendingCommand {
    text: String,
    plan: ExecutionPlan,
    route: Route,
    confidence: f64,
    interpretation: Option<Interpretation>,
}

fn route_for(kind: MatchKind) -> Route {
    match kind {
        MatchKind::Exact => Route::CacheExact,
        MatchKind::Fuzzy => Route::CacheFuzzy,
    }
}

/// Yes/no reading of `text`, if it is a bare answer.
fn answer(text: &str) -> Option<bool> {
    let text = text
        .trim()
        .trim_end_matches(['.', '!', '?', ','])
        .to_lowercase();
    match text.as_str() {
        "yes" | "yeah" | "yep" | "sure" | "ok" | "okay" | "correct" | "do it" | "go ahead"
        | "yes please" => Some(true),
        "no" | "nope" | "cancel" | "never mind" | "nevermind" | "don't" | "no thanks" => {
            Some(false)
        }
        _ => None,
    }
}

fn describe(interpretation: &Interpretation) -> String {
    if !interpretation.interpretation.is_empty() {
        return interpretation.interpretation.clone();
    }
    interpretation
        .sequence
        .iter()
        .map(|call| call.instruction.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct CommandProcessor {
    registry: SharedRegistry,
    bank: SharedPhraseBank,
    interpreter: SequenceInterpreter,
    executor: Arc<Mutex<Executor>>,
    halt: HaltHandle,
    detector: EmergencyDetector,
    memory: MemoryWriter,
    bands: ConfidenceBands,
    learn_threshold: f64,
    history: CommandHistory,
    metrics: MetricsHub,
    pending: Mutex<Option<PendingCommand>>,
}

impl CommandProcessor {
    pub fn new(
        registry: SharedRegistry,
        bank: SharedPhraseBank,
        interpreter: SequenceInterpreter,
        executor: Executor,
        config: &PipelineConfig,
    ) -> Result<Self> {
        let halt = executor.halt_handle();
        let learn_threshold = interpreter.config().learn_threshold;
        Ok(Self {
            memory: MemoryWriter::new(registry.clone(), bank.clone()),
            registry,
            bank,
            interpreter,
            executor: Arc::new(Mutex::new(executor)),
            halt,
            detector: EmergencyDetector::default(),
            bands: config.bands.clone(),
            learn_threshold,
            history: CommandHistory::new(config.history_path.clone()),
            metrics: MetricsHub::new()?,
            pending: Mutex::new(None),
        })
    }

    pub fn with_detector(mut self, detector: EmergencyDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }

    pub fn metrics(&self) -> &MetricsHub {
        &self.metrics
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn bank(&self) -> &SharedPhraseBank {
        &self.bank
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Route, run and record one command.
    pub async fn process(&self, text: &str, origin: Origin) -> CommandOutcome {
        let text = text.trim();
        self.metrics.cmd.commands.inc();
        let outcome = self.dispatch(text).await;
        self.finish(text, origin, outcome)
    }

    /// Resolve the pending command, if any.
    pub async fn confirm(&self, yes: bool) -> CommandOutcome {
        self.metrics.cmd.commands.inc();
        let text = self
            .pending
            .lock()
            .as_ref()
            .map(|p| p.text.clone())
            .unwrap_or_default();
        let outcome = self.resolve_pending(yes).await;
        self.finish(&text, Origin::Confirmation, outcome)
    }

    /// Raise the halt without waiting on the executor.
    pub fn emergency_stop(&self, text: &str) -> CommandOutcome {
        self.pending.lock().take();
        self.metrics.cmd.emergency_stops.inc();
        if !self.halt.is_halted() {
            if let Err(e) = self.halt.trigger() {
                error!(error = %e, "failed to write halt frame");
            }
        }
        warn!(%text, "emergency stop");
        CommandOutcome::Halted {
            reason: format!("emergency stop ('{text}')"),
        }
    }

    pub fn resume(&self) {
        self.halt.resume();
    }

    fn finish(&self, text: &str, origin: Origin, outcome: CommandOutcome) -> CommandOutcome {
        if matches!(outcome, CommandOutcome::Failed { .. }) {
            self.metrics.cmd.failures.inc();
        }
        info!(
            %text,
            ?origin,
            outcome = outcome.kind(),
            route = outcome.route().map(|r| r.as_str()),
            "command processed"
        );
        if let Err(e) = self
            .history
            .append(&CommandRecord::new(text, origin, &outcome))
        {
            warn!(error = %e, "failed to append command history");
        }
        outcome
    }

    async fn dispatch(&self, text: &str) -> CommandOutcome {
        if self.detector.is_emergency(text) {
            return self.emergency_stop(text);
        }
        if self.halt.is_halted() {
            return CommandOutcome::Halted {
                reason: "emergency halt is active, resume to continue".to_string(),
            };
        }
        if text.is_empty() {
            return CommandOutcome::NothingToExecute {
                feedback: "Nothing to do".to_string(),
            };
        }

        let has_pending = self.pending.lock().is_some();
        if has_pending {
            if let Some(yes) = answer(text) {
                return self.resolve_pending(yes).await;
            }
            self.pending.lock().take();
            debug!(%text, "pending confirmation superseded");
        }

        if let Some(outcome) = self.try_alias(text).await {
            return outcome;
        }
        if let Some(outcome) = self.try_sequence_cache(text).await {
            return outcome;
        }
        if let Some(outcome) = self.try_intent_cache(text).await {
            return outcome;
        }
        self.interpret(text).await
    }

    async fn try_alias(&self, text: &str) -> Option<CommandOutcome> {
        let composite = {
            let bank = self.bank.lock();
            bank.resolve_alias(text)
                .or_else(|| {
                    (refers_to_usual(text) && detect_alias(text).is_none())
                        .then(|| bank.resolve_alias(USUAL_ALIAS))
                        .flatten()
                })
                .map(|alias| alias.maps_to_composite.clone())
        }?;

        let compiled = {
            let registry = self.registry.read();
            Compiler::new(&registry).compile(&composite, &Params::new())
        };
        let mut plan = match compiled {
            Ok(plan) => plan,
            Err(e) => {
                warn!(%text, %composite, error = %e, "alias target does not compile");
                return None;
            }
        };
        plan.source_command = text.to_string();
        self.metrics.cmd.alias_hits.inc();
        info!(%text, %composite, "alias hit");
        let notes = vec![format!("'{text}' is an alias for {composite}")];
        Some(self.execute(plan, Route::Alias, notes).await)
    }

    async fn try_sequence_cache(&self, text: &str) -> Option<CommandOutcome> {
        let hit = {
            let mut bank = self.bank.lock();
            let hit = bank.sequences().lookup(text)?;
            if !hit.needs_confirmation {
                if let Err(e) = bank.record_sequence_usage(&hit) {
                    warn!(error = %e, "failed to persist usage count");
                }
            }
            hit
        };
        let route = route_for(hit.kind);
        let mut plan = hit.result;
        plan.source_command = text.to_string();

        if hit.needs_confirmation {
            let prompt = format!("Did you mean '{}'? (yes/no)", hit.phrase);
            return Some(self.ask(
                PendingCommand {
                    text: text.to_string(),
                    plan,
                    route,
                    confidence: hit.similarity,
                    interpretation: None,
                },
                prompt,
            ));
        }
        self.count_hit(route);
        let notes = match hit.kind {
            MatchKind::Fuzzy => vec![format!(
                "Matched '{}' ({:.0}% similar)",
                hit.phrase,
                hit.similarity * 100.0
            )],
            MatchKind::Exact => Vec::new(),
        };
        Some(self.execute(plan, route, notes).await)
    }

    async fn try_intent_cache(&self, text: &str) -> Option<CommandOutcome> {
        let hit = {
            let mut bank = self.bank.lock();
            let hit = bank.intents().lookup(text)?;
            if !hit.needs_confirmation {
                if let Err(e) = bank.record_intent_usage(&hit) {
                    warn!(error = %e, "failed to persist usage count");
                }
            }
            hit
        };
        let compiled = {
            let registry = self.registry.read();
            Compiler::new(&registry).compile(&hit.result.intent, &hit.result.params)
        };
        let mut plan = match compiled {
            Ok(plan) => plan,
            Err(e) => {
                warn!(intent = %hit.result.intent, error = %e, "cached intent does not compile");
                return None;
            }
        };
        plan.source_command = text.to_string();
        plan.confidence = hit.confidence;
        let route = route_for(hit.kind);

        if hit.needs_confirmation {
            let prompt = format!("Did you mean '{}'? (yes/no)", hit.phrase);
            return Some(self.ask(
                PendingCommand {
                    text: text.to_string(),
                    plan,
                    route,
                    confidence: hit.similarity,
                    interpretation: None,
                },
                prompt,
            ));
        }
        self.count_hit(route);
        Some(self.execute(plan, route, Vec::new()).await)
    }

    async fn interpret(&self, text: &str) -> CommandOutcome {
        self.metrics.cmd.interpretations.inc();
        let interpretation = self.interpreter.interpret(text).await;
        if interpretation.is_empty() {
            self.metrics.cmd.failures.inc();
            return CommandOutcome::NothingToExecute {
                feedback: interpretation
                    .user_feedback
                    .unwrap_or_else(|| "I couldn't turn that into robot instructions".to_string()),
            };
        }

        let confidence = interpretation.confidence;
        let compiled = {
            let registry = self.registry.read();
            Compiler::new(&registry).compile_sequence(&interpretation.sequence, confidence)
        };
        let mut plan = match compiled {
            Ok(plan) if !plan.is_empty() => plan,
            Ok(_) => {
                return CommandOutcome::NothingToExecute {
                    feedback: "The interpreted sequence has no executable steps".to_string(),
                }
            }
            Err(e) => {
                return CommandOutcome::Failed {
                    route: Some(Route::Interpreter),
                    error: e.to_string(),
                }
            }
        };
        plan.source_command = text.to_string();
        plan.composite_name = interpretation.composite_name.clone();

        match self.bands.classify(confidence) {
            Band::Reject => CommandOutcome::Rejected {
                reason: interpretation
                    .user_feedback
                    .unwrap_or_else(|| format!("Not confident enough to act ({confidence:.2})")),
                confidence,
            },
            Band::Confirm => {
                let prompt = format!(
                    "I think you want: {}. Should I go ahead? (yes/no)",
                    describe(&interpretation)
                );
                self.ask(
                    PendingCommand {
                        text: text.to_string(),
                        plan,
                        route: Route::Interpreter,
                        confidence,
                        interpretation: Some(interpretation),
                    },
                    prompt,
                )
            }
            Band::ExecuteWithNotice => {
                let notice = interpretation.user_feedback.clone().unwrap_or_else(|| {
                    format!(
                        "Not fully sure ({:.0}%), going with: {}",
                        confidence * 100.0,
                        describe(&interpretation)
                    )
                });
                match self.execute(plan, Route::Interpreter, Vec::new()).await {
                    CommandOutcome::Executed { route, plan, .. } => {
                        let notes = self.learn(text, &interpretation, &plan, false);
                        CommandOutcome::ExecutedWithNotice {
                            route,
                            plan,
                            notice,
                            notes,
                        }
                    }
                    other => other,
                }
            }
            Band::Execute => {
                let notes = interpretation.user_feedback.iter().cloned().collect();
                match self.execute(plan, Route::Interpreter, notes).await {
                    CommandOutcome::Executed {
                        route,
                        plan,
                        mut notes,
                    } => {
                        notes.extend(self.learn(text, &interpretation, &plan, false));
                        CommandOutcome::Executed { route, plan, notes }
                    }
                    other => other,
                }
            }
        }
    }

    fn ask(&self, pending: PendingCommand, prompt: String) -> CommandOutcome {
        info!(text = %pending.text, confidence = pending.confidence, "awaiting confirmation");
        let outcome = CommandOutcome::NeedsConfirmation {
            route: pending.route,
            prompt,
            confidence: pending.confidence,
        };
        *self.pending.lock() = Some(pending);
        outcome
    }

    async fn resolve_pending(&self, yes: bool) -> CommandOutcome {
        let pending = self.pending.lock().take();
        let Some(pending) = pending else {
            return CommandOutcome::NothingToExecute {
                feedback: "Nothing is waiting for confirmation".to_string(),
            };
        };
        if !yes {
            info!(text = %pending.text, "pending command declined");
            return CommandOutcome::Rejected {
                reason: format!("Cancelled '{}'", pending.text),
                confidence: pending.confidence,
            };
        }
        if self.halt.is_halted() {
            return CommandOutcome::Halted {
                reason: "emergency halt is active, resume to continue".to_string(),
            };
        }

        let PendingCommand {
            text,
            plan,
            route,
            interpretation,
            ..
        } = pending;
        match self.execute(plan, route, Vec::new()).await {
            CommandOutcome::Executed {
                route,
                plan,
                mut notes,
            } => {
                match &interpretation {
                    Some(interpretation) => {
                        notes.extend(self.learn(&text, interpretation, &plan, true));
                    }
                    None => {
                        self.count_hit(route);
                        let confidence = plan.confidence.max(self.learn_threshold);
                        self.remember_phrase(
                            &text,
                            &plan,
                            confidence,
                            EntrySource::ConfirmedLearned,
                            &mut notes,
                        );
                    }
                }
                CommandOutcome::Executed { route, plan, notes }
            }
            other => other,
        }
    }

    fn count_hit(&self, route: Route) {
        match route {
            Route::CacheExact => self.metrics.cmd.exact_hits.inc(),
            Route::CacheFuzzy => self.metrics.cmd.fuzzy_hits.inc(),
            Route::Alias | Route::Interpreter => {}
        }
    }

    async fn execute(&self, plan: ExecutionPlan, route: Route, notes: Vec<String>) -> CommandOutcome {
        match self.run_plan(&plan).await {
            Ok(()) => CommandOutcome::Executed { route, plan, notes },
            Err(PipelineError::Exec(e)) if matches!(e.root(), ExecError::Halted) => {
                CommandOutcome::Halted {
                    reason: "emergency halt interrupted the plan".to_string(),
                }
            }
            Err(e) => CommandOutcome::Failed {
                route: Some(route),
                error: e.to_string(),
            },
        }
    }

    async fn run_plan(&self, plan: &ExecutionPlan) -> Result<()> {
        let executor = Arc::clone(&self.executor);
        let plan = plan.clone();
        let (result, unconfirmed) = tokio::task::spawn_blocking(move || {
            let mut executor = executor.lock();
            let result = executor.execute_plan(&plan);
            (result, executor.unconfirmed_moves())
        })
        .await
        .map_err(|e| PipelineError::Join(e.to_string()))?;
        self.metrics
            .cmd
            .ack_timeouts
            .set(i64::try_from(unconfirmed).unwrap_or(i64::MAX));
        result?;
        Ok(())
    }

    /// Post-execution learning for an interpreted plan.
    fn learn(
        &self,
        text: &str,
        interpretation: &Interpretation,
        plan: &ExecutionPlan,
        confirmed: bool,
    ) -> Vec<String> {
        let mut notes = Vec::new();
        if interpretation.learning_directive.is_some() {
            match self.memory.commit(interpretation) {
                Ok(Some(summary)) => {
                    self.metrics.cmd.composites_learned.inc();
                    notes.push(summary.message);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "failed to commit learned mapping"),
            }
            return notes;
        }
        if interpretation.is_creative || !interpretation.substitutions.is_empty() {
            debug!(%text, "creative or substituted result, not learned");
            return notes;
        }

        let (confidence, source) = if confirmed {
            (
                interpretation.confidence.max(self.learn_threshold),
                EntrySource::ConfirmedLearned,
            )
        } else {
            (interpretation.confidence, EntrySource::Learned)
        };
        if confidence < self.learn_threshold {
            return notes;
        }
        self.remember_phrase(text, plan, confidence, source, &mut notes);
        if let Some(name) = &interpretation.composite_name {
            self.learn_composite(name, text, interpretation, confidence, &mut notes);
        }
        notes
    }

    fn remember_phrase(
        &self,
        text: &str,
        plan: &ExecutionPlan,
        confidence: f64,
        source: EntrySource,
        notes: &mut Vec<String>,
    ) {
        let learned = self
            .bank
            .lock()
            .learn_sequence(text, plan.clone(), confidence, source);
        match learned {
            Ok(true) => {
                self.metrics.cmd.phrases_learned.inc();
                notes.push(format!("Learned '{text}'"));
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "failed to persist learned phrase"),
        }
    }

    fn learn_composite(
        &self,
        name: &str,
        text: &str,
        interpretation: &Interpretation,
        confidence: f64,
        notes: &mut Vec<String>,
    ) {
        if self.registry.read().contains(name) {
            return;
        }
        let request = LearnRequest {
            name: name.to_string(),
            description: describe(interpretation),
            parameters: Default::default(),
            sequence: interpretation.sequence.clone(),
            confidence,
            source_phrase: text.to_string(),
        };
        let learned = self.registry.write().learn(request);
        match learned {
            Ok(true) => {
                self.metrics.cmd.composites_learned.inc();
                notes.push(format!("Saved composite '{name}'"));
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "failed to persist learned composite"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::bundled_registry;
    use actuator_link::{CommandFrame, MockLink};
    use phrase_cache::{CacheConfig, PhraseBank};
    use robot_executor::{AssemblyExecutor, MotionConfig};
    use sequence_interpreter::{mock::MockModel, InterpreterConfig};
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Harness {
        processor: CommandProcessor,
        model: Arc<MockModel>,
        registry: SharedRegistry,
        bank: SharedPhraseBank,
        frames: Arc<Mutex<Vec<CommandFrame>>>,
        history: PathBuf,
        _dir: TempDir,
    }

    fn harness(responses: Vec<String>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let registry = bundled_registry().into_shared();
        let bank = PhraseBank::in_memory(CacheConfig::default()).into_shared();
        let model = Arc::new(MockModel::with_responses(responses));
        let interpreter = SequenceInterpreter::new(
            model.clone(),
            registry.clone(),
            InterpreterConfig {
                seed: Some(7),
                ..InterpreterConfig::default()
            },
        );
        let link = MockLink::new();
        let frames = link.frames();
        let executor = Executor::new(registry.clone(), Box::new(link), MotionConfig::default())
            .with_domain(Box::new(AssemblyExecutor::new()));
        let history = dir.path().join("history.jsonl");
        let config = PipelineConfig {
            history_path: Some(history.clone()),
            ..PipelineConfig::default()
        };
        let processor =
            CommandProcessor::new(registry.clone(), bank.clone(), interpreter, executor, &config)
                .unwrap();
        Harness {
            processor,
            model,
            registry,
            bank,
            frames,
            history,
            _dir: dir,
        }
    }

    fn response(sequence: &str, confidence: f64, feedback: Option<&str>) -> String {
        let feedback = feedback.map_or("null".to_string(), |f| format!("\"{f}\""));
        format!(
            r#"{{"interpretation": "test plan", "sequence": {sequence}, "composite_name": null, "confidence": {confidence}, "user_feedback": {feedback}, "creative_reasoning": null}}"#
        )
    }

    const GO_HOME: &str = r#"[{"instruction": "go_home", "params": {}}]"#;

    #[test]
    fn answers_are_recognised() {
        assert_eq!(answer("Yes."), Some(true));
        assert_eq!(answer("never mind"), Some(false));
        assert_eq!(answer("yes put it there"), None);
    }

    #[tokio::test]
    async fn interpreted_command_is_learned_then_served_from_cache() -> anyhow::Result<()> {
        let h = harness(vec![response(GO_HOME, 0.95, None)]);

        let first = h.processor.process("go home", Origin::Final).await;
        match &first {
            CommandOutcome::Executed { route, plan, notes } => {
                assert_eq!(*route, Route::Interpreter);
                assert_eq!(plan.len(), 1);
                assert!(notes.iter().any(|n| n == "Learned 'go home'"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(h.model.call_count(), 1);

        let second = h.processor.process("Go home.", Origin::Final).await;
        assert_eq!(second.route(), Some(Route::CacheExact));
        assert!(second.is_executed());
        assert_eq!(h.model.call_count(), 1);
        assert_eq!(h.frames.lock().len(), 2);

        let metrics = h.processor.metrics().encode_text();
        assert!(metrics.contains("sr_cache_exact_hits 1"));
        assert!(metrics.contains("sr_interpretations 1"));
        assert!(metrics.contains("sr_phrases_learned 1"));

        let records = CommandHistory::read(&h.history)?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].route, Some(Route::Interpreter));
        assert_eq!(records[1].route, Some(Route::CacheExact));
        Ok(())
    }

    #[tokio::test]
    async fn low_confidence_is_rejected_with_feedback() {
        let h = harness(vec![response(GO_HOME, 0.2, Some("That doesn't make sense to me"))]);
        let outcome = h.processor.process("flibber the gronk", Origin::Final).await;
        assert_eq!(
            outcome,
            CommandOutcome::Rejected {
                reason: "That doesn't make sense to me".into(),
                confidence: 0.2
            }
        );
        assert!(h.frames.lock().is_empty());
        assert!(h.bank.lock().sequences().is_empty());
    }

    #[tokio::test]
    async fn middle_band_waits_for_yes_and_learns_as_confirmed() {
        let h = harness(vec![response(GO_HOME, 0.55, None)]);
        let outcome = h.processor.process("head back", Origin::Final).await;
        assert!(matches!(outcome, CommandOutcome::NeedsConfirmation { .. }));
        assert!(h.processor.has_pending());
        assert!(h.frames.lock().is_empty());

        let confirmed = h.processor.process("yes", Origin::Final).await;
        assert!(confirmed.is_executed());
        assert_eq!(h.frames.lock().len(), 1);
        let bank = h.bank.lock();
        let entry = &bank.sequences().entries()["head back"];
        assert_eq!(entry.source, EntrySource::ConfirmedLearned);
        assert_eq!(h.model.call_count(), 1);
    }

    #[tokio::test]
    async fn declined_confirmation_runs_nothing() {
        let h = harness(vec![response(GO_HOME, 0.55, None)]);
        h.processor.process("head back", Origin::Final).await;
        let outcome = h.processor.confirm(false).await;
        assert!(matches!(outcome, CommandOutcome::Rejected { .. }));
        assert!(!h.processor.has_pending());
        assert!(h.frames.lock().is_empty());
        assert!(h.bank.lock().sequences().is_empty());
    }

    #[tokio::test]
    async fn notice_band_executes_without_learning() {
        let h = harness(vec![response(GO_HOME, 0.75, None)]);
        let outcome = h.processor.process("go back to base", Origin::Final).await;
        match outcome {
            CommandOutcome::ExecutedWithNotice { notice, .. } => {
                assert!(notice.starts_with("Not fully sure (75%)"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(h.bank.lock().sequences().is_empty());
    }

    #[tokio::test]
    async fn emergency_halts_until_resumed() {
        let h = harness(vec![response(GO_HOME, 0.95, None)]);
        let outcome = h.processor.process("STOP!", Origin::Partial).await;
        assert!(matches!(outcome, CommandOutcome::Halted { .. }));
        assert!(h.processor.halt_handle().is_halted());
        assert!(h.frames.lock().last().map_or(false, |f| f.emergency_halt));

        let blocked = h.processor.process("go home", Origin::Final).await;
        assert!(matches!(blocked, CommandOutcome::Halted { .. }));
        assert_eq!(h.model.call_count(), 0);

        h.processor.resume();
        let resumed = h.processor.process("go home", Origin::Final).await;
        assert!(resumed.is_executed());
        assert!(h
            .processor
            .metrics()
            .encode_text()
            .contains("sr_emergency_stops 1"));
    }

    #[tokio::test]
    async fn learning_directive_creates_alias_after_execution() {
        let layers = r#"[
            {"instruction": "add_layer", "params": {"item": "bread"}},
            {"instruction": "add_layer", "params": {"item": "cheese"}},
            {"instruction": "add_layer", "params": {"item": "bread"}}
        ]"#;
        let h = harness(vec![response(layers, 0.9, None)]);

        let outcome = h
            .processor
            .process("bread cheese bread, remember this as my usual", Origin::Final)
            .await;
        match &outcome {
            CommandOutcome::Executed { notes, .. } => {
                assert!(notes
                    .iter()
                    .any(|n| n.starts_with("Saved composite 'learned_my_usual' (3 steps).")));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(h
            .registry
            .read()
            .learned_composites()
            .contains_key("learned_my_usual"));

        let usual = h.processor.process("make my usual", Origin::Final).await;
        assert_eq!(usual.route(), Some(Route::Alias));
        assert!(usual.is_executed());
        assert_eq!(h.model.call_count(), 1);
        assert_eq!(
            h.registry
                .read()
                .state()
                .stack("assembly_fixture")
                .height,
            6
        );
    }

    #[tokio::test]
    async fn execution_failure_is_reported_and_not_learned() {
        let bad = r#"[{"instruction": "move_to", "params": {"location": "moon"}}]"#;
        let h = harness(vec![response(bad, 0.95, None)]);
        let outcome = h.processor.process("go to the moon", Origin::Final).await;
        assert!(matches!(
            outcome,
            CommandOutcome::Failed {
                route: Some(Route::Interpreter),
                ..
            }
        ));
        assert!(h.bank.lock().sequences().is_empty());
        assert!(h
            .processor
            .metrics()
            .encode_text()
            .contains("sr_command_failures 1"));
    }

    #[tokio::test]
    async fn model_failure_gives_feedback_not_silence() {
        let h = harness(Vec::new());
        let outcome = h.processor.process("do a little dance", Origin::Final).await;
        assert_eq!(
            outcome,
            CommandOutcome::NothingToExecute {
                feedback: "No language model is configured".into()
            }
        );
    }
}
