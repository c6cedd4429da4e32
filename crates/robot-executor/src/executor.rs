use crate::{DomainExecutor, ExecError, MotionConfig, MotionCore, Primitive, Result};
use actuator_link::{ActuatorLink, HaltHandle, Position};
use instruction_set::{ExecutionPlan, ExecutionStep, SharedRegistry};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Runs plans step by step: primitives directly, everything else through
/// the optional domain executor.
pub struct Executor {
    core: MotionCore,
    domain: Option<Box<dyn DomainExecutor>>,
}

impl Executor {
    pub fn new(registry: SharedRegistry, link: Box<dyn ActuatorLink>, config: MotionConfig) -> Self {
        Self {
            core: MotionCore::new(registry, link, config),
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: Box<dyn DomainExecutor>) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn position(&self) -> Position {
        self.core.position()
    }

    pub fn position_handle(&self) -> Arc<Mutex<Position>> {
        self.core.position_handle()
    }

    pub fn halt_handle(&self) -> HaltHandle {
        self.core.halt_handle()
    }

    pub fn unconfirmed_moves(&self) -> u64 {
        self.core.unconfirmed_moves()
    }

    pub fn can_execute(&self, instruction: &str) -> bool {
        Primitive::is_primitive(instruction)
            || self
                .domain
                .as_ref()
                .map_or(false, |d| d.can_handle(instruction))
    }

    pub fn execute_step(&mut self, step: &ExecutionStep) -> Result<()> {
        if self.core.halt_handle().is_halted() {
            return Err(ExecError::Halted);
        }
        debug!(instruction = %step.instruction, params = ?step.params, "executing step");
        if let Some(primitive) = Primitive::parse(&step.instruction, &step.params, self.core.config()) {
            return self.core.run(primitive?);
        }
        match self.domain.as_mut() {
            Some(domain) if domain.can_handle(&step.instruction) => {
                domain.execute(&step.instruction, &step.params, &mut self.core)
            }
            _ => Err(ExecError::NoExecutor(step.instruction.clone())),
        }
    }

    /// Execute in order, stopping at the first failure. Completed steps are
    /// not rolled back.
    pub fn execute_plan(&mut self, plan: &ExecutionPlan) -> Result<()> {
        info!(steps = plan.len(), source = %plan.source_command, "executing plan");
        for (index, step) in plan.steps.iter().enumerate() {
            if let Err(e) = self.execute_step(step) {
                error!(index, instruction = %step.instruction, error = %e, "plan aborted");
                return Err(ExecError::Step {
                    index,
                    instruction: step.instruction.clone(),
                    source: Box::new(e),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AssemblyExecutor;
    use actuator_link::{CommandFrame, MockLink};
    use instruction_set::{InstructionRegistry, InstructionSetDocument, Params, SceneContext, SpeedLevel};
    use serde_json::json;

    fn scene() -> SceneContext {
        serde_json::from_value(json!({
            "items": {"bread": {}, "cheese": {}},
            "locations": {
                "home": {"position": {"x": 0.0, "y": 0.567, "z": -0.24}},
                "bread_slot": {"position": {"x": -0.3, "y": 0.05, "z": 0.1}, "type": "item_stack", "item": "bread"},
                "cheese_slot": {"position": {"x": -0.1, "y": 0.05, "z": 0.1}, "type": "item_stack", "item": "cheese"},
                "assembly_fixture": {"position": {"x": 0.0, "y": 0.05, "z": 0.3}, "type": "assembly_zone"},
                "assembly_left": {"position": {"x": -0.2, "y": 0.05, "z": 0.3}, "type": "assembly_zone"},
                "plate_1": {"position": {"x": 0.3, "y": 0.05, "z": 0.0}, "type": "plate"}
            },
            "constraints": {"max_stack_height": 8, "tile_height_cm": 1.0}
        }))
        .unwrap()
    }

    fn executor() -> (Executor, SharedRegistry, Arc<Mutex<Vec<CommandFrame>>>) {
        let registry = InstructionRegistry::new(InstructionSetDocument::default(), scene()).into_shared();
        let link = MockLink::new();
        let frames = link.frames();
        let exec = Executor::new(registry.clone(), Box::new(link), MotionConfig::default())
            .with_domain(Box::new(AssemblyExecutor::new()));
        (exec, registry, frames)
    }

    fn step(name: &str, params: serde_json::Value) -> ExecutionStep {
        ExecutionStep::new(name, params.as_object().cloned().unwrap_or_default())
    }

    fn close(a: Position, b: Position) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9 && (a.z - b.z).abs() < 1e-9
    }

    #[test]
    fn starts_at_scene_position_and_moves_relative() -> anyhow::Result<()> {
        let (mut exec, _, frames) = executor();
        assert!(close(exec.position(), Position::new(0.0, 0.567, -0.24)));
        exec.execute_step(&step("move_relative", json!({"direction": "right", "distance": 5})))?;
        exec.execute_step(&step("move_relative", json!({"direction": "down"})))?;
        assert!(close(exec.position(), Position::new(0.05, 0.557, -0.24)));
        assert_eq!(frames.lock().len(), 2);
        Ok(())
    }

    #[test]
    fn gripper_tracks_held_item() -> anyhow::Result<()> {
        let (mut exec, registry, _) = executor();
        exec.execute_step(&step("move_to", json!({"location": "cheese_slot"})))?;
        exec.execute_step(&step("gripper_close", json!({})))?;
        assert_eq!(registry.read().state().holding.as_deref(), Some("cheese"));
        exec.execute_step(&step("gripper_open", json!({})))?;
        assert_eq!(registry.read().state().holding, None);
        Ok(())
    }

    #[test]
    fn stack_never_exceeds_max_height() -> anyhow::Result<()> {
        let (mut exec, registry, _) = executor();
        let add = step("add_layer", json!({"item": "bread"}));
        for _ in 0..8 {
            exec.execute_step(&add)?;
        }
        let err = exec.execute_step(&add).unwrap_err();
        assert!(matches!(err, ExecError::Rejected(_)));
        let stack = registry.read().state().stack("assembly_fixture");
        assert_eq!(stack.items.len(), 8);
        assert_eq!(stack.height, 8);
        Ok(())
    }

    #[test]
    fn serve_moves_stack_to_plate_and_resets_zone() -> anyhow::Result<()> {
        let (mut exec, registry, _) = executor();
        assert!(matches!(
            exec.execute_step(&step("serve", json!({}))),
            Err(ExecError::Rejected(_))
        ));
        exec.execute_step(&step("add_layer", json!({"item": "bread"})))?;
        exec.execute_step(&step("add_layer", json!({"item": "cheese"})))?;
        exec.execute_step(&step("serve", json!({})))?;
        let reg = registry.read();
        assert_eq!(reg.state().plates["plate_1"], vec!["bread", "cheese"]);
        assert_eq!(reg.state().stack("assembly_fixture").height, 0);
        Ok(())
    }

    #[test]
    fn clear_assembly_empties_top_down_and_is_idempotent() -> anyhow::Result<()> {
        let (mut exec, registry, frames) = executor();
        exec.execute_step(&step("clear_assembly", json!({})))?;
        assert!(frames.lock().is_empty());

        exec.execute_step(&step("add_layer", json!({"item": "bread"})))?;
        exec.execute_step(&step("add_layer", json!({"item": "cheese"})))?;
        frames.lock().clear();
        exec.execute_step(&step("clear_assembly", json!({})))?;
        assert_eq!(registry.read().state().stack("assembly_fixture"), Default::default());

        // First item returned is the top one, so the first slot visit is cheese.
        let cheese_slot = registry.read().location("cheese_slot").map(|l| l.position);
        let first_slot_visit = frames
            .lock()
            .iter()
            .map(CommandFrame::position)
            .find(|p| Some(*p) == cheese_slot || Some(*p) == registry.read().location("bread_slot").map(|l| l.position));
        assert_eq!(first_slot_visit, cheese_slot);
        Ok(())
    }

    #[test]
    fn zones_are_independent_and_validated() -> anyhow::Result<()> {
        let (mut exec, registry, _) = executor();
        exec.execute_step(&step("set_active_zone", json!({"zone": "assembly_left"})))?;
        exec.execute_step(&step("add_layer", json!({"item": "bread"})))?;
        assert!(matches!(
            exec.execute_step(&step("set_active_zone", json!({"zone": "plate_1"}))),
            Err(ExecError::Rejected(_))
        ));
        let reg = registry.read();
        assert_eq!(reg.state().stack("assembly_left").height, 1);
        assert_eq!(reg.state().stack("assembly_fixture").height, 0);
        Ok(())
    }

    #[test]
    fn adjust_speed_defaults_to_normal() -> anyhow::Result<()> {
        let (mut exec, registry, _) = executor();
        exec.execute_step(&step("adjust_speed", json!({"modifier": "careful"})))?;
        assert_eq!(registry.read().state().speed, SpeedLevel::Slow);
        exec.execute_step(&step("adjust_speed", json!({"modifier": "zippy"})))?;
        assert_eq!(registry.read().state().speed, SpeedLevel::Normal);
        Ok(())
    }

    #[test]
    fn plan_aborts_on_first_failure_without_rollback() {
        let (mut exec, registry, frames) = executor();
        let plan = ExecutionPlan {
            steps: vec![
                step("move_to", json!({"location": "bread_slot"})),
                step("juggle", json!({})),
                step("move_to", json!({"location": "home"})),
            ],
            source_command: "test".into(),
            composite_name: None,
            confidence: 1.0,
        };
        let err = exec.execute_plan(&plan).unwrap_err();
        assert!(matches!(err, ExecError::Step { index: 1, .. }));
        assert!(matches!(err.root(), ExecError::NoExecutor(name) if name == "juggle"));
        assert_eq!(frames.lock().len(), 1);
        assert_eq!(registry.read().state().current_position, "bread_slot");
    }

    #[test]
    fn halt_blocks_further_steps() -> anyhow::Result<()> {
        let (mut exec, _, frames) = executor();
        exec.halt_handle().trigger()?;
        assert!(matches!(
            exec.execute_step(&step("gripper_open", json!({}))),
            Err(ExecError::Halted)
        ));
        assert!(frames.lock().last().map_or(false, |f| f.emergency_halt));
        exec.halt_handle().resume();
        exec.execute_step(&step("gripper_open", json!({})))?;
        Ok(())
    }

    #[test]
    fn unknown_instruction_without_domain_has_no_executor() {
        let registry = InstructionRegistry::new(InstructionSetDocument::default(), scene()).into_shared();
        let mut exec = Executor::new(registry, Box::new(MockLink::new()), MotionConfig::default());
        assert!(!exec.can_execute("add_layer"));
        assert!(matches!(
            exec.execute_step(&ExecutionStep::new("add_layer", Params::new())),
            Err(ExecError::NoExecutor(_))
        ));
    }

    #[test]
    fn non_finite_step_numbers_fail_the_step() {
        let (mut exec, _, frames) = executor();
        assert!(matches!(
            exec.execute_step(&step("wait", json!({"seconds": "NaN"}))),
            Err(ExecError::Rejected(_))
        ));
        assert!(matches!(
            exec.execute_step(&step("move_relative", json!({"direction": "left", "distance": "inf"}))),
            Err(ExecError::Rejected(_))
        ));
        assert!(frames.lock().is_empty());
    }

    #[test]
    fn halt_cuts_a_long_wait_short() -> anyhow::Result<()> {
        let (mut exec, _, _) = executor();
        let halt = exec.halt_handle();
        let trigger = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(100));
            halt.trigger()
        });
        let started = std::time::Instant::now();
        let result = exec.execute_step(&step("wait", json!({"seconds": 20})));
        assert!(matches!(result, Err(ExecError::Halted)));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        trigger.join().map_err(|_| anyhow::anyhow!("trigger thread panicked"))??;
        Ok(())
    }
}
