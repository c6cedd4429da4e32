use crate::{Direction, DomainExecutor, ExecError, MotionCore, Result};
use instruction_set::{param_str, Params, SpeedLevel};
use tracing::info;

const HANDLED: [&str; 6] = [
    "add_layer",
    "serve",
    "clear_assembly",
    "adjust_speed",
    "set_active_zone",
    "return_to_stack",
];

const DEFAULT_PLATE: &str = "plate_1";

/// Height-aware stacking on the active assembly zone.
///
/// Stack contents live in the scene state so they survive restarts; every
/// change is written back through the registry.
#[derive(Debug, Default)]
pub struct AssemblyExecutor;

impl AssemblyExecutor {
    pub fn new() -> Self {
        Self
    }

    fn add_layer(&self, params: &Params, core: &mut MotionCore) -> Result<()> {
        let item = param_str(params, "item").ok_or(ExecError::MissingParam {
            instruction: "add_layer",
            param: "item",
        })?;
        let (zone, height, max_height, tile) = {
            let reg = core.registry().read();
            if !reg.has_item(item) {
                return Err(ExecError::UnknownItem(item.to_string()));
            }
            let zone = reg.state().active_zone.clone();
            let height = reg.state().stack(&zone).height;
            let c = reg.constraints();
            (zone, height, c.max_stack_height, c.tile_height_cm)
        };
        if height >= max_height {
            return Err(ExecError::Rejected(format!(
                "stack at {zone} is full ({height}/{max_height})"
            )));
        }

        let lift = core.config().lift_cm;
        let drop = core.config().drop_for_height(height, tile);
        core.move_to(&format!("{item}_slot"))?;
        core.gripper_close()?;
        core.move_relative(Direction::Up, lift)?;
        core.move_to(&zone)?;
        core.move_relative(Direction::Down, drop)?;
        core.gripper_open()?;
        core.move_relative(Direction::Up, drop)?;

        let mut reg = core.registry().write();
        reg.update_state(|s| {
            let stack = s.stack_mut(&zone);
            stack.items.push(item.to_string());
            stack.height += 1;
            s.holding = None;
        })?;
        info!(%item, %zone, height = height + 1, "add_layer");
        Ok(())
    }

    fn serve(&self, params: &Params, core: &mut MotionCore) -> Result<()> {
        let plate = param_str(params, "plate").unwrap_or(DEFAULT_PLATE).to_string();
        let (zone, stack) = {
            let reg = core.registry().read();
            if reg.location(&plate).is_none() {
                return Err(ExecError::UnknownLocation(plate));
            }
            let zone = reg.state().active_zone.clone();
            let stack = reg.state().stack(&zone);
            (zone, stack)
        };
        if stack.items.is_empty() {
            return Err(ExecError::Rejected(format!("nothing to serve at {zone}")));
        }

        let lift = core.config().lift_cm;
        let drop = core.config().place_drop_cm;
        core.move_to(&zone)?;
        core.gripper_close()?;
        core.move_relative(Direction::Up, lift)?;
        core.move_to(&plate)?;
        core.move_relative(Direction::Down, drop)?;
        core.gripper_open()?;
        core.move_relative(Direction::Up, drop)?;

        let mut reg = core.registry().write();
        reg.update_state(|s| {
            s.plates.insert(plate.clone(), stack.items.clone());
            *s.stack_mut(&zone) = Default::default();
            s.holding = None;
        })?;
        info!(%plate, served = ?stack.items, "serve");
        Ok(())
    }

    /// Return items top to bottom; an empty zone is already clear.
    fn clear_assembly(&self, core: &mut MotionCore) -> Result<()> {
        let (zone, tile) = {
            let reg = core.registry().read();
            (reg.state().active_zone.clone(), reg.constraints().tile_height_cm)
        };
        let lift = core.config().lift_cm;
        let drop = core.config().place_drop_cm;
        loop {
            let stack = core.registry().read().state().stack(&zone);
            let Some(top) = stack.items.last().cloned() else {
                break;
            };
            let pick_drop = core
                .config()
                .drop_for_height(stack.height.saturating_sub(1), tile);
            core.move_to(&zone)?;
            core.move_relative(Direction::Down, pick_drop)?;
            core.gripper_close()?;
            core.move_relative(Direction::Up, lift)?;
            core.move_to(&format!("{top}_slot"))?;
            core.move_relative(Direction::Down, drop)?;
            core.gripper_open()?;
            core.move_relative(Direction::Up, drop)?;

            core.registry().write().update_state(|s| {
                let stack = s.stack_mut(&zone);
                stack.items.pop();
                stack.height = stack.height.saturating_sub(1);
            })?;
            info!(item = %top, %zone, "returned to slot");
        }
        Ok(())
    }

    fn adjust_speed(&self, params: &Params, core: &mut MotionCore) -> Result<()> {
        let word = param_str(params, "modifier").unwrap_or("normal");
        let level = SpeedLevel::from_word(word).unwrap_or_default();
        core.set_speed(level)
    }

    fn set_active_zone(&self, params: &Params, core: &mut MotionCore) -> Result<()> {
        let zone = param_str(params, "zone").ok_or(ExecError::MissingParam {
            instruction: "set_active_zone",
            param: "zone",
        })?;
        let mut reg = core.registry().write();
        let is_zone = reg
            .location(zone)
            .map(|l| l.kind.as_deref() == Some("assembly_zone") || zone.starts_with("assembly"))
            .ok_or_else(|| ExecError::UnknownLocation(zone.to_string()))?;
        if !is_zone {
            return Err(ExecError::Rejected(format!("{zone} is not an assembly zone")));
        }
        reg.update_state(|s| {
            s.active_zone = zone.to_string();
            s.stack_mut(zone);
        })?;
        info!(%zone, "active zone");
        Ok(())
    }

    fn return_to_stack(&self, core: &mut MotionCore) -> Result<()> {
        let Some(item) = core.registry().read().state().holding.clone() else {
            info!("return_to_stack: not holding anything");
            return Ok(());
        };
        let drop = core.config().place_drop_cm;
        core.move_to(&format!("{item}_slot"))?;
        core.move_relative(Direction::Down, drop)?;
        core.gripper_open()?;
        core.move_relative(Direction::Up, drop)?;
        info!(%item, "return_to_stack");
        Ok(())
    }
}

impl DomainExecutor for AssemblyExecutor {
    fn can_handle(&self, instruction: &str) -> bool {
        HANDLED.contains(&instruction)
    }

    fn execute(&mut self, instruction: &str, params: &Params, core: &mut MotionCore) -> Result<()> {
        match instruction {
            "add_layer" => self.add_layer(params, core),
            "serve" => self.serve(params, core),
            "clear_assembly" => self.clear_assembly(core),
            "adjust_speed" => self.adjust_speed(params, core),
            "set_active_zone" => self.set_active_zone(params, core),
            "return_to_stack" => self.return_to_stack(core),
            other => Err(ExecError::NoExecutor(other.to_string())),
        }
    }
}
