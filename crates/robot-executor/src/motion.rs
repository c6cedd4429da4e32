use crate::{Direction, ExecError, MotionConfig, Primitive, Result};
use actuator_link::{ActuatorLink, HaltHandle, Position};
use instruction_set::{GripperState, SharedRegistry, SpeedLevel};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Longest stretch `wait` sleeps between halt checks.
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Primitive motion handlers and the shared current position.
///
/// Every move goes through [`ActuatorLink::send_and_wait`]; the position it
/// reports replaces the locally computed one.
pub struct MotionCore {
    registry: SharedRegistry,
    link: Box<dyn ActuatorLink>,
    position: Arc<Mutex<Position>>,
    gripper_position: f64,
    config: MotionConfig,
    halt: HaltHandle,
    unconfirmed_moves: u64,
}

impl MotionCore {
    pub fn new(registry: SharedRegistry, link: Box<dyn ActuatorLink>, config: MotionConfig) -> Self {
        let start = {
            let reg = registry.read();
            reg.location(&reg.state().current_position)
                .map(|l| l.position)
                .unwrap_or(config.home)
        };
        let gripper_position = match registry.read().state().gripper {
            GripperState::Open => config.gripper_open,
            GripperState::Closed => config.gripper_closed,
        };
        let halt = link.halt_handle();
        Self {
            registry,
            link,
            position: Arc::new(Mutex::new(start)),
            gripper_position,
            config,
            halt,
            unconfirmed_moves: 0,
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn position(&self) -> Position {
        *self.position.lock()
    }

    pub fn position_handle(&self) -> Arc<Mutex<Position>> {
        self.position.clone()
    }

    pub fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }

    /// Moves that completed without a fresh acknowledgment.
    pub fn unconfirmed_moves(&self) -> u64 {
        self.unconfirmed_moves
    }

    pub fn run(&mut self, primitive: Primitive) -> Result<()> {
        match primitive {
            Primitive::MoveTo { location } => self.move_to(&location),
            Primitive::MoveRelative {
                direction,
                distance_cm,
            } => self.move_relative(direction, distance_cm),
            Primitive::GripperOpen => self.gripper_open(),
            Primitive::GripperClose => self.gripper_close(),
            Primitive::Wait { seconds } => self.wait(seconds),
            Primitive::SetSpeed { level } => self.set_speed(level),
        }
    }

    fn sync(&mut self, target: Position) -> Result<Position> {
        let outcome = self.link.send_and_wait(target, self.gripper_position)?;
        if !outcome.confirmed {
            self.unconfirmed_moves += 1;
            warn!(%target, "actuator did not confirm move, running open-loop (simulation mode?)");
        }
        if let Some(g) = outcome.gripper_position {
            self.gripper_position = g;
        }
        *self.position.lock() = outcome.position;
        Ok(outcome.position)
    }

    pub fn move_to(&mut self, location: &str) -> Result<()> {
        let target = self
            .registry
            .read()
            .location(location)
            .map(|l| l.position)
            .ok_or_else(|| ExecError::UnknownLocation(location.to_string()))?;
        let reached = self.sync(target)?;
        self.registry
            .write()
            .update_state(|s| s.current_position = location.to_string())?;
        info!(%location, position = %reached, "move_to");
        Ok(())
    }

    pub fn move_relative(&mut self, direction: Direction, distance_cm: f64) -> Result<()> {
        if !distance_cm.is_finite() {
            return Err(ExecError::Rejected(format!(
                "move_relative: distance {distance_cm} is not finite"
            )));
        }
        let (dx, dy, dz) = direction.unit();
        let scaled = distance_cm * self.config.distance_scale;
        let target = self.position().offset(dx * scaled, dy * scaled, dz * scaled);
        let reached = self.sync(target)?;
        info!(?direction, distance_cm, position = %reached, "move_relative");
        Ok(())
    }

    pub fn gripper_open(&mut self) -> Result<()> {
        self.gripper_position = self.config.gripper_open;
        self.sync(self.position())?;
        let released = {
            let mut reg = self.registry.write();
            let released = reg.state().holding.clone();
            reg.update_state(|s| {
                s.gripper = GripperState::Open;
                s.holding = None;
            })?;
            released
        };
        info!(released = released.as_deref().unwrap_or("nothing"), "gripper_open");
        Ok(())
    }

    /// Closing at an `item_stack` location picks up that location's item.
    pub fn gripper_close(&mut self) -> Result<()> {
        self.gripper_position = self.config.gripper_closed;
        self.sync(self.position())?;
        let grabbed = {
            let mut reg = self.registry.write();
            let grabbed = reg
                .location(&reg.state().current_position)
                .filter(|l| l.kind.as_deref() == Some("item_stack"))
                .and_then(|l| l.item.clone());
            let held = grabbed.clone();
            reg.update_state(|s| {
                s.gripper = GripperState::Closed;
                if held.is_some() {
                    s.holding = held;
                }
            })?;
            grabbed
        };
        info!(grabbed = grabbed.as_deref().unwrap_or("nothing"), "gripper_close");
        Ok(())
    }

    /// Sleep up to `max_wait_secs`, returning early with `Halted` when an
    /// emergency halt is raised meanwhile.
    pub fn wait(&mut self, seconds: f64) -> Result<()> {
        if !seconds.is_finite() {
            return Err(ExecError::Rejected(format!("wait: {seconds} is not a duration")));
        }
        let total = Duration::try_from_secs_f64(seconds.min(self.config.max_wait_secs).max(0.0))
            .map_err(|_| ExecError::Rejected(format!("wait: {seconds} is not a duration")))?;
        info!(seconds = total.as_secs_f64(), "wait");
        let deadline = Instant::now() + total;
        loop {
            if self.halt.is_halted() {
                return Err(ExecError::Halted);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep(WAIT_SLICE.min(deadline - now));
        }
    }

    pub fn set_speed(&mut self, level: SpeedLevel) -> Result<()> {
        self.registry.write().update_state(|s| s.speed = level)?;
        info!(speed = %level, multiplier = level.multiplier(), "set_speed");
        Ok(())
    }
}
