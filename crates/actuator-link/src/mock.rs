use crate::halt::{HaltSink, LinkState};
use crate::{ActuatorLink, CommandFrame, HaltHandle, LinkError, Position, Result, SyncOutcome};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// In-process actuator that acknowledges every move instantly.
///
/// All frames, halt frames included, are recorded for inspection.
pub struct MockLink {
    frames: Arc<Mutex<Vec<CommandFrame>>>,
    seq: Arc<AtomicU64>,
    state: Arc<Mutex<LinkState>>,
    halt: HaltHandle,
    confirm: bool,
}

impl MockLink {
    pub fn new() -> Self {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let seq = Arc::new(AtomicU64::new(0));
        let state = Arc::new(Mutex::new(LinkState {
            position: Position::default(),
            gripper_position: 0.0,
        }));
        let halt = HaltHandle::new(seq.clone(), state.clone(), HaltSink::Memory(frames.clone()));
        Self {
            frames,
            seq,
            state,
            halt,
            confirm: true,
        }
    }

    /// A mock that never acknowledges, like a detached simulator.
    pub fn silent() -> Self {
        Self {
            confirm: false,
            ..Self::new()
        }
    }

    /// Shared view of every frame sent so far.
    pub fn frames(&self) -> Arc<Mutex<Vec<CommandFrame>>> {
        self.frames.clone()
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorLink for MockLink {
    fn send_and_wait(&mut self, target: Position, gripper_position: f64) -> Result<SyncOutcome> {
        {
            let _writing = self.halt.write_lock();
            if self.halt.is_halted() {
                return Err(LinkError::Halted);
            }
            let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
            self.frames
                .lock()
                .push(CommandFrame::new(target, gripper_position, seq));
            *self.state.lock() = LinkState {
                position: target,
                gripper_position,
            };
        }
        if !self.confirm {
            return Ok(SyncOutcome::unconfirmed(target));
        }
        Ok(SyncOutcome {
            position: target,
            gripper_position: Some(gripper_position),
            confirmed: true,
        })
    }

    fn halt_handle(&self) -> HaltHandle {
        self.halt.clone()
    }
}
