use crate::{Position, Result, SyncOutcome};

/// A minimal blocking actuator interface.
pub trait ActuatorLink: Send {
    /// Command a move and block (bounded) until the actuator confirms it.
    ///
    /// Returns the commanded position, unconfirmed, when no fresh
    /// acknowledgment arrives in time.
    fn send_and_wait(&mut self, target: Position, gripper_position: f64) -> Result<SyncOutcome>;

    /// Handle that can raise an emergency halt from another thread.
    fn halt_handle(&self) -> crate::HaltHandle;
}
