use crate::{MotionCore, Result};
use instruction_set::Params;

/// Handles instructions whose effect depends on mutable scene state.
pub trait DomainExecutor: Send {
    fn can_handle(&self, instruction: &str) -> bool;

    /// Run `instruction`, driving motion through `core`.
    fn execute(&mut self, instruction: &str, params: &Params, core: &mut MotionCore) -> Result<()>;
}
