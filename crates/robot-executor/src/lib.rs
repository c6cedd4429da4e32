//! robot-executor: runs execution plans
//!
//! Primitive steps are parsed into a closed [`Primitive`] enum and dispatched
//! directly; anything else is offered to a [`DomainExecutor`] such as the
//! [`AssemblyExecutor`], which owns the stateful stacking instructions.

mod error;
pub use error::{ExecError, Result};

mod config;
pub use config::MotionConfig;

mod primitive;
pub use primitive::{Direction, Primitive};

mod motion;
pub use motion::MotionCore;

mod domain;
pub use domain::DomainExecutor;

mod assembly;
pub use assembly::AssemblyExecutor;

mod executor;
pub use executor::Executor;

/// Initialize the executor system
pub fn init() -> Result<()> {
    tracing::info!("Initializing robot executor system");
    Ok(())
}
