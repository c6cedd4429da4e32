//! actuator-link: position handshake with an external actuator
//!
//! Commanded positions are written to a shared command file and confirmed by
//! polling an acknowledgment file written by the actuator (a robot controller
//! or a simulator). The default build enables a `mock` backend so that the
//! rest of the workspace can run without an actuator attached.

mod types;
pub use types::{unix_seconds, AckRecord, CommandFrame, Position, SyncOutcome};

mod error;
pub use error::{LinkError, Result};

mod traits;
pub use traits::ActuatorLink;

mod halt;
pub use halt::HaltHandle;

mod handshake;
pub use handshake::{FileHandshake, HandshakeConfig};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MockLink;

/// Initialize the actuator link system
pub fn init() -> Result<()> {
    tracing::info!("Initializing actuator link system");
    Ok(())
}
