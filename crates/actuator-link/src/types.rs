use core::fmt;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Cartesian tool position in meters (actuator frame, Y up).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// Payload of the command file, overwritten on every commanded move.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandFrame {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub gripper_position: f64,
    #[serde(default, skip_serializing_if = "core::ops::Not::not")]
    pub emergency_halt: bool,
    /// Monotonic request id echoed back by actuators that support it.
    #[serde(default)]
    pub seq: u64,
    /// Unix seconds at which the frame was produced.
    #[serde(default)]
    pub issued_at: f64,
}

impl CommandFrame {
    pub fn new(target: Position, gripper_position: f64, seq: u64) -> Self {
        Self {
            x: target.x,
            y: target.y,
            z: target.z,
            gripper_position,
            emergency_halt: false,
            seq,
            issued_at: unix_seconds(SystemTime::now()),
        }
    }

    pub fn halt(at: Position, gripper_position: f64, seq: u64) -> Self {
        Self {
            emergency_halt: true,
            ..Self::new(at, gripper_position, seq)
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y, self.z)
    }
}

/// Payload of the acknowledgment file written by the actuator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AckRecord {
    #[serde(default)]
    pub completed: bool,
    pub position: Position,
    #[serde(default)]
    pub gripper_position: Option<f64>,
    #[serde(default)]
    pub seq: Option<u64>,
    /// Unix seconds; when absent the file modification time is used instead.
    #[serde(default)]
    pub timestamp: Option<f64>,
}

/// Result of a synchronized move.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncOutcome {
    pub position: Position,
    pub gripper_position: Option<f64>,
    /// False when no fresh acknowledgment arrived before the timeout.
    pub confirmed: bool,
}

impl SyncOutcome {
    pub fn unconfirmed(position: Position) -> Self {
        Self {
            position,
            gripper_position: None,
            confirmed: false,
        }
    }
}

pub fn unix_seconds(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
