use actuator_link::Position;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Meters per spoken centimeter.
    pub distance_scale: f64,
    pub default_distance_cm: f64,
    pub default_wait_secs: f64,
    pub max_wait_secs: f64,
    pub gripper_open: f64,
    pub gripper_closed: f64,
    /// Clearance lift after grabbing.
    pub lift_cm: f64,
    /// Lowering distance onto an empty zone, slot or plate.
    pub place_drop_cm: f64,
    pub min_drop_cm: f64,
    /// Fallback start pose when the scene names no known location.
    pub home: Position,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            distance_scale: 0.01,
            default_distance_cm: 1.0,
            default_wait_secs: 0.5,
            max_wait_secs: 30.0,
            gripper_open: 0.11,
            gripper_closed: 0.0,
            lift_cm: 5.0,
            place_drop_cm: 3.0,
            min_drop_cm: 0.5,
            home: Position::new(0.0, 0.567, -0.24),
        }
    }
}

impl MotionConfig {
    /// Lowering distance onto a stack that is `height` tiles tall.
    pub fn drop_for_height(&self, height: usize, tile_height_cm: f64) -> f64 {
        (self.place_drop_cm - height as f64 * tile_height_cm).max(self.min_drop_cm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_shrinks_with_height_but_never_below_floor() {
        let c = MotionConfig::default();
        assert_eq!(c.drop_for_height(0, 1.0), 3.0);
        assert_eq!(c.drop_for_height(2, 1.0), 1.0);
        assert_eq!(c.drop_for_height(7, 1.0), 0.5);
    }
}
