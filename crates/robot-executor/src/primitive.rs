use crate::{ExecError, MotionConfig, Result};
use instruction_set::{param_f64, param_str, Params, SpeedLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Right,
    Left,
    Up,
    Down,
    Forward,
    Backward,
}

impl Direction {
    pub fn parse(word: &str) -> Option<Self> {
        match word.trim().to_lowercase().as_str() {
            "right" => Some(Direction::Right),
            "left" => Some(Direction::Left),
            "up" => Some(Direction::Up),
            "down" => Some(Direction::Down),
            "forward" | "forwards" => Some(Direction::Forward),
            "backward" | "backwards" | "back" => Some(Direction::Backward),
            _ => None,
        }
    }

    /// Unit vector in the actuator frame (Y up, Z forward).
    pub fn unit(&self) -> (f64, f64, f64) {
        match self {
            Direction::Right => (1.0, 0.0, 0.0),
            Direction::Left => (-1.0, 0.0, 0.0),
            Direction::Up => (0.0, 1.0, 0.0),
            Direction::Down => (0.0, -1.0, 0.0),
            Direction::Forward => (0.0, 0.0, 1.0),
            Direction::Backward => (0.0, 0.0, -1.0),
        }
    }
}

/// The fixed set of instructions with direct handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    MoveTo { location: String },
    MoveRelative { direction: Direction, distance_cm: f64 },
    GripperOpen,
    GripperClose,
    Wait { seconds: f64 },
    SetSpeed { level: SpeedLevel },
}

impl Primitive {
    pub const NAMES: [&'static str; 6] = [
        "move_to",
        "move_relative",
        "gripper_open",
        "gripper_close",
        "wait",
        "set_speed",
    ];

    pub fn is_primitive(name: &str) -> bool {
        Self::NAMES.contains(&name)
    }

    /// Parse a step. `None` means `name` is not a primitive at all.
    pub fn parse(name: &str, params: &Params, config: &MotionConfig) -> Option<Result<Self>> {
        let parsed = match name {
            "move_to" => param_str(params, "location")
                .map(|l| Primitive::MoveTo {
                    location: l.to_string(),
                })
                .ok_or(ExecError::MissingParam {
                    instruction: "move_to",
                    param: "location",
                }),
            "move_relative" => {
                let word = param_str(params, "direction").unwrap_or_default();
                match Direction::parse(word) {
                    Some(direction) => {
                        number(params, "move_relative", "distance", config.default_distance_cm)
                            .map(|distance_cm| Primitive::MoveRelative {
                                direction,
                                distance_cm,
                            })
                    }
                    None => Err(ExecError::UnknownDirection(word.to_string())),
                }
            }
            "gripper_open" => Ok(Primitive::GripperOpen),
            "gripper_close" => Ok(Primitive::GripperClose),
            "wait" => number(params, "wait", "seconds", config.default_wait_secs)
                .map(|seconds| Primitive::Wait { seconds }),
            "set_speed" => Ok(Primitive::SetSpeed {
                level: param_str(params, "speed")
                    .and_then(SpeedLevel::from_word)
                    .unwrap_or_default(),
            }),
            _ => return None,
        };
        Some(parsed)
    }
}

/// `default` when `key` is absent or null; a present value must be a
/// finite number.
fn number(params: &Params, instruction: &str, key: &str, default: f64) -> Result<f64> {
    if params.get(key).map_or(true, |v| v.is_null()) {
        return Ok(default);
    }
    param_f64(params, key).ok_or_else(|| {
        ExecError::Rejected(format!("{instruction}: '{key}' must be a finite number"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: serde_json::Value) -> Params {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn parses_defaults_and_rejects_bad_arguments() {
        let c = MotionConfig::default();
        assert_eq!(
            Primitive::parse("move_relative", &params(json!({"direction": "Back"})), &c)
                .unwrap()
                .unwrap(),
            Primitive::MoveRelative {
                direction: Direction::Backward,
                distance_cm: 1.0
            }
        );
        assert!(matches!(
            Primitive::parse("move_relative", &params(json!({"direction": "sideways"})), &c),
            Some(Err(ExecError::UnknownDirection(_)))
        ));
        assert!(matches!(
            Primitive::parse("move_to", &Params::new(), &c),
            Some(Err(ExecError::MissingParam { .. }))
        ));
        assert_eq!(
            Primitive::parse("set_speed", &params(json!({"speed": "warp"})), &c)
                .unwrap()
                .unwrap(),
            Primitive::SetSpeed {
                level: SpeedLevel::Normal
            }
        );
        assert!(Primitive::parse("add_layer", &Params::new(), &c).is_none());
    }

    #[test]
    fn numbers_must_be_finite_and_null_means_default() {
        let c = MotionConfig::default();
        for bad in [json!({"seconds": "NaN"}), json!({"seconds": "inf"}), json!({"seconds": "soon"})] {
            assert!(matches!(
                Primitive::parse("wait", &params(bad), &c),
                Some(Err(ExecError::Rejected(_)))
            ));
        }
        assert!(matches!(
            Primitive::parse("move_relative", &params(json!({"direction": "up", "distance": "nan"})), &c),
            Some(Err(ExecError::Rejected(_)))
        ));
        assert_eq!(
            Primitive::parse("wait", &params(json!({"seconds": null})), &c)
                .unwrap()
                .unwrap(),
            Primitive::Wait { seconds: 0.5 }
        );
    }
}
