use actuator_link::Position;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneContext {
    #[serde(default)]
    pub items: BTreeMap<String, Item>,
    #[serde(default)]
    pub locations: BTreeMap<String, Location>,
    #[serde(default)]
    pub state: SceneState,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub motion_params: MotionParams,
    #[serde(default)]
    pub recipes: BTreeMap<String, Recipe>,
    #[serde(default)]
    pub modifiers: BTreeMap<String, Modifier>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub properties: ItemProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemProperties {
    #[serde(default)]
    pub fragile: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub position: Position,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Item stocked here, for `item_stack` locations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GripperState {
    #[default]
    Open,
    Closed,
}

impl GripperState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GripperState::Open => "open",
            GripperState::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedLevel {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl SpeedLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeedLevel::Slow => "slow",
            SpeedLevel::Normal => "normal",
            SpeedLevel::Fast => "fast",
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            SpeedLevel::Slow => 0.5,
            SpeedLevel::Normal => 1.0,
            SpeedLevel::Fast => 1.5,
        }
    }

    /// Map a qualitative speed word onto a canonical level.
    pub fn from_word(word: &str) -> Option<Self> {
        let word = word.trim().to_lowercase();
        match word.as_str() {
            "slow" | "slower" | "careful" | "carefully" | "gentle" | "gently" | "easy"
            | "nice and neat" => Some(SpeedLevel::Slow),
            "normal" | "regular" | "default" => Some(SpeedLevel::Normal),
            "fast" | "faster" | "quick" | "quickly" | "hurry" | "speed up" => {
                Some(SpeedLevel::Fast)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for SpeedLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStack {
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub height: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneState {
    pub gripper: GripperState,
    pub holding: Option<String>,
    pub speed: SpeedLevel,
    pub current_position: String,
    pub active_zone: String,
    pub stacks: BTreeMap<String, ZoneStack>,
    pub plates: BTreeMap<String, Vec<String>>,
}

impl Default for SceneState {
    fn default() -> Self {
        Self {
            gripper: GripperState::Open,
            holding: None,
            speed: SpeedLevel::Normal,
            current_position: "home".to_string(),
            active_zone: "assembly_fixture".to_string(),
            stacks: BTreeMap::new(),
            plates: BTreeMap::new(),
        }
    }
}

impl SceneState {
    pub fn stack(&self, zone: &str) -> ZoneStack {
        self.stacks.get(zone).cloned().unwrap_or_default()
    }

    pub fn stack_mut(&mut self, zone: &str) -> &mut ZoneStack {
        self.stacks.entry(zone.to_string()).or_default()
    }

    pub fn active_stack(&self) -> ZoneStack {
        self.stack(&self.active_zone)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub max_stack_height: usize,
    pub tile_height_cm: f64,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_stack_height: 8,
            tile_height_cm: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionParams {
    #[serde(default)]
    pub speed_profiles: BTreeMap<String, SpeedProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedProfile {
    #[serde(default)]
    pub multiplier: f64,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(default)]
    pub layers: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_words_map_to_levels() {
        assert_eq!(SpeedLevel::from_word("Careful"), Some(SpeedLevel::Slow));
        assert_eq!(SpeedLevel::from_word("nice and neat"), Some(SpeedLevel::Slow));
        assert_eq!(SpeedLevel::from_word("hurry"), Some(SpeedLevel::Fast));
        assert_eq!(SpeedLevel::from_word("default"), Some(SpeedLevel::Normal));
        assert_eq!(SpeedLevel::from_word("ludicrous"), None);
    }

    #[test]
    fn state_defaults_fill_missing_fields() {
        let state: SceneState = serde_json::from_str(r#"{"gripper": "closed"}"#).unwrap();
        assert_eq!(state.gripper, GripperState::Closed);
        assert_eq!(state.active_zone, "assembly_fixture");
        assert_eq!(state.speed, SpeedLevel::Normal);
        assert_eq!(state.active_stack(), ZoneStack::default());
    }
}
