//! Prompt context describing the registry and scene to a language model.

use crate::registry::InstructionRegistry;
use crate::types::{Instruction, InstructionKind};

const CLASSIC_EXAMPLE: &str = r#"EXAMPLE "make a classic sandwich":
  [
    {"instruction": "add_layer", "params": {"item": "bread"}},
    {"instruction": "add_layer", "params": {"item": "meat"}},
    {"instruction": "add_layer", "params": {"item": "lettuce"}},
    {"instruction": "add_layer", "params": {"item": "tomato"}},
    {"instruction": "add_layer", "params": {"item": "bread"}},
    {"instruction": "go_home", "params": {}}
  ]"#;

const BLT_EXAMPLE: &str = r#"EXAMPLE "BLT, nice and slow, double lettuce, no tomato":
  [
    {"instruction": "adjust_speed", "params": {"modifier": "slow"}},
    {"instruction": "add_layer", "params": {"item": "bread"}},
    {"instruction": "add_layer", "params": {"item": "meat"}},
    {"instruction": "add_layer", "params": {"item": "lettuce"}},
    {"instruction": "add_layer", "params": {"item": "lettuce"}},
    {"instruction": "add_layer", "params": {"item": "bread"}},
    {"instruction": "go_home", "params": {}}
  ]"#;

fn signature(instruction: &Instruction) -> String {
    let params: Vec<&str> = instruction.def.parameters.keys().map(String::as_str).collect();
    format!("{}({})", instruction.name, params.join(", "))
}

impl InstructionRegistry {
    /// Render the registry, scene and canonical examples as prompt text.
    pub fn llm_context(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        let scene = self.scene();

        lines.push("AVAILABLE INSTRUCTIONS (call these by name in your sequence):".into());
        for instruction in self.instructions().iter().filter(|i| i.llm_visible()) {
            let tag = match instruction.kind {
                InstructionKind::Primitive => " [primitive]",
                InstructionKind::Learned => " [learned]",
                InstructionKind::Composite if instruction.def.runtime => " [runtime]",
                InstructionKind::Composite => "",
            };
            lines.push(format!(
                "  - {}: {}{}",
                signature(instruction),
                instruction.def.description,
                tag
            ));
        }
        lines.push(String::new());

        lines.push("AVAILABLE ITEMS (valid values for 'item' parameter):".into());
        for (name, item) in &scene.items {
            let fragile = if item.properties.fragile {
                " [fragile, prefer slow speed]"
            } else {
                ""
            };
            lines.push(format!("  - {name}{fragile}"));
        }
        lines.push(String::new());

        lines.push("NAMED LOCATIONS (valid values for 'location' parameter):".into());
        for (name, location) in &scene.locations {
            lines.push(format!("  - {name}: {}", location.description));
        }
        lines.push(String::new());

        let state = &scene.state;
        let max_h = scene.constraints.max_stack_height;
        lines.push("CURRENT STATE:".into());
        lines.push(format!("  - Gripper: {}", state.gripper.as_str()));
        lines.push(format!(
            "  - Holding: {}",
            state.holding.as_deref().unwrap_or("nothing")
        ));
        lines.push(format!("  - Speed: {}", state.speed));
        lines.push(format!("  - Active zone: {}", state.active_zone));
        lines.push("  - Assembly zones:".into());
        if state.stacks.is_empty() {
            lines.push("      (none)".into());
        }
        for (zone, stack) in &state.stacks {
            let status = if stack.height >= max_h {
                "FULL"
            } else if stack.items.is_empty() {
                "empty"
            } else {
                "occupied"
            };
            lines.push(format!(
                "      {zone}: [{}] ({status}, height {}/{max_h})",
                stack.items.join(", "),
                stack.height
            ));
        }
        lines.push(String::new());

        let profiles = &scene.motion_params.speed_profiles;
        if !profiles.is_empty() {
            lines.push("SPEED WORDS (use with adjust_speed):".into());
            for (level, profile) in profiles {
                let aliases = if profile.aliases.is_empty() {
                    level.clone()
                } else {
                    profile.aliases.join(", ")
                };
                lines.push(format!("  - \"{level}\": {aliases}"));
            }
            lines.push(String::new());
        }

        if !scene.recipes.is_empty() {
            lines.push("KNOWN RECIPES:".into());
            for (name, recipe) in &scene.recipes {
                lines.push(format!("  - {name}: {}", recipe.layers.join(" -> ")));
                if !recipe.aliases.is_empty() {
                    lines.push(format!("    also called: {}", recipe.aliases.join(", ")));
                }
            }
            lines.push(String::new());
        }

        if !scene.modifiers.is_empty() {
            lines.push("RECIPE MODIFIERS:".into());
            for (word, modifier) in &scene.modifiers {
                lines.push(format!(
                    "  - \"{word}\": {}  e.g. {}",
                    modifier.description,
                    modifier.examples.join(", ")
                ));
            }
            lines.push(String::new());
        }

        lines.push("CONSTRAINTS:".into());
        lines.push(format!("  - Max stack height: {max_h} layers"));
        lines.push(format!(
            "  - Each tile = {}cm height",
            scene.constraints.tile_height_cm
        ));
        lines.push(String::new());

        let learned = self.learned_composites();
        if !learned.is_empty() {
            lines.push("ALREADY LEARNED (call by name, do not redefine):".into());
            for (name, def) in learned {
                lines.push(format!("  - {name}: {}", def.description));
            }
            lines.push(String::new());
        }

        lines.push(CLASSIC_EXAMPLE.into());
        lines.push(String::new());
        lines.push(BLT_EXAMPLE.into());
        lines.join("\n")
    }

    /// Name of the recipe whose layers equal `items`, if any.
    pub fn matching_recipe(&self, items: &[String]) -> Option<&str> {
        if items.is_empty() {
            return None;
        }
        self.scene()
            .recipes
            .iter()
            .find(|(_, recipe)| recipe.layers == items)
            .map(|(name, _)| name.as_str())
    }

    /// Canonical item names mentioned as whole words in `text`.
    pub fn items_mentioned(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|w| !w.is_empty())
            .collect();
        self.items()
            .keys()
            .filter(|name| words.contains(&name.as_str()))
            .cloned()
            .collect()
    }
}
