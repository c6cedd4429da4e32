use crate::creative::CreativeAssignment;
use instruction_set::InstructionCall;
use std::fmt::Write as _;

const OUTPUT_FORMAT: &str = r#"=== OUTPUT FORMAT ===
Return ONLY a JSON object. No explanation, no prose, no markdown fences.

{
  "interpretation": "one sentence: what this command means in robot terms",
  "sequence": [
    {"instruction": "instruction_name", "params": {"param": "value"}}
  ],
  "composite_name": "snake_case_name_if_reusable_else_null",
  "confidence": 0.95,
  "user_feedback": null,
  "creative_reasoning": null
}
"#;

const RULES: &str = r#"=== RULES ===
1. Use ONLY instructions listed in AVAILABLE INSTRUCTIONS. Never invent new ones such as move_absolute.
2. For assembly, ALWAYS use add_layer when adding to a zone, never place_at.
3. Every complete assembly sequence ends with go_home().
4. Parameters must be actual values, never placeholders like {item}.
5. confidence: 0.9-1.0 clear, 0.7-0.9 interpreted, 0.5-0.7 best guess, below 0.5 very unclear.
6. Always produce a sequence, even for unclear commands.
7. composite_name: a snake_case reusable name if worth saving, else null. Never set it for creative commands.
8. For fragile items, prepend adjust_speed("slow") unless already slow.
9. To build in another zone, call set_active_zone(zone) FIRST, then add_layer.
   Zones: assembly_fixture (default, center), assembly_left, assembly_right.
   "left"/"right"/"center" in an assembly context pick the zone. Motion words like
   "move right" or "go forward" use move_relative, never set_active_zone.
10. Bread can go anywhere in a stack.

=== RECOVERY COMMANDS ===
"put it back" / "undo": return_to_stack() (safe when not holding anything)
"start over" / "never mind" / "cancel": clear_assembly() then go_home()
"I made a mistake": return_to_stack() if holding, else clear_assembly()

=== SPEED ===
"carefully pick up X": adjust_speed("slow") then pick_up(X)
"do it faster" / "speed up": adjust_speed("fast") with no other action
"gently" / "nice and slow" / "take your time": adjust_speed("slow") first

=== UNKNOWN INGREDIENTS: SUBSTITUTE, DON'T REFUSE ===
If a command names an item that is not available, pick the closest available item
using the item descriptions, build the full sequence with it, and say so in
user_feedback: "I don't have [requested], using [substitute] as the closest match".
Keep confidence at 0.75-0.85 for substitutions.
If a command is physically impossible, set confidence below 0.4, explain in
user_feedback, and still return the closest valid sequence if there is one.

=== LEARNING COMMANDS ===
If the command defines a new mapping ("make a BLT every time I say sandwich",
"remember this as my usual", "call it X"): produce the sequence for the underlying
action, set composite_name to the requested name, and set user_feedback to
"Mapping noted, will be saved to memory".
"#;

const EXAMPLES: &str = r#"=== EXAMPLES ===

Command: "pick up the cheese"
{"interpretation": "Pick up cheese from its slot", "sequence": [{"instruction": "pick_up", "params": {"item": "cheese"}}], "composite_name": null, "confidence": 0.95, "user_feedback": null, "creative_reasoning": null}

Command: "make a cheese sandwich"
{"interpretation": "Build cheese sandwich: bread, cheese, bread", "sequence": [{"instruction": "add_layer", "params": {"item": "bread"}}, {"instruction": "add_layer", "params": {"item": "cheese"}}, {"instruction": "add_layer", "params": {"item": "bread"}}, {"instruction": "go_home", "params": {}}], "composite_name": "make_cheese_sandwich", "confidence": 0.9, "user_feedback": null, "creative_reasoning": null}

Command: "move right a little"
{"interpretation": "Nudge right by 1cm", "sequence": [{"instruction": "move_relative", "params": {"direction": "right", "distance": 1.0}}], "composite_name": null, "confidence": 0.95, "user_feedback": null, "creative_reasoning": null}

Command: "start over"
{"interpretation": "Clear the assembly and return home", "sequence": [{"instruction": "clear_assembly", "params": {}}, {"instruction": "go_home", "params": {}}], "composite_name": null, "confidence": 0.95, "user_feedback": null, "creative_reasoning": null}

Command: "pick up the avocado"
{"interpretation": "No avocado, picking up tomato as the closest match", "sequence": [{"instruction": "pick_up", "params": {"item": "tomato"}}], "composite_name": null, "confidence": 0.8, "user_feedback": "I don't have avocado, using tomato as the closest match", "creative_reasoning": null}

Command: "make a BLT every time I say sandwich"
{"interpretation": "Define BLT as the sandwich mapping", "sequence": [{"instruction": "add_layer", "params": {"item": "bread"}}, {"instruction": "add_layer", "params": {"item": "meat"}}, {"instruction": "add_layer", "params": {"item": "lettuce"}}, {"instruction": "add_layer", "params": {"item": "tomato"}}, {"instruction": "add_layer", "params": {"item": "bread"}}, {"instruction": "go_home", "params": {}}], "composite_name": "make_blt", "confidence": 0.9, "user_feedback": "Mapping noted, 'sandwich' will be saved as an alias for make_blt", "creative_reasoning": null}
"#;

fn creative_section(assignment: &CreativeAssignment, available_items: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== CREATIVE MODE ===");
    let _ = writeln!(
        out,
        "This is an open-ended command. Do NOT produce a standard bread-filling-bread sandwich."
    );
    let _ = writeln!(out, "\nYOUR ASSIGNED COMBINATION FOR THIS COMMAND:\n");
    let _ = writeln!(out, "  AXIS 1 (spatial structure): {}", assignment.structure);
    let _ = writeln!(out, "    {}", assignment.structure.description());
    let _ = writeln!(out, "    Rule: {}", assignment.structure.rule());
    let _ = writeln!(out, "  AXIS 2 (ingredient logic): {}", assignment.logic);
    let _ = writeln!(out, "    {}", assignment.logic_description(available_items));
    let _ = writeln!(
        out,
        "\nFollow both axes literally. adjust_speed may be used for rhythm and contrast."
    );
    let _ = writeln!(
        out,
        "In creative_reasoning, start with \"Axis 1: {} x Axis 2: {}\" and explain the build.",
        assignment.structure, assignment.logic
    );
    let _ = writeln!(
        out,
        "Set composite_name to null. Always produce a non-empty sequence."
    );
    out
}

fn correction_section(corrections: &[String]) -> String {
    if corrections.is_empty() {
        return String::new();
    }
    let mut out = String::from(
        "=== CORRECTION REQUIRED ===\nYour previous response had these problems that the validator caught:\n",
    );
    for issue in corrections {
        let _ = writeln!(out, "  - {issue}");
    }
    out.push_str(
        "\nRegenerate a corrected sequence that fixes ALL of these issues.\n\
         Use ONLY valid instruction names from the list above. Do not invent new ones.\n",
    );
    out
}

/// Prompt for Pass 1, and for Pass 3 when `corrections` is non-empty.
pub fn generation_prompt(
    context: &str,
    command: &str,
    creative: Option<&CreativeAssignment>,
    available_items: &[String],
    corrections: &[String],
) -> String {
    let mut out = String::new();
    out.push_str(
        "You are the instruction generator for a robot arm that builds sandwich assemblies.\n\
         Your job: convert a voice command into a JSON sequence of robot instructions.\n\n",
    );
    out.push_str(context);
    out.push_str("\n\n");
    out.push_str(&correction_section(corrections));
    out.push('\n');
    out.push_str(OUTPUT_FORMAT);
    out.push('\n');
    out.push_str(RULES);
    out.push('\n');
    if let Some(assignment) = creative {
        out.push_str(&creative_section(assignment, available_items));
        out.push('\n');
    }
    out.push_str(EXAMPLES);
    let _ = write!(
        out,
        "\nNow interpret this command:\n\nCommand: \"{command}\"\n\nJSON:"
    );
    out
}

/// Names the validator may accept.
#[derive(Debug, Clone, Default)]
pub struct ValidNames {
    pub instructions: Vec<String>,
    pub items: Vec<String>,
    pub locations: Vec<String>,
    pub zones: Vec<String>,
}

/// Prompt for Pass 2.
pub fn validation_prompt(
    command: &str,
    interpretation: &str,
    sequence: &[InstructionCall],
    names: &ValidNames,
) -> String {
    let rendered =
        serde_json::to_string_pretty(sequence).unwrap_or_else(|_| "[]".to_string());
    format!(
        r#"You are a robot instruction validator. A sequence was generated for a voice command.
Check it and return a corrected version if needed. Return ONLY JSON, no prose.

VOICE COMMAND: "{command}"
INTERPRETATION: "{interpretation}"

VALID INSTRUCTIONS: {instructions:?}
VALID ITEMS: {items:?}
VALID LOCATIONS: {locations:?}

GENERATED SEQUENCE:
{rendered}

VALIDATION RULES:
1. Every "instruction" must be in VALID INSTRUCTIONS. Fix it or remove the step.
2. Every "item" param must be in VALID ITEMS. Remove steps with unknown items.
3. Every "location" param must be in VALID LOCATIONS. Fix it or remove the step.
4. move_relative direction must be one of: right, left, up, down, forward, backward.
5. Assembly sequences must use add_layer, not place_at.
6. set_active_zone zone must be one of: {zones:?}
7. Do NOT change the intent or the step order. Only fix invalid names.
8. If a step is unfixable, remove it.
9. If the sequence is empty after fixes, return an empty sequence. Do not invent steps.

Return this JSON:
{{
  "valid": true,
  "issues": ["what was wrong, empty if nothing"],
  "sequence": [corrected sequence here]
}}

JSON:"#,
        instructions = names.instructions,
        items = names.items,
        locations = names.locations,
        zones = names.zones,
    )
}
