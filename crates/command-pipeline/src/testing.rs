use instruction_set::{load_instruction_set, load_scene_context, InstructionCall, InstructionRegistry};
use sequence_interpreter::Interpretation;
use std::path::PathBuf;

pub(crate) fn bundled_registry() -> InstructionRegistry {
    let data = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data");
    InstructionRegistry::new(
        load_instruction_set(data.join("instruction_set.json")).unwrap(),
        load_scene_context(data.join("scene_context.json")).unwrap(),
    )
}

pub(crate) fn interpretation(
    command: &str,
    sequence: Vec<InstructionCall>,
    confidence: f64,
) -> Interpretation {
    Interpretation {
        command: command.to_string(),
        interpretation: String::new(),
        pass1_sequence: sequence.clone(),
        sequence,
        composite_name: None,
        confidence,
        validated: true,
        issues: Vec::new(),
        user_feedback: None,
        is_creative: false,
        creative_reasoning: None,
        raw_response: None,
        substitutions: Vec::new(),
        learning_directive: None,
        passes: 1,
    }
}
