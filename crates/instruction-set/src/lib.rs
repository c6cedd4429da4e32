//! instruction-set: typed registry of robot instructions
//!
//! Holds the primitive, composite and learned-composite definitions together
//! with a mutable scene snapshot (items, named locations, zone stacks, speed
//! profiles), and compiles named instructions into flat execution plans.

mod types;
pub use types::{
    param_f64, param_str, ExecutionPlan, ExecutionStep, Instruction, InstructionCall,
    InstructionDef, InstructionKind, InstructionSetDocument, Params,
};

mod scene;
pub use scene::{
    Constraints, GripperState, Item, ItemProperties, Location, Modifier, MotionParams, Recipe,
    SceneContext, SceneState, SpeedLevel, SpeedProfile, ZoneStack,
};

mod error;
pub use error::{CompileError, RegistryError, Result};

mod loader;
pub use loader::{load_instruction_set, load_scene_context, save_json};

mod registry;
pub use registry::{InstructionRegistry, LearnRequest, SharedRegistry};

mod compiler;
pub use compiler::{substitute_params, Compiler, MAX_EXPANSION_DEPTH};

mod context;

pub use actuator_link::Position;

/// Initialize the instruction set system
pub fn init() -> Result<()> {
    tracing::info!("Initializing instruction set system");
    Ok(())
}
