use crate::error::{RegistryError, Result};
use crate::loader::{load_instruction_set, load_scene_context, save_json};
use crate::scene::{Constraints, Item, Location, SceneContext, SceneState};
use crate::types::{Instruction, InstructionCall, InstructionDef, InstructionKind, InstructionSetDocument};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

/// Process-wide registry handle. Reads take the read lock; `learn` and
/// `update_state` take the write lock and persist before releasing it.
pub type SharedRegistry = Arc<RwLock<InstructionRegistry>>;

/// Everything needed to add a learned composite.
#[derive(Debug, Clone, Default)]
pub struct LearnRequest {
    pub name: String,
    pub description: String,
    pub parameters: BTreeMap<String, String>,
    pub sequence: Vec<InstructionCall>,
    pub confidence: f64,
    pub source_phrase: String,
}

#[derive(Debug, Clone, Default)]
pub struct InstructionRegistry {
    instructions: InstructionSetDocument,
    scene: SceneContext,
    instruction_path: Option<PathBuf>,
    scene_path: Option<PathBuf>,
}

impl InstructionRegistry {
    /// In-memory registry; mutations are not persisted.
    pub fn new(instructions: InstructionSetDocument, scene: SceneContext) -> Self {
        Self {
            instructions,
            scene,
            instruction_path: None,
            scene_path: None,
        }
    }

    /// Load both documents; every later mutation rewrites them in place.
    pub fn load(
        instruction_path: impl AsRef<Path>,
        scene_path: impl AsRef<Path>,
    ) -> anyhow::Result<Self> {
        let instruction_path = instruction_path.as_ref().to_path_buf();
        let scene_path = scene_path.as_ref().to_path_buf();
        let instructions = load_instruction_set(&instruction_path)?;
        let scene = load_scene_context(&scene_path)?;
        info!(
            primitives = instructions.primitives.len(),
            composites = instructions.composites.len(),
            learned = instructions.learned_composites.len(),
            "instruction set loaded"
        );
        Ok(Self {
            instructions,
            scene,
            instruction_path: Some(instruction_path),
            scene_path: Some(scene_path),
        })
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    pub fn get(&self, name: &str) -> Option<Instruction> {
        let (kind, def) = self.lookup(name)?;
        Some(Instruction {
            name: name.to_string(),
            kind,
            def: def.clone(),
        })
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<(InstructionKind, &InstructionDef)> {
        if let Some(def) = self.instructions.primitives.get(name) {
            return Some((InstructionKind::Primitive, def));
        }
        if let Some(def) = self.instructions.composites.get(name) {
            return Some((InstructionKind::Composite, def));
        }
        self.instructions
            .learned_composites
            .get(name)
            .map(|def| (InstructionKind::Learned, def))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn is_primitive(&self, name: &str) -> bool {
        self.instructions.primitives.contains_key(name)
    }

    /// Developer-defined or learned composite.
    pub fn is_composite(&self, name: &str) -> bool {
        self.instructions.composites.contains_key(name)
            || self.instructions.learned_composites.contains_key(name)
    }

    /// All instructions in document order: primitives, composites, learned.
    pub fn instructions(&self) -> Vec<Instruction> {
        let prim = self
            .instructions
            .primitives
            .iter()
            .map(|(n, d)| (n, InstructionKind::Primitive, d));
        let comp = self
            .instructions
            .composites
            .iter()
            .map(|(n, d)| (n, InstructionKind::Composite, d));
        let learned = self
            .instructions
            .learned_composites
            .iter()
            .map(|(n, d)| (n, InstructionKind::Learned, d));
        prim.chain(comp)
            .chain(learned)
            .map(|(name, kind, def)| Instruction {
                name: name.clone(),
                kind,
                def: def.clone(),
            })
            .collect()
    }

    pub fn instruction_names(&self) -> Vec<String> {
        self.instructions().into_iter().map(|i| i.name).collect()
    }

    pub fn learned_composites(&self) -> &BTreeMap<String, InstructionDef> {
        &self.instructions.learned_composites
    }

    pub fn document(&self) -> &InstructionSetDocument {
        &self.instructions
    }

    pub fn scene(&self) -> &SceneContext {
        &self.scene
    }

    pub fn items(&self) -> &BTreeMap<String, Item> {
        &self.scene.items
    }

    pub fn has_item(&self, name: &str) -> bool {
        self.scene.items.contains_key(name)
    }

    pub fn locations(&self) -> &BTreeMap<String, Location> {
        &self.scene.locations
    }

    pub fn location(&self, name: &str) -> Option<&Location> {
        self.scene.locations.get(name)
    }

    pub fn state(&self) -> &SceneState {
        &self.scene.state
    }

    pub fn constraints(&self) -> &Constraints {
        &self.scene.constraints
    }

    /// Add or replace a learned composite.
    ///
    /// Returns `Ok(false)` without touching the registry when the sequence
    /// references an unknown instruction, is empty, or the name belongs to a
    /// primitive or developer composite.
    pub fn learn(&mut self, request: LearnRequest) -> Result<bool> {
        let LearnRequest {
            name,
            description,
            parameters,
            sequence,
            confidence,
            source_phrase,
        } = request;

        if sequence.is_empty() {
            warn!(%name, "refusing to learn an empty composite");
            return Ok(false);
        }
        if self.is_primitive(&name) || self.instructions.composites.contains_key(&name) {
            warn!(%name, "refusing to shadow a built-in instruction");
            return Ok(false);
        }
        if let Some(unknown) = sequence.iter().find(|s| !self.contains(&s.instruction)) {
            warn!(%name, instruction = %unknown.instruction, "composite references unknown instruction");
            return Ok(false);
        }

        let learned_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        let def = InstructionDef {
            description,
            parameters,
            sequence,
            llm_visible: Some(true),
            runtime: false,
            learned: true,
            confidence: Some(confidence.clamp(0.0, 1.0)),
            source_phrase: Some(source_phrase),
            learned_at,
        };
        let replaced = self
            .instructions
            .learned_composites
            .insert(name.clone(), def)
            .is_some();
        self.persist_instructions()?;
        info!(%name, replaced, "learned composite");
        Ok(true)
    }

    /// Mutate the scene state and persist the scene document.
    pub fn update_state<F>(&mut self, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut SceneState),
    {
        mutate(&mut self.scene.state);
        self.persist_scene()
    }

    pub fn persist_instructions(&self) -> Result<()> {
        match &self.instruction_path {
            Some(path) => save_json(path, &self.instructions).map_err(|e| persist_error(path, e)),
            None => Ok(()),
        }
    }

    pub fn persist_scene(&self) -> Result<()> {
        match &self.scene_path {
            Some(path) => save_json(path, &self.scene).map_err(|e| persist_error(path, e)),
            None => Ok(()),
        }
    }

    pub fn require_location(&self, name: &str) -> Result<&Location> {
        self.location(name)
            .ok_or_else(|| RegistryError::UnknownLocation(name.to_string()))
    }
}

fn persist_error(path: &Path, err: anyhow::Error) -> RegistryError {
    RegistryError::Persist {
        path: path.display().to_string(),
        message: format!("{err:#}"),
    }
}
