use crate::scene::SceneContext;
use crate::types::InstructionSetDocument;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading {what}: {}", path.display()))?;
    let doc = serde_json::from_str(&raw)
        .with_context(|| format!("decoding {what}: {}", path.display()))?;
    Ok(doc)
}

pub fn load_instruction_set(path: impl AsRef<Path>) -> anyhow::Result<InstructionSetDocument> {
    load_json(path.as_ref(), "instruction set")
}

pub fn load_scene_context(path: impl AsRef<Path>) -> anyhow::Result<SceneContext> {
    load_json(path.as_ref(), "scene context")
}

/// Rewrite a whole document through a temp file and rename.
pub fn save_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> anyhow::Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("encoding document: {}", path.display()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_documents_parse() -> anyhow::Result<()> {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data");
        let set = load_instruction_set(root.join("instruction_set.json"))?;
        let scene = load_scene_context(root.join("scene_context.json"))?;
        assert!(set.primitives.contains_key("move_to"));
        assert!(set.composites.contains_key("pick_up"));
        assert!(scene.locations.contains_key("bread_slot"));
        assert_eq!(scene.constraints.max_stack_height, 8);
        assert_eq!(scene.motion_params.speed_profiles["slow"].multiplier, 0.5);
        assert!(scene.motion_params.speed_profiles["fast"]
            .aliases
            .iter()
            .any(|a| a == "hurry"));
        Ok(())
    }

    #[test]
    fn save_then_load_keeps_document() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("scene.json");
        let mut scene = SceneContext::default();
        scene.state.holding = Some("cheese".into());
        save_json(&path, &scene)?;
        assert_eq!(load_scene_context(&path)?, scene);
        assert!(!path.with_extension("json.tmp").exists());
        Ok(())
    }
}
