use crate::cache::{set_distance, CacheConfig, CacheEntry, CacheHit, CachedResult, EntrySource, PhraseCache};
use crate::error::{CacheError, Result};
use crate::text::normalize;
use anyhow::Context;
use instruction_set::{save_json, ExecutionPlan, Params};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

pub type SharedPhraseBank = Arc<Mutex<PhraseBank>>;

/// A single instruction with arguments, e.g. `move_relative {direction: left}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: String,
    #[serde(default)]
    pub params: Params,
}

impl CachedResult for IntentResult {
    fn apply_distance(&mut self, distance_cm: f64) -> bool {
        set_distance(&mut self.params, distance_cm)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub maps_to_composite: String,
    pub source_phrase: String,
    #[serde(default)]
    pub learned_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankMeta {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// On-disk phrase-bank document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhraseBankDocument {
    #[serde(default)]
    pub meta: BankMeta,
    #[serde(default)]
    pub phrases: BTreeMap<String, CacheEntry<IntentResult>>,
    #[serde(default)]
    pub sequences: BTreeMap<String, CacheEntry<ExecutionPlan>>,
    #[serde(default)]
    pub learned_aliases: BTreeMap<String, AliasEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankStats {
    pub total_phrases: usize,
    pub total_sequences: usize,
    pub learned_aliases: usize,
    pub most_used_phrase: Option<(String, u64)>,
}

/// Both phrase caches plus learned aliases, persisted as one document.
#[derive(Debug, Clone)]
pub struct PhraseBank {
    intents: PhraseCache<IntentResult>,
    sequences: PhraseCache<ExecutionPlan>,
    aliases: BTreeMap<String, AliasEntry>,
    path: Option<PathBuf>,
}

impl PhraseBank {
    /// Empty bank that is never written to disk.
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::from_document(PhraseBankDocument::default(), config, None)
    }

    /// Load the bank at `path`, starting fresh when the file does not exist.
    pub fn open(path: impl AsRef<Path>, config: CacheConfig) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let doc = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading phrase bank: {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("decoding phrase bank: {}", path.display()))?
        } else {
            info!(path = %path.display(), "no phrase bank found, starting fresh");
            PhraseBankDocument::default()
        };
        Ok(Self::from_document(doc, config, Some(path.to_path_buf())))
    }

    fn from_document(doc: PhraseBankDocument, config: CacheConfig, path: Option<PathBuf>) -> Self {
        Self {
            intents: PhraseCache::with_entries(doc.phrases, config.clone()),
            sequences: PhraseCache::with_entries(doc.sequences, config),
            aliases: doc.learned_aliases,
            path,
        }
    }

    pub fn into_shared(self) -> SharedPhraseBank {
        Arc::new(Mutex::new(self))
    }

    pub fn document(&self) -> PhraseBankDocument {
        PhraseBankDocument {
            meta: BankMeta {
                version: 1,
                last_updated: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
            },
            phrases: self.intents.entries().clone(),
            sequences: self.sequences.entries().clone(),
            learned_aliases: self.aliases.clone(),
        }
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        save_json(path, &self.document()).map_err(|e| CacheError::Persist {
            path: path.display().to_string(),
            message: format!("{e:#}"),
        })
    }

    pub fn intents(&self) -> &PhraseCache<IntentResult> {
        &self.intents
    }

    pub fn sequences(&self) -> &PhraseCache<ExecutionPlan> {
        &self.sequences
    }

    pub fn learn_intent(
        &mut self,
        phrase: &str,
        result: IntentResult,
        confidence: f64,
        source: EntrySource,
    ) -> Result<bool> {
        let learned = self.intents.learn(phrase, result, confidence, source);
        if learned {
            self.save()?;
            info!(%phrase, "learned phrase");
        }
        Ok(learned)
    }

    pub fn learn_sequence(
        &mut self,
        phrase: &str,
        plan: ExecutionPlan,
        confidence: f64,
        source: EntrySource,
    ) -> Result<bool> {
        let steps = plan.len();
        let learned = self.sequences.learn(phrase, plan, confidence, source);
        if learned {
            self.save()?;
            info!(%phrase, steps, "learned sequence");
        }
        Ok(learned)
    }

    /// Bump the usage counter of a hit and persist.
    pub fn record_intent_usage(&mut self, hit: &CacheHit<IntentResult>) -> Result<()> {
        if self.intents.record_usage(&hit.phrase) {
            self.save()?;
        }
        Ok(())
    }

    pub fn record_sequence_usage(&mut self, hit: &CacheHit<ExecutionPlan>) -> Result<()> {
        if self.sequences.record_usage(&hit.phrase) {
            self.save()?;
        }
        Ok(())
    }

    /// Link a spoken alias to a composite.
    pub fn add_alias(&mut self, alias: &str, composite: &str, source_phrase: &str) -> Result<()> {
        let key = normalize(alias);
        self.aliases.insert(
            key.clone(),
            AliasEntry {
                maps_to_composite: composite.to_string(),
                source_phrase: source_phrase.to_string(),
                learned_at: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
            },
        );
        self.save()?;
        info!(alias = %key, %composite, "learned alias");
        Ok(())
    }

    /// Composite an utterance is an alias for, if any.
    pub fn resolve_alias(&self, text: &str) -> Option<&AliasEntry> {
        self.aliases.get(&normalize(text))
    }

    pub fn aliases(&self) -> &BTreeMap<String, AliasEntry> {
        &self.aliases
    }

    pub fn stats(&self) -> BankStats {
        let most_used_phrase = [self.intents.most_used(), self.sequences.most_used()]
            .into_iter()
            .flatten()
            .max_by_key(|(_, n)| *n)
            .map(|(k, n)| (k.to_string(), n));
        BankStats {
            total_phrases: self.intents.len(),
            total_sequences: self.sequences.len(),
            learned_aliases: self.aliases.len(),
            most_used_phrase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn intent(name: &str, params: serde_json::Value) -> IntentResult {
        IntentResult {
            intent: name.into(),
            params: params.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn intent_distance_override_needs_direction() {
        let mut bank = PhraseBank::in_memory(CacheConfig::default());
        bank.learn_intent(
            "move right",
            intent("move_relative", json!({"direction": "right", "distance": 1})),
            0.95,
            EntrySource::Seed,
        )
        .unwrap();
        bank.learn_intent("open up", intent("gripper_open", json!({})), 0.95, EntrySource::Seed)
            .unwrap();

        let hit = bank.intents().lookup("move right 4 cm").unwrap();
        assert_eq!(hit.result.params["distance"], json!(4.0));
        let hit = bank.intents().lookup("open up").unwrap();
        assert!(hit.result.params.get("distance").is_none());
    }

    #[test]
    fn persisted_bank_round_trips_entries_and_aliases() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("phrase_bank.json");
        let mut bank = PhraseBank::open(&path, CacheConfig::default())?;
        bank.learn_intent("close it", intent("gripper_close", json!({})), 0.9, EntrySource::Learned)?;
        bank.add_alias("My Usual", "blt_slow", "every time I say my usual make a slow BLT")?;
        let hit = bank.intents().lookup("close it").unwrap();
        bank.record_intent_usage(&hit)?;

        let reopened = PhraseBank::open(&path, CacheConfig::default())?;
        assert_eq!(reopened.intents().entries()["close it"].usage_count, 1);
        assert_eq!(
            reopened.resolve_alias("my usual!").map(|a| a.maps_to_composite.as_str()),
            Some("blt_slow")
        );
        let stats = reopened.stats();
        assert_eq!(stats.total_phrases, 1);
        assert_eq!(stats.learned_aliases, 1);
        assert_eq!(stats.most_used_phrase, Some(("close it".to_string(), 1)));
        Ok(())
    }

    #[test]
    fn rejected_learning_does_not_touch_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("phrase_bank.json");
        let mut bank = PhraseBank::open(&path, CacheConfig::default())?;
        assert!(!bank.learn_intent("maybe", intent("wait", json!({})), 0.3, EntrySource::Learned)?);
        assert!(!path.exists());
        Ok(())
    }
}
