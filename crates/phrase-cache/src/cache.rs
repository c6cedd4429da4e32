use crate::text::{extract_distance, normalize, numbers, similarity};
use instruction_set::{ExecutionPlan, Params};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Fuzzy similarity at or above which a hit is used directly.
    pub match_threshold: f64,
    /// Lower bound for hits that need a yes/no confirmation.
    pub confirm_threshold: f64,
    /// Minimum interpretation confidence accepted by `learn`.
    pub learn_threshold: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.85,
            confirm_threshold: 0.70,
            learn_threshold: 0.80,
        }
    }
}

/// A value that can be stored in a phrase cache.
pub trait CachedResult: Clone + Serialize + DeserializeOwned {
    /// Honor a distance spoken in the new utterance. Returns true if applied.
    fn apply_distance(&mut self, distance_cm: f64) -> bool;
}

impl CachedResult for ExecutionPlan {
    /// Only unambiguous plans (a single step with a distance) are rewritten.
    fn apply_distance(&mut self, distance_cm: f64) -> bool {
        let mut with_distance = self
            .steps
            .iter_mut()
            .filter(|s| s.params.contains_key("distance"));
        match (with_distance.next(), with_distance.next()) {
            (Some(step), None) => {
                step.params
                    .insert("distance".into(), serde_json::json!(distance_cm));
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Seed,
    Learned,
    ConfirmedLearned,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub result: T,
    pub confidence: f64,
    #[serde(default)]
    pub usage_count: u64,
    pub source: EntrySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learned_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Fuzzy,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Fuzzy => "fuzzy",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit<T> {
    /// Cache key that matched.
    pub phrase: String,
    pub result: T,
    /// Confidence stored with the entry.
    pub confidence: f64,
    pub similarity: f64,
    pub kind: MatchKind,
    pub needs_confirmation: bool,
}

/// Normalized-phrase cache with exact and fuzzy lookup.
#[derive(Debug, Clone)]
pub struct PhraseCache<T> {
    entries: BTreeMap<String, CacheEntry<T>>,
    config: CacheConfig,
}

/// Cache key for an utterance: normalized text with a lone distance removed.
fn key_for(text: &str) -> (String, Option<f64>) {
    let (rest, distance) = extract_distance(text);
    let key = normalize(&rest);
    if key.is_empty() {
        (normalize(text), None)
    } else {
        (key, distance)
    }
}

impl<T: CachedResult> PhraseCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_entries(BTreeMap::new(), config)
    }

    pub fn with_entries(entries: BTreeMap<String, CacheEntry<T>>, config: CacheConfig) -> Self {
        Self { entries, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn entries(&self) -> &BTreeMap<String, CacheEntry<T>> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn exact_match(&self, text: &str) -> Option<CacheHit<T>> {
        let (key, distance) = key_for(text);
        let entry = self.entries.get(&key)?;
        Some(Self::hit(key, entry, 1.0, MatchKind::Exact, false, distance))
    }

    pub fn fuzzy_match(&self, text: &str) -> Option<CacheHit<T>> {
        let (key, distance) = key_for(text);
        let wanted = numbers(&key);
        let mut best: Option<(&String, &CacheEntry<T>, f64)> = None;
        // A number left in the key is a parameter (plate, seconds), never a typo.
        for (phrase, entry) in self.entries.iter().filter(|(p, _)| numbers(p) == wanted) {
            let score = similarity(&key, phrase);
            if best.map_or(true, |(_, _, s)| score > s) {
                best = Some((phrase, entry, score));
            }
        }
        let (phrase, entry, score) = best?;
        debug!(input = %key, candidate = %phrase, score, "best fuzzy candidate");
        if score >= self.config.match_threshold {
            Some(Self::hit(phrase.clone(), entry, score, MatchKind::Fuzzy, false, distance))
        } else if score >= self.config.confirm_threshold {
            Some(Self::hit(phrase.clone(), entry, score, MatchKind::Fuzzy, true, distance))
        } else {
            None
        }
    }

    /// Exact lookup first, then fuzzy.
    pub fn lookup(&self, text: &str) -> Option<CacheHit<T>> {
        self.exact_match(text).or_else(|| self.fuzzy_match(text))
    }

    fn hit(
        phrase: String,
        entry: &CacheEntry<T>,
        similarity: f64,
        kind: MatchKind,
        needs_confirmation: bool,
        distance: Option<f64>,
    ) -> CacheHit<T> {
        let mut result = entry.result.clone();
        if let Some(d) = distance {
            result.apply_distance(d);
        }
        CacheHit {
            phrase,
            result,
            confidence: entry.confidence,
            similarity,
            kind,
            needs_confirmation,
        }
    }

    /// Insert or overwrite the entry for `phrase`.
    ///
    /// Returns false, leaving the cache untouched, when `confidence` is below
    /// the learn threshold.
    pub fn learn(&mut self, phrase: &str, result: T, confidence: f64, source: EntrySource) -> bool {
        if confidence.is_nan() || confidence < self.config.learn_threshold {
            debug!(%phrase, confidence, "below learn threshold, not cached");
            return false;
        }
        let (key, _) = key_for(phrase);
        if key.is_empty() {
            return false;
        }
        let usage_count = self.entries.get(&key).map_or(0, |e| e.usage_count);
        let entry = CacheEntry {
            result,
            confidence: confidence.clamp(0.0, 1.0),
            usage_count,
            source,
            learned_at: OffsetDateTime::now_utc().format(&Rfc3339).ok(),
        };
        self.entries.insert(key, entry);
        true
    }

    /// Count one more use of the entry stored under `phrase` (a cache key).
    pub fn record_usage(&mut self, phrase: &str) -> bool {
        match self.entries.get_mut(phrase) {
            Some(entry) => {
                entry.usage_count += 1;
                true
            }
            None => false,
        }
    }

    pub fn most_used(&self) -> Option<(&str, u64)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.usage_count > 0)
            .max_by_key(|(_, e)| e.usage_count)
            .map(|(k, e)| (k.as_str(), e.usage_count))
    }
}

/// Parameters helper shared by cache result types.
pub(crate) fn set_distance(params: &mut Params, distance_cm: f64) -> bool {
    if params.contains_key("direction") {
        params.insert("distance".into(), serde_json::json!(distance_cm));
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instruction_set::ExecutionStep;
    use serde_json::json;

    fn plan(steps: &[(&str, serde_json::Value)]) -> ExecutionPlan {
        ExecutionPlan {
            steps: steps
                .iter()
                .map(|(n, p)| ExecutionStep::new(*n, p.as_object().cloned().unwrap_or_default()))
                .collect(),
            source_command: "test".into(),
            composite_name: None,
            confidence: 0.9,
        }
    }

    fn cache() -> PhraseCache<ExecutionPlan> {
        PhraseCache::new(CacheConfig::default())
    }

    #[test]
    fn learned_phrase_matches_exactly_after_normalization() {
        let mut c = cache();
        let p = plan(&[("add_layer", json!({"item": "cheese"}))]);
        assert!(c.learn("Make me a cheese stack!", p.clone(), 0.9, EntrySource::Learned));
        let hit = c.exact_match(&normalize("Make me a cheese stack!")).unwrap();
        assert_eq!(hit.result, p);
        assert_eq!(hit.kind, MatchKind::Exact);
        assert_eq!(hit.similarity, 1.0);
    }

    #[test]
    fn one_character_edit_is_a_confident_fuzzy_hit() {
        let mut c = cache();
        let p = plan(&[("add_layer", json!({"item": "cheese"}))]);
        c.learn("make me a cheese stack", p.clone(), 0.9, EntrySource::Learned);
        assert!(c.exact_match("make me a cheese stak").is_none());
        let hit = c.lookup("make me a cheese stak").unwrap();
        assert_eq!(hit.kind, MatchKind::Fuzzy);
        assert!(hit.similarity >= 0.9);
        assert!(!hit.needs_confirmation);
        assert_eq!(hit.result, p);
    }

    #[test]
    fn middling_similarity_needs_confirmation_and_low_misses() {
        let config = CacheConfig {
            match_threshold: 0.95,
            confirm_threshold: 0.6,
            learn_threshold: 0.8,
        };
        let mut c = PhraseCache::new(config);
        c.learn("stack the bread", plan(&[]), 0.9, EntrySource::Learned);
        let hit = c.lookup("stack the breads please").unwrap();
        assert!(hit.needs_confirmation);
        assert!(c.lookup("wave hello").is_none());
    }

    #[test]
    fn low_confidence_never_enters_the_cache() {
        let mut c = cache();
        assert!(!c.learn("do a dance", plan(&[]), 0.79, EntrySource::Learned));
        assert!(!c.learn("do a dance", plan(&[]), f64::NAN, EntrySource::Learned));
        assert!(c.is_empty());
    }

    #[test]
    fn spoken_distance_overrides_single_distance_step() {
        let mut c = cache();
        let learned = plan(&[("move_relative", json!({"direction": "backward", "distance": 3}))]);
        c.learn("go back 3cm", learned, 0.95, EntrySource::Learned);
        assert!(c.entries().contains_key("go back"));

        let hit = c.exact_match("Go back 7 cm").unwrap();
        assert_eq!(hit.result.steps[0].params["distance"], json!(7.0));
    }

    #[test]
    fn numbers_that_are_not_distances_keep_phrases_apart() {
        let mut c = cache();
        c.learn(
            "serve it on plate 2",
            plan(&[("serve", json!({"plate": "plate_2"}))]),
            0.9,
            EntrySource::Learned,
        );
        c.learn(
            "wait 3 seconds",
            plan(&[("wait", json!({"seconds": 3}))]),
            0.9,
            EntrySource::Learned,
        );
        assert!(c.entries().contains_key("serve it on plate 2"));
        assert!(c.entries().contains_key("wait 3 seconds"));

        assert!(c.lookup("serve it on plate 1").is_none());
        assert!(c.lookup("wait 10 seconds").is_none());
        let hit = c.lookup("Serve it on plate 2!").unwrap();
        assert_eq!(hit.result.steps[0].params["plate"], json!("plate_2"));
        let hit = c.lookup("wait 3 second").unwrap();
        assert_eq!(hit.kind, MatchKind::Fuzzy);
        assert_eq!(hit.result.steps[0].params["seconds"], json!(3));
    }

    #[test]
    fn ambiguous_plans_keep_their_distances() {
        let mut p = plan(&[
            ("move_relative", json!({"direction": "right", "distance": 2})),
            ("move_relative", json!({"direction": "up", "distance": 2})),
        ]);
        assert!(!p.apply_distance(5.0));
        assert_eq!(p.steps[1].params["distance"], json!(2));
    }

    #[test]
    fn usage_is_counted_and_survives_relearn() {
        let mut c = cache();
        c.learn("wave", plan(&[]), 0.9, EntrySource::Learned);
        assert!(c.record_usage("wave"));
        assert!(c.record_usage("wave"));
        assert!(!c.record_usage("unknown"));
        c.learn("wave", plan(&[]), 0.95, EntrySource::ConfirmedLearned);
        assert_eq!(c.most_used(), Some(("wave", 2)));
    }
}
