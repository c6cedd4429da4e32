//! Recognition of commands that ask for a persistent mapping.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Alias under which "my usual" / "the usual" mappings are stored.
pub const USUAL_ALIAS: &str = "my usual";

/// A request to remember the current command under a new name.
///
/// The interpreter only flags it; the write happens after the sequence has
/// executed successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningDirective {
    /// Phrase that should trigger the composite from now on.
    pub alias: String,
    /// Composite to save the sequence under.
    pub composite_name: String,
}

fn alias_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"(?:every ?time|whenever|when) i say\s+(.+)$",
            r"remember (?:this|that|it) as\s+(.+)$",
            r"(?:save|store) (?:this|that|it) as\s+(.+)$",
            r"call (?:this|that|it)\s+(.+)$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("Invalid regex pattern - this is a bug"))
        .collect()
    })
}

fn usual_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:my|the) usual\b").expect("Invalid regex pattern - this is a bug")
    })
}

/// A quoted alias ends at its closing quote, a bare one at the first clause break.
fn clean_alias(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix(['"', '\'']) {
        if let Some(end) = rest.find(['"', '\'']) {
            return rest[..end].trim().to_string();
        }
    }
    let head = raw.split([',', '.', ';', '!', '?']).next().unwrap_or(raw);
    head.trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
        .to_string()
}

/// Alias the command asks to define, if it is a learning command.
pub fn detect_alias(command: &str) -> Option<String> {
    let lower = command.to_lowercase();
    for re in alias_patterns() {
        if let Some(alias) = re.captures(&lower).and_then(|c| c.get(1)) {
            let alias = clean_alias(alias.as_str());
            if usual_pattern().is_match(&alias) {
                return Some(USUAL_ALIAS.to_string());
            }
            if !alias.is_empty() {
                return Some(alias);
            }
        }
    }
    None
}

/// True when the command invokes "the usual" rather than defining it.
pub fn refers_to_usual(command: &str) -> bool {
    usual_pattern().is_match(&command.to_lowercase())
}

/// Snake-case composite name derived from an alias.
pub fn composite_name_for(alias: &str) -> String {
    let words: Vec<String> = alias
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    format!("learned_{}", words.join("_"))
}
