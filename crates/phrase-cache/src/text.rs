use regex::Regex;
use std::sync::OnceLock;

fn punctuation() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s\-]").expect("Invalid regex pattern - this is a bug"))
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern - this is a bug"))
}

fn distance_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?:\b(left|right|up|down|forwards?|backwards?|back|higher|lower|move)\s+)?\b(\d+(?:\.\d+)?)\s*(centimeters?|cm|millimeters?|mm)?\b",
        )
        .expect("Invalid regex pattern - this is a bug")
    })
}

fn number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("Invalid regex pattern - this is a bug"))
}

/// Lowercase, strip punctuation (keeping hyphens) and collapse whitespace.
pub fn normalize(text: &str) -> String {
    let lower = text.to_lowercase();
    let stripped = punctuation().replace_all(lower.trim(), "");
    whitespace().replace_all(stripped.trim(), " ").into_owned()
}

/// Similarity ratio in [0, 1]: normalized Levenshtein distance.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Every number in `text`, in order of appearance.
pub fn numbers(text: &str) -> Vec<&str> {
    number().find_iter(text).map(|m| m.as_str()).collect()
}

/// Pull a single spoken distance out of `text`.
///
/// A number counts as a distance only when it carries a unit (`cm`, `mm`,
/// spelled out or not) or directly follows a direction word. Returns the
/// text with the number and unit removed and the distance in centimeters.
/// Anything else, including text with several numbers, is returned
/// unchanged: "plate 2" and "wait 3 seconds" keep their numbers.
pub fn extract_distance(text: &str) -> (String, Option<f64>) {
    let lower = text.to_lowercase();
    let mut matches = distance_pattern().captures_iter(&lower);
    let (Some(caps), None) = (matches.next(), matches.next()) else {
        return (lower, None);
    };
    if caps.get(1).is_none() && caps.get(3).is_none() {
        return (lower, None);
    }
    let (Some(value), Some(whole)) = (caps.get(2), caps.get(0)) else {
        return (lower, None);
    };
    let Ok(amount) = value.as_str().parse::<f64>() else {
        return (lower, None);
    };
    let millimeters = caps
        .get(3)
        .map(|unit| unit.as_str().starts_with('m'))
        .unwrap_or(false);
    let distance = if millimeters { amount / 10.0 } else { amount };
    let rest = format!("{} {}", &lower[..value.start()], &lower[whole.end()..]);
    let rest = whitespace().replace_all(rest.trim(), " ").into_owned();
    (rest, Some(distance))
}
