//! Forgiving JSON extraction from model output.
//!
//! Models wrap JSON in markdown fences, prefix it with prose, or write raw
//! newlines inside string values. [`parse_object`] tolerates all three.

use instruction_set::{InstructionCall, Params};
use serde_json::{Map, Value};

/// Parse the first JSON object in `text`, or `None` if nothing usable is found.
pub fn parse_object(text: &str) -> Option<Map<String, Value>> {
    let text = strip_fences(text);
    let text = text.trim();

    if let Some(obj) = as_object(text) {
        return Some(obj);
    }

    let candidate = balanced_block(text).or_else(|| outer_block(text))?;
    if let Some(obj) = as_object(candidate) {
        return Some(obj);
    }
    as_object(&collapse_unescaped_newlines(candidate))
}

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

fn strip_fences(text: &str) -> String {
    if !text.contains("```") {
        return text.to_string();
    }
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First `{...}` block whose braces balance, ignoring braces inside strings.
fn balanced_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn outer_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Escape literal line breaks that appear inside JSON string values.
pub fn collapse_unescaped_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if in_string => {
                out.push(ch);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '"' => {
                in_string = !in_string;
                out.push(ch);
            }
            '\n' if in_string => out.push_str("\\n"),
            '\r' if in_string => {}
            _ => out.push(ch),
        }
    }
    out
}

/// Steps of a `sequence` array. Entries without an instruction name are skipped.
pub fn sequence_field(obj: &Map<String, Value>, key: &str) -> Vec<InstructionCall> {
    let Some(Value::Array(items)) = obj.get(key) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|step| {
            let instruction = step.get("instruction")?.as_str()?.trim();
            if instruction.is_empty() {
                return None;
            }
            let params: Params = step
                .get("params")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            Some(InstructionCall::new(instruction, params))
        })
        .collect()
}

/// Non-empty string field; JSON `null` and `""` both read as `None`.
pub fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "null")
        .map(str::to_string)
}

/// Numeric field, accepting numeric strings.
pub fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn string_list_field(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"confidence\": 0.9}\n```";
        let obj = parse_object(text).unwrap();
        assert_eq!(number_field(&obj, "confidence"), Some(0.9));
    }

    #[test]
    fn finds_object_after_prose_and_before_trailing_text() {
        let text = "Sure! Here it is: {\"a\": {\"b\": \"}\"}} and that's all {x}";
        let obj = parse_object(text).unwrap();
        assert_eq!(obj["a"]["b"], "}");
    }

    #[test]
    fn repairs_raw_newlines_in_strings() {
        let text = "{\"creative_reasoning\": \"line one\nline two\r\n\", \"confidence\": 0.8}";
        let obj = parse_object(text).unwrap();
        assert_eq!(
            string_field(&obj, "creative_reasoning").as_deref(),
            Some("line one\nline two")
        );
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let fixed = collapse_unescaped_newlines("{\"a\": \"say \\\"hi\\\"\nok\"}");
        assert_eq!(fixed, "{\"a\": \"say \\\"hi\\\"\\nok\"}");
    }

    #[test]
    fn gives_up_on_prose() {
        assert!(parse_object("I cannot do that.").is_none());
        assert!(parse_object("[1, 2, 3]").is_none());
    }

    #[test]
    fn sequence_skips_malformed_steps() {
        let obj = parse_object(
            r#"{"sequence": [
                {"instruction": "pick_up", "params": {"item": "cheese"}},
                {"params": {}},
                {"instruction": "go_home"}
            ]}"#,
        )
        .unwrap();
        let seq = sequence_field(&obj, "sequence");
        assert_eq!(seq.len(), 2);
        assert_eq!(seq[0].params["item"], "cheese");
        assert!(seq[1].params.is_empty());
    }
}
