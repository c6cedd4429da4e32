//! Local replacement of unknown ingredients with the closest stocked item.

use instruction_set::{InstructionCall, InstructionRegistry};
use phrase_cache::similarity;
use serde::Serialize;
use serde_json::Value;

/// Common foods mapped to the stocked item that stands in for them.
const SUBSTITUTES: &[(&str, &[&str])] = &[
    (
        "tomato",
        &["avocado", "pickle", "onion", "cucumber", "pepper", "roasted pepper"],
    ),
    (
        "meat",
        &["bacon", "ham", "turkey", "chicken", "tuna", "tofu", "falafel"],
    ),
    ("lettuce", &["spinach", "arugula", "kale", "greens", "cabbage"]),
    (
        "cheese",
        &["cheddar", "swiss", "brie", "mozzarella", "sauce", "spread", "hummus"],
    ),
    (
        "bread",
        &["bun", "roll", "pita", "wrap", "sourdough", "toast", "waffle"],
    ),
];

/// One item swapped in a sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Substitution {
    pub step: usize,
    pub requested: String,
    pub substitute: String,
}

fn singular(word: &str) -> &str {
    word.strip_suffix("es")
        .filter(|w| w.ends_with("to"))
        .or_else(|| word.strip_suffix('s'))
        .unwrap_or(word)
}

/// Closest known item for `requested`: the food table first, then an item
/// whose category matches, then the most similar item name.
pub fn substitute_for(requested: &str, registry: &InstructionRegistry) -> Option<String> {
    let requested = requested.trim().to_lowercase().replace('_', " ");
    let items = registry.items();
    if items.is_empty() {
        return None;
    }
    if items.contains_key(&requested) {
        return Some(requested);
    }

    let base = singular(&requested);
    let from_table = SUBSTITUTES.iter().find_map(|(substitute, foods)| {
        foods
            .iter()
            .any(|food| *food == requested || *food == base)
            .then_some(*substitute)
    });
    if let Some(name) = from_table.filter(|name| items.contains_key(*name)) {
        return Some(name.to_string());
    }

    let by_category = items.iter().find_map(|(name, item)| {
        item.category
            .as_deref()
            .filter(|cat| cat.eq_ignore_ascii_case(&requested) || cat.eq_ignore_ascii_case(base))
            .map(|_| name.clone())
    });
    if by_category.is_some() {
        return by_category;
    }

    items
        .keys()
        .map(|name| (name, similarity(&requested, name)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(name, _)| name.clone())
}

/// Replace every unknown `item` parameter in `sequence`.
pub fn apply_substitutions(
    sequence: &mut [InstructionCall],
    registry: &InstructionRegistry,
) -> Vec<Substitution> {
    let mut swaps = Vec::new();
    for (step, call) in sequence.iter_mut().enumerate() {
        let Some(requested) = call.params.get("item").and_then(Value::as_str) else {
            continue;
        };
        if registry.has_item(requested) {
            continue;
        }
        let requested = requested.to_string();
        if let Some(substitute) = substitute_for(&requested, registry) {
            call.params
                .insert("item".to_string(), Value::String(substitute.clone()));
            swaps.push(Substitution {
                step,
                requested,
                substitute,
            });
        }
    }
    swaps
}

/// "I don't have X, using Y as the closest match", one clause per distinct swap.
pub fn feedback(swaps: &[Substitution]) -> Option<String> {
    let mut seen: Vec<(&str, &str)> = Vec::new();
    for s in swaps {
        let pair = (s.requested.as_str(), s.substitute.as_str());
        if !seen.contains(&pair) {
            seen.push(pair);
        }
    }
    if seen.is_empty() {
        return None;
    }
    Some(
        seen.iter()
            .map(|(requested, substitute)| {
                format!("I don't have {requested}, using {substitute} as the closest match")
            })
            .collect::<Vec<_>>()
            .join("; "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::tests::bundled_registry;
    use serde_json::json;

    fn call(instruction: &str, item: &str) -> InstructionCall {
        InstructionCall::new(
            instruction,
            json!({ "item": item }).as_object().cloned().unwrap(),
        )
    }

    #[test]
    fn table_then_category_then_similarity() {
        let reg = bundled_registry();
        assert_eq!(substitute_for("avocado", &reg).as_deref(), Some("tomato"));
        assert_eq!(substitute_for("Pickles", &reg).as_deref(), Some("tomato"));
        assert_eq!(substitute_for("bacon", &reg).as_deref(), Some("meat"));
        assert_eq!(substitute_for("protein", &reg).as_deref(), Some("meat"));
        assert_eq!(substitute_for("chese", &reg).as_deref(), Some("cheese"));
    }

    #[test]
    fn unknown_items_are_swapped_not_dropped() {
        let reg = bundled_registry();
        let mut seq = vec![
            call("add_layer", "bread"),
            call("add_layer", "ham"),
            call("add_layer", "ham"),
            call("pick_up", "avocado"),
        ];
        let swaps = apply_substitutions(&mut seq, &reg);
        assert_eq!(seq.len(), 4);
        assert_eq!(seq[1].params["item"], "meat");
        assert_eq!(seq[3].params["item"], "tomato");
        assert_eq!(swaps.len(), 3);
        assert_eq!(
            feedback(&swaps).as_deref(),
            Some(
                "I don't have ham, using meat as the closest match; \
                 I don't have avocado, using tomato as the closest match"
            )
        );
    }

    #[test]
    fn known_items_untouched() {
        let reg = bundled_registry();
        let mut seq = vec![call("add_layer", "cheese")];
        assert!(apply_substitutions(&mut seq, &reg).is_empty());
        assert_eq!(feedback(&[]), None);
    }
}
