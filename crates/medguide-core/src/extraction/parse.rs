//! Tolerant parsing of the vision model's medicine list.
//!
//! The model is asked for `{"medicines": [...]}` but in practice answers in
//! code fences, wraps JSON in prose, or falls back to a markdown list. Each of
//! those is recovered here and tagged with what was off.

use crate::types::{dedup_names, MedicineName, ParseOutcome};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid regex"));

static LIST_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•+]|\d+[.)])\s+(.+?)\s*$").expect("valid regex")
});

/// Parse the extraction response into an ordered, deduplicated name list.
pub fn parse_medicine_list(text: &str) -> ParseOutcome<Vec<MedicineName>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ParseOutcome::Unparseable("empty response".to_string());
    }
    if trimmed.eq_ignore_ascii_case("none") {
        return ParseOutcome::Full(Vec::new());
    }

    let mut warnings = Vec::new();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        match names_from_value(&value) {
            Some((names, shape_warnings)) if shape_warnings.is_empty() => {
                return ParseOutcome::Full(names)
            }
            Some((names, shape_warnings)) => {
                return ParseOutcome::Partial {
                    value: names,
                    warnings: shape_warnings,
                }
            }
            None => warnings.push("JSON response did not contain a medicine list".to_string()),
        }
    }

    if let Some(inner) = FENCE_RE.captures(trimmed).and_then(|c| c.get(1)) {
        if let Some((names, shape_warnings)) = parse_json_fragment(inner.as_str()) {
            warnings.push("response wrapped in a code fence".to_string());
            warnings.extend(shape_warnings);
            return ParseOutcome::Partial {
                value: names,
                warnings,
            };
        }
    }

    if let Some((names, shape_warnings)) = embedded_json(trimmed) {
        warnings.push("JSON embedded in surrounding text".to_string());
        warnings.extend(shape_warnings);
        return ParseOutcome::Partial {
            value: names,
            warnings,
        };
    }

    let listed: Vec<MedicineName> = trimmed
        .lines()
        .filter_map(|line| LIST_ITEM_RE.captures(line))
        .filter_map(|c| c.get(1).map(|m| strip_annotation(m.as_str())))
        .filter_map(MedicineName::parse)
        .collect();
    if !listed.is_empty() {
        warnings.push("recovered names from a plain-text list".to_string());
        return ParseOutcome::Partial {
            value: dedup_names(listed),
            warnings,
        };
    }

    ParseOutcome::Unparseable(format!(
        "no medicine list found in response: {}",
        preview(trimmed)
    ))
}

/// Accepts `{"medicines": [...]}`, a bare array, and arrays of objects with a
/// `name` field (reported as a warning).
fn names_from_value(value: &Value) -> Option<(Vec<MedicineName>, Vec<String>)> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("medicines")
            .or_else(|| map.get("medicine_names"))
            .or_else(|| map.get("names"))?
            .as_array()?,
        _ => return None,
    };

    let mut warnings = Vec::new();
    let mut names = Vec::with_capacity(items.len());
    let mut skipped = 0usize;
    for item in items {
        match item {
            Value::String(s) => names.extend(MedicineName::parse(s)),
            Value::Object(obj) => match obj.get("name").and_then(Value::as_str) {
                Some(s) => {
                    if warnings.is_empty() {
                        warnings.push("medicine entries were objects, not strings".to_string());
                    }
                    names.extend(MedicineName::parse(s));
                }
                None => skipped += 1,
            },
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warnings.push(format!("skipped {skipped} unrecognized entries"));
    }
    Some((dedup_names(names), warnings))
}

fn parse_json_fragment(fragment: &str) -> Option<(Vec<MedicineName>, Vec<String>)> {
    serde_json::from_str::<Value>(fragment.trim())
        .ok()
        .as_ref()
        .and_then(names_from_value)
}

/// Try the outermost `{...}` then `[...]` span.
fn embedded_json(text: &str) -> Option<(Vec<MedicineName>, Vec<String>)> {
    [('{', '}'), ('[', ']')].iter().find_map(|&(open, close)| {
        let start = text.find(open)?;
        let end = text.rfind(close)?;
        if end <= start {
            return None;
        }
        parse_json_fragment(&text[start..=end])
    })
}

/// "Amoxicillin 500mg - antibiotic" -> "Amoxicillin 500mg"
fn strip_annotation(item: &str) -> &str {
    let item = item.trim_matches('*');
    [" - ", " – ", " — ", ": "]
        .iter()
        .filter_map(|sep| item.find(sep))
        .min()
        .map(|idx| &item[..idx])
        .unwrap_or(item)
        .trim_matches('*')
}

fn preview(text: &str) -> String {
    let short: String = text.chars().take(80).collect();
    if short.len() < text.len() {
        format!("{short}...")
    } else {
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(outcome: ParseOutcome<Vec<MedicineName>>) -> Vec<String> {
        outcome
            .into_value()
            .expect("parseable")
            .into_iter()
            .map(|n| n.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_strict_json_object_is_full() {
        let outcome = parse_medicine_list(r#"{"medicines": ["Amoxicillin 500mg", "Paracetamol"]}"#);
        assert!(matches!(outcome, ParseOutcome::Full(_)));
        assert_eq!(names(outcome), vec!["Amoxicillin 500mg", "Paracetamol"]);
    }

    #[test]
    fn test_bare_array_is_full() {
        let outcome = parse_medicine_list(r#"["Cetirizine"]"#);
        assert!(matches!(outcome, ParseOutcome::Full(_)));
    }

    #[test]
    fn test_empty_list_and_none_are_valid() {
        assert_eq!(
            parse_medicine_list(r#"{"medicines": []}"#),
            ParseOutcome::Full(vec![])
        );
        assert_eq!(parse_medicine_list("NONE"), ParseOutcome::Full(vec![]));
    }

    #[test]
    fn test_code_fence_is_partial() {
        let text = "Here you go:\n```json\n{\"medicines\": [\"Pantoprazole\"]}\n```";
        let outcome = parse_medicine_list(text);
        assert!(!outcome.warnings().is_empty());
        assert_eq!(names(outcome), vec!["Pantoprazole"]);
    }

    #[test]
    fn test_embedded_json_is_partial() {
        let text = "The prescription lists {\"medicines\": [\"Azithromycin\", \"Dolo 650\"]} as shown.";
        let outcome = parse_medicine_list(text);
        assert!(outcome
            .warnings()
            .iter()
            .any(|w| w.contains("surrounding text")));
        assert_eq!(names(outcome), vec!["Azithromycin", "Dolo 650"]);
    }

    #[test]
    fn test_markdown_list_is_recovered() {
        let text = "I found these medicines:\n1. **Metformin 500mg** - for diabetes\n2. Atorvastatin: cholesterol\n- metformin 500mg\n";
        let outcome = parse_medicine_list(text);
        assert!(matches!(outcome, ParseOutcome::Partial { .. }));
        assert_eq!(names(outcome), vec!["Metformin 500mg", "Atorvastatin"]);
    }

    #[test]
    fn test_object_entries_and_junk_are_partial() {
        let outcome = parse_medicine_list(r#"{"medicines": [{"name": "Ibuprofen"}, 42, "Zinc"]}"#);
        assert_eq!(outcome.warnings().len(), 2);
        assert_eq!(names(outcome), vec!["Ibuprofen", "Zinc"]);
    }

    #[test]
    fn test_prose_without_list_is_unparseable() {
        let outcome = parse_medicine_list("Sorry, the image is too blurry to read.");
        assert!(matches!(outcome, ParseOutcome::Unparseable(_)));
        assert!(matches!(parse_medicine_list("   "), ParseOutcome::Unparseable(_)));
    }

    #[test]
    fn test_duplicates_removed_in_order() {
        let outcome = parse_medicine_list(r#"["B", "a", "b", "A", "c"]"#);
        assert_eq!(names(outcome), vec!["B", "a", "c"]);
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let text = "```\n[\"X\", \"Y\"]\n```";
        assert_eq!(parse_medicine_list(text), parse_medicine_list(text));
    }
}
