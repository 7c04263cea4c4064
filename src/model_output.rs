//! Model output boundary
//!
//! Generative models reply with loosely shaped JSON: sometimes fenced in
//! Markdown, sometimes a bare array, sometimes wrapped in an object, with
//! confidence as a fraction, a percentage or a string. Everything is
//! schema-checked here into `RawCandidate` so the rest of the pipeline
//! works against one concrete type.

use serde_json::Value;

use crate::error::IdentifyError;
use crate::types::RawCandidate;
use crate::utils::vernacular::split_vernacular;

/// Keys under which a wrapping object may hold the candidate list
const LIST_KEYS: [&str; 4] = ["identifications", "results", "candidates", "plants"];

/// Parse a model's raw text reply into candidates
pub fn parse_model_reply(text: &str) -> Result<Vec<RawCandidate>, IdentifyError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Ok(vec![]);
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|e| IdentifyError::Parse(format!("invalid JSON: {}", e)))?;

    candidates_from_value(&value)
}

/// Schema-check an already-decoded JSON value into candidates
pub fn candidates_from_value(value: &Value) -> Result<Vec<RawCandidate>, IdentifyError> {
    let empty: &[Value] = &[];
    let items: &[Value] = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => {
            match LIST_KEYS.iter().find_map(|k| map.get(*k)) {
                Some(Value::Array(items)) => items.as_slice(),
                Some(Value::Null) => empty,
                Some(_) => return Err(IdentifyError::Parse("candidate list is not an array".to_string())),
                // A single bare candidate object
                None if map.contains_key("scientificName") || map.contains_key("scientific_name") => {
                    std::slice::from_ref(value)
                }
                None => return Err(IdentifyError::Parse("no candidate list in model output".to_string())),
            }
        }
        Value::Null => empty,
        _ => return Err(IdentifyError::Parse("model output is not an object or array".to_string())),
    };

    Ok(items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let candidate = candidate_from_value(item);
            if candidate.is_none() {
                tracing::warn!("Skipping malformed model candidate #{}: {}", i, item);
            }
            candidate
        })
        .collect())
}

/// Convert one JSON element; `None` if it is not an object
pub fn candidate_from_value(value: &Value) -> Option<RawCandidate> {
    let obj = value.as_object()?;

    let field = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .find_map(|k| obj.get(*k))
            .and_then(value_as_string)
    };

    let common_names = ["commonNames", "common_names"]
        .iter()
        .find_map(|k| obj.get(*k))
        .map(common_names_from_value)
        .unwrap_or_default();

    Some(RawCandidate {
        name: field(&["name", "commonName", "common_name"]),
        scientific_name: field(&["scientificName", "scientific_name", "species"]),
        confidence: obj.get("confidence").and_then(confidence_from_value),
        description: field(&["description"]),
        care_instructions: field(&["careInstructions", "care_instructions", "care"]),
        common_names,
    })
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn common_names_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Value::String(s) => split_vernacular(s),
        _ => vec![],
    }
}

/// Confidence as fraction; values above 1 are read as percentages
fn confidence_from_value(value: &Value) -> Option<f64> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            match s.strip_suffix('%') {
                Some(pct) => return pct.trim().parse::<f64>().ok().map(|p| p / 100.0),
                None => s.parse::<f64>().ok()?,
            }
        }
        _ => return None,
    };

    if raw > 1.0 && raw <= 100.0 {
        Some(raw / 100.0)
    } else {
        Some(raw)
    }
}

/// Remove a surrounding ```json ... ``` fence, if any
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fenced_wrapped_reply() {
        let reply = r#"```json
{"identifications": [
  {"name": "Swiss Cheese Plant", "scientificName": "Monstera deliciosa", "confidence": 0.92,
   "description": "Climbing aroid", "commonNames": ["Split-leaf philodendron"]}
]}
```"#;
        let candidates = parse_model_reply(reply).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].scientific_name.as_deref(), Some("Monstera deliciosa"));
        assert_eq!(candidates[0].common_names, vec!["Split-leaf philodendron".to_string()]);
        assert_relative_eq!(candidates[0].confidence.unwrap(), 0.92);
    }

    #[test]
    fn test_bare_array_with_loose_fields() {
        let reply = r#"[
            {"common_name": "Fiddle-leaf fig", "scientific_name": "Ficus lyrata", "confidence": "85%",
             "common_names": "fiddle leaf; banjo fig"},
            "not an object",
            {"scientificName": "Ficus elastica", "confidence": 70}
        ]"#;
        let candidates = parse_model_reply(reply).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].name.as_deref(), Some("Fiddle-leaf fig"));
        assert_eq!(candidates[0].common_names.len(), 2);
        assert_relative_eq!(candidates[0].confidence.unwrap(), 0.85);
        assert_relative_eq!(candidates[1].confidence.unwrap(), 0.70);
    }

    #[test]
    fn test_single_object_reply() {
        let candidates = parse_model_reply(r#"{"scientificName": "Aloe vera", "confidence": 0.4}"#).unwrap();
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_empty_reply_is_no_candidates() {
        assert!(parse_model_reply("   ").unwrap().is_empty());
        assert!(parse_model_reply(r#"{"results": null}"#).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_reply_is_parse_error() {
        assert!(matches!(parse_model_reply("I think it's a fern"), Err(IdentifyError::Parse(_))));
        assert!(matches!(parse_model_reply(r#"{"answer": "fern"}"#), Err(IdentifyError::Parse(_))));
    }

    #[test]
    fn test_out_of_range_confidence_kept_for_normalizer() {
        let candidates = parse_model_reply(r#"[{"scientificName": "Aloe vera", "confidence": 250}]"#).unwrap();
        // Not a plausible percentage; clamping happens in the normalizer
        assert_relative_eq!(candidates[0].confidence.unwrap(), 250.0);
    }
}
