//! Candidate normalization
//!
//! Turns untrusted `RawCandidate`s into `Candidate`s: trimmed text, a
//! case-folded match key next to the display-cased scientific name, and a
//! confidence clamped into [0, 1]. Candidates without a scientific name are
//! dropped (logged, never an error). Order is preserved.

use crate::types::{Candidate, RawCandidate};
use crate::utils::normalization::{clamp_unit, normalize_name};
use crate::utils::vernacular::clean_names;

/// Normalize a model's candidate list
pub fn normalize_candidates(raw: Vec<RawCandidate>) -> Vec<Candidate> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(index, candidate)| normalize_candidate(index, candidate))
        .collect()
}

/// Normalize one candidate; `None` if it has no usable scientific name
pub fn normalize_candidate(index: usize, raw: RawCandidate) -> Option<Candidate> {
    let scientific_name = collapse_whitespace(raw.scientific_name.as_deref().unwrap_or(""));
    let match_key = normalize_name(&scientific_name);
    if match_key.is_empty() {
        tracing::warn!(
            "Dropping candidate #{} ({:?}): no scientific name",
            index,
            raw.name.as_deref().unwrap_or("")
        );
        return None;
    }

    let raw_confidence = raw.confidence.unwrap_or(0.0);
    let confidence = clamp_unit(raw_confidence);
    if confidence != raw_confidence {
        tracing::debug!(
            "Clamped confidence of '{}' from {} to {}",
            scientific_name,
            raw_confidence,
            confidence
        );
    }

    let common_names = clean_names(&raw.common_names);
    let name = raw
        .name
        .as_deref()
        .map(collapse_whitespace)
        .filter(|n| !n.is_empty())
        .or_else(|| common_names.first().cloned())
        .unwrap_or_else(|| scientific_name.clone());

    Some(Candidate {
        index,
        name,
        scientific_name,
        match_key,
        confidence,
        description: raw.description.as_deref().map(str::trim).unwrap_or("").to_string(),
        care_instructions: raw
            .care_instructions
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        common_names,
    })
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
