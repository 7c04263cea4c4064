//! Result assembly
//!
//! Primary results are deduplicated by id (first occurrence wins, so the
//! earlier candidate keeps its confidence) and sorted by confidence,
//! highest first, with ties kept in candidate order. Similar-plant
//! suggestions follow, never repeating an id already present.

use std::cmp::Ordering;

use rustc_hash::FxHashSet;

use crate::config::MAX_SIMILAR_PLANTS;
use crate::types::EnrichedResult;

/// Combine primary results and similar suggestions into the final list
pub fn assemble(primary: Vec<EnrichedResult>, similar: Vec<EnrichedResult>) -> Vec<EnrichedResult> {
    let mut seen: FxHashSet<String> = FxHashSet::default();

    let mut results: Vec<EnrichedResult> = primary
        .into_iter()
        .filter(|r| {
            let fresh = seen.insert(r.id.clone());
            if !fresh {
                tracing::debug!("Dropping duplicate result {} ({})", r.id, r.scientific_name);
            }
            fresh
        })
        .collect();

    // Stable sort keeps candidate order among equal confidences
    results.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal));

    results.extend(
        similar
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .take(MAX_SIMILAR_PLANTS)
            .map(|mut r| {
                r.database_match = false;
                r.is_similar_plant = true;
                r
            }),
    );

    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, confidence: f64, database_match: bool) -> EnrichedResult {
        EnrichedResult {
            id: id.to_string(),
            name: id.to_string(),
            scientific_name: id.to_string(),
            common_names: vec![],
            description: String::new(),
            care_instructions: None,
            image_url: None,
            genus: None,
            family: None,
            confidence,
            database_match,
            is_similar_plant: false,
        }
    }

    fn similar(id: &str) -> EnrichedResult {
        EnrichedResult {
            is_similar_plant: true,
            ..result(id, 0.6, false)
        }
    }

    fn ids(results: &[EnrichedResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_sorts_by_confidence_with_stable_ties() {
        let out = assemble(
            vec![result("a", 0.4, true), result("b", 0.9, false), result("c", 0.4, true), result("d", 0.7, true)],
            vec![],
        );
        assert_eq!(ids(&out), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_duplicate_id_keeps_first_occurrence() {
        let out = assemble(vec![result("p1", 0.5, true), result("p1", 0.95, true)], vec![]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.5);
    }

    #[test]
    fn test_similar_after_primary_without_repeats() {
        let out = assemble(
            vec![result("p1", 0.2, true)],
            vec![similar("p1"), similar("s1"), similar("s2"), similar("s3"), similar("s4")],
        );
        assert_eq!(ids(&out), vec!["p1", "s1", "s2", "s3"]);
        assert!(out[0].database_match);
        assert!(out[1..].iter().all(|r| r.is_similar_plant && !r.database_match));
    }

    #[test]
    fn test_empty() {
        assert!(assemble(vec![], vec![]).is_empty());
    }
}
