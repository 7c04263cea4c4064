//! Name normalization and token similarity
//!
//! Matching keys are case-folded, with punctuation folded to spaces and
//! whitespace collapsed, so "  Monstera  DELICIOSA " and "monstera deliciosa"
//! compare equal. The hybrid sign `×` is folded to `x`.

use strsim::normalized_levenshtein;

/// Minimum per-token similarity for two tokens to count as the same word
pub const TOKEN_SIMILARITY_FLOOR: f64 = 0.8;

/// Shortest string allowed to match by containment ("rosa" is fine, "ro" is not)
pub const MIN_CONTAINMENT_LEN: usize = 4;

/// Normalize a plant name into its matching key
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .chars()
        .map(|c| match c {
            '×' => 'x',
            c if c.is_alphanumeric() || c == '-' => c,
            _ => ' ',
        })
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Distinct tokens of an already-normalized key, in order
pub fn tokens(key: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for token in key.split_whitespace() {
        if !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

/// Soft Jaccard overlap between two normalized keys, in [0, 1].
///
/// Each token of `a` is paired with its most similar token of `b`; pairs at
/// or above `TOKEN_SIMILARITY_FLOOR` count as shared, weighted by their
/// similarity. The shared weight is divided by the size of the token union,
/// so "ficus lyrataa" vs "ficus lyrata" scores ~0.93 and a bare genus
/// "ficus" vs "ficus lyrata" scores 0.5.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let mut used = vec![false; tb.len()];
    let mut shared = 0usize;
    let mut weight = 0.0;

    for token in &ta {
        let best = tb
            .iter()
            .enumerate()
            .filter(|(j, _)| !used[*j])
            .map(|(j, other)| (j, normalized_levenshtein(token, other)))
            .fold(None, |best: Option<(usize, f64)>, (j, sim)| match best {
                Some((_, b)) if b >= sim => best,
                _ => Some((j, sim)),
            });

        if let Some((j, sim)) = best {
            if sim >= TOKEN_SIMILARITY_FLOOR {
                used[j] = true;
                shared += 1;
                weight += sim;
            }
        }
    }

    let union = ta.len() + tb.len() - shared;
    (weight / union as f64).clamp(0.0, 1.0)
}

/// True if `candidate` appears inside `catalog` as a run of whole words
/// ("ficus" in "ficus lyrata", never "ficus lyrata" in "ficus" and never
/// "rosa" in "rosaceae"). Only the candidate-inside-catalog direction
/// counts, and the candidate must be at least `MIN_CONTAINMENT_LEN` long.
pub fn contained_in(candidate: &str, catalog: &str) -> bool {
    if candidate.len() < MIN_CONTAINMENT_LEN {
        return false;
    }
    let needle: Vec<&str> = candidate.split_whitespace().collect();
    let haystack: Vec<&str> = catalog.split_whitespace().collect();
    !needle.is_empty()
        && needle.len() <= haystack.len()
        && haystack.windows(needle.len()).any(|window| window == needle.as_slice())
}

/// Clamp an untrusted score into [0, 1]; NaN becomes 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Monstera   DELICIOSA "), "monstera deliciosa");
        assert_eq!(normalize_name("Mentha × piperita"), "mentha x piperita");
        assert_eq!(normalize_name("Ficus lyrata 'Bambino'"), "ficus lyrata bambino");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn test_token_overlap_identical() {
        assert_relative_eq!(token_overlap("ficus lyrata", "ficus lyrata"), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_token_overlap_typo() {
        let score = token_overlap("ficus lyrataa", "ficus lyrata");
        // (1.0 + 6/7) / 2
        assert_relative_eq!(score, (1.0 + 6.0 / 7.0) / 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_token_overlap_partial() {
        assert_relative_eq!(token_overlap("ficus", "ficus lyrata"), 0.5, epsilon = 1e-9);
        assert_relative_eq!(token_overlap("unknownus speciesus", "ficus lyrata"), 0.0, epsilon = 1e-9);
        assert_relative_eq!(token_overlap("", "ficus lyrata"), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_contained_in_whole_words_one_direction() {
        assert!(contained_in("ficus", "ficus lyrata"));
        assert!(contained_in("lyrata", "ficus lyrata"));
        assert!(contained_in("ficus lyrata", "ficus lyrata"));
        assert!(!contained_in("ficus lyrata", "ficus"));
        assert!(!contained_in("rosa", "rosaceae"));
        assert!(!contained_in("lyrata ficus", "ficus lyrata"));
        assert!(!contained_in("fi", "ficus lyrata"));
        assert!(!contained_in("rosa", "ficus lyrata"));
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(0.42), 0.42);
    }
}
