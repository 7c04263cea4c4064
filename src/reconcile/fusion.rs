//! Confidence fusion
//!
//! Confidence always answers "how sure is the model", never "how sure are we
//! the record exists": a catalog match keeps the candidate's confidence and
//! takes its taxonomy and text from the record; an unmatched candidate keeps
//! its confidence too but becomes an unverified synthetic entry.

use sha2::{Digest, Sha256};

use crate::types::{Candidate, CatalogRecord, EnrichedResult};
use crate::utils::normalization::{clamp_unit, normalize_name};
use crate::utils::vernacular::display_name;

/// Prefix of generated identities; catalog ids never carry it
pub const SYNTHETIC_ID_PREFIX: &str = "synthetic-";

/// Deterministic identity for an unmatched species.
///
/// Depends only on the normalized scientific name, so repeated requests for
/// the same species yield the same id.
pub fn synthetic_id(scientific_name: &str) -> String {
    let digest = Sha256::digest(normalize_name(scientific_name).as_bytes());
    let hex = format!("{:x}", digest);
    format!("{}{}", SYNTHETIC_ID_PREFIX, &hex[..16])
}

/// Merge a candidate with its match outcome
pub fn fuse(candidate: &Candidate, record: Option<&CatalogRecord>) -> EnrichedResult {
    match record {
        Some(record) => matched_result(candidate, record),
        None => synthetic_result(candidate),
    }
}

fn matched_result(candidate: &Candidate, record: &CatalogRecord) -> EnrichedResult {
    let name = if record.common_names.is_empty() {
        candidate.name.clone()
    } else {
        display_name(&record.common_names, &record.scientific_name)
    };
    let common_names = if record.common_names.is_empty() {
        candidate.common_names.clone()
    } else {
        record.common_names.clone()
    };
    let description = if record.description.trim().is_empty() {
        candidate.description.clone()
    } else {
        record.description.clone()
    };

    EnrichedResult {
        id: record.id.clone(),
        name,
        scientific_name: record.scientific_name.clone(),
        common_names,
        description,
        care_instructions: candidate.care_instructions.clone(),
        image_url: record.image_url.clone(),
        genus: record.genus.clone(),
        family: record.family.clone(),
        confidence: clamp_unit(candidate.confidence),
        database_match: true,
        is_similar_plant: false,
    }
}

fn synthetic_result(candidate: &Candidate) -> EnrichedResult {
    EnrichedResult {
        id: synthetic_id(&candidate.match_key),
        name: candidate.name.clone(),
        scientific_name: candidate.scientific_name.clone(),
        common_names: candidate.common_names.clone(),
        description: candidate.description.clone(),
        care_instructions: candidate.care_instructions.clone(),
        image_url: None,
        genus: None,
        family: None,
        confidence: clamp_unit(candidate.confidence),
        database_match: false,
        is_similar_plant: false,
    }
}

/// A related catalog record offered as a suggestion
pub fn similar_result(record: &CatalogRecord, confidence: f64) -> EnrichedResult {
    EnrichedResult {
        id: record.id.clone(),
        name: display_name(&record.common_names, &record.scientific_name),
        scientific_name: record.scientific_name.clone(),
        common_names: record.common_names.clone(),
        description: record.description.clone(),
        care_instructions: None,
        image_url: record.image_url.clone(),
        genus: record.genus.clone(),
        family: record.family.clone(),
        confidence: clamp_unit(confidence),
        database_match: false,
        is_similar_plant: true,
    }
}
