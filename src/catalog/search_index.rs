//! FST-based in-memory catalog index
//!
//! Provides exact and loose lookup across:
//! - Scientific names (Latin binomials) and their individual words
//! - Common names and their individual words
//! - Genus and family names
//!
//! Exact lookups (scientific / common name) go through hash maps. Loose
//! lookups go through an FST of every search term, which supports prefix
//! and Levenshtein (typo tolerant) search in well under a millisecond.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use fst::automaton::{Levenshtein, Str};
use fst::{Automaton, IntoStreamer, Map, MapBuilder, Streamer};
use rustc_hash::{FxHashMap, FxHashSet};

use super::PlantCatalog;
use crate::error::CatalogError;
use crate::types::{CatalogRecord, RelatedRecord};
use crate::utils::normalization::normalize_name;

/// Relevance reported for a relative sharing the genus
pub const SAME_GENUS_RELEVANCE: f64 = 0.6;
/// Relevance reported for a relative sharing only the family
pub const SAME_FAMILY_RELEVANCE: f64 = 0.45;

/// Words shorter than this are not indexed on their own
const MIN_WORD_LEN: usize = 3;

pub struct CatalogIndex {
    /// FST mapping search term -> first record index
    fst_map: Map<Vec<u8>>,
    /// All records, ordered by scientific name
    records: Vec<CatalogRecord>,
    /// search term -> all record indices carrying it
    term_to_indices: FxHashMap<String, Vec<usize>>,
    by_id: FxHashMap<String, usize>,
    by_scientific: FxHashMap<String, usize>,
    by_common: FxHashMap<String, usize>,
    by_genus: FxHashMap<String, Vec<usize>>,
    by_family: FxHashMap<String, Vec<usize>>,
    fst_size: usize,
}

impl CatalogIndex {
    /// Build the index from catalog records
    pub fn build(records: Vec<CatalogRecord>) -> Result<Self, CatalogError> {
        let start = std::time::Instant::now();

        // Drop unusable records and duplicate ids (first in input order wins)
        let mut seen_ids: FxHashSet<String> = FxHashSet::default();
        let mut records: Vec<CatalogRecord> = records
            .into_iter()
            .filter(|r| {
                if r.id.trim().is_empty() || normalize_name(&r.scientific_name).is_empty() {
                    tracing::warn!("Skipping catalog record without id or scientific name: {:?}", r.id);
                    return false;
                }
                if !seen_ids.insert(r.id.clone()) {
                    tracing::warn!("Duplicate catalog id {}, keeping first", r.id);
                    return false;
                }
                true
            })
            .collect();

        // Alphabetical order makes every "first match" deterministic
        records.sort_by(|a, b| {
            normalize_name(&a.scientific_name)
                .cmp(&normalize_name(&b.scientific_name))
                .then_with(|| a.id.cmp(&b.id))
        });

        let by_id: FxHashMap<String, usize> = records
            .iter()
            .enumerate()
            .map(|(idx, r)| (r.id.clone(), idx))
            .collect();

        let mut search_terms: Vec<(String, usize)> = Vec::new();
        let mut by_scientific: FxHashMap<String, usize> = FxHashMap::default();
        let mut by_common: FxHashMap<String, usize> = FxHashMap::default();
        let mut by_genus: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        let mut by_family: FxHashMap<String, Vec<usize>> = FxHashMap::default();

        for (idx, record) in records.iter().enumerate() {
            // 1. Scientific name and its words ("deliciosa" finds Monstera deliciosa)
            let sci = normalize_name(&record.scientific_name);
            by_scientific.entry(sci.clone()).or_insert(idx);
            push_with_words(&mut search_terms, &sci, idx);

            // 2. Genus (explicit, else the first word of the binomial)
            let genus = genus_key(record);
            if let Some(genus) = &genus {
                by_genus.entry(genus.clone()).or_default().push(idx);
                search_terms.push((genus.clone(), idx));
            }

            // 3. All common names ("coconut", "coconut palm", ...)
            for cn in &record.common_names {
                let cn = normalize_name(cn);
                if cn.is_empty() {
                    continue;
                }
                by_common.entry(cn.clone()).or_insert(idx);
                push_with_words(&mut search_terms, &cn, idx);
            }

            // 4. Family
            if let Some(family) = record.family.as_deref().map(normalize_name).filter(|f| !f.is_empty()) {
                by_family.entry(family.clone()).or_default().push(idx);
                search_terms.push((family, idx));
            }
        }

        // FST requires lexicographically sorted, unique keys
        search_terms.sort();
        search_terms.dedup();

        let mut term_to_indices: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (term, idx) in &search_terms {
            term_to_indices.entry(term.clone()).or_default().push(*idx);
        }

        let mut builder = MapBuilder::memory();
        let mut last_term: Option<&str> = None;
        for (term, idx) in &search_terms {
            if last_term == Some(term.as_str()) {
                continue;
            }
            builder
                .insert(term.as_bytes(), *idx as u64)
                .map_err(|e| CatalogError::Load(format!("FST insert failed: {}", e)))?;
            last_term = Some(term.as_str());
        }
        let fst_bytes = builder
            .into_inner()
            .map_err(|e| CatalogError::Load(format!("FST build failed: {}", e)))?;
        let fst_size = fst_bytes.len();
        let fst_map = Map::new(fst_bytes).map_err(|e| CatalogError::Load(format!("FST load failed: {}", e)))?;

        tracing::info!(
            "Catalog index built in {:?} ({} plants, {} unique terms, {} bytes)",
            start.elapsed(),
            records.len(),
            term_to_indices.len(),
            fst_size
        );

        Ok(Self {
            fst_map,
            records,
            term_to_indices,
            by_id,
            by_scientific,
            by_common,
            by_genus,
            by_family,
            fst_size,
        })
    }

    /// Load records from a JSON file (an array of records)
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {:?}", path))?;
        let records: Vec<CatalogRecord> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse catalog file: {:?}", path))?;
        Ok(Self::build(records)?)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get_by_id(&self, id: &str) -> Option<&CatalogRecord> {
        self.by_id.get(id).map(|&idx| &self.records[idx])
    }

    /// Prefix search (fast, for typeahead)
    pub fn search_prefix(&self, query: &str, limit: usize) -> Vec<&CatalogRecord> {
        let query = normalize_name(query);
        if query.is_empty() {
            return vec![];
        }
        let prefix = Str::new(&query).starts_with();
        self.collect_matches(self.fst_map.search(prefix).into_stream(), limit)
    }

    /// Fuzzy search (allows typos)
    pub fn search_fuzzy(&self, query: &str, max_distance: u32, limit: usize) -> Vec<&CatalogRecord> {
        let query = normalize_name(query);
        if query.is_empty() {
            return vec![];
        }

        let lev = match Levenshtein::new(&query, max_distance) {
            Ok(l) => l,
            Err(e) => {
                tracing::debug!("Levenshtein automaton for '{}' unavailable ({}), using prefix", query, e);
                return self.search_prefix(&query, limit);
            }
        };
        self.collect_matches(self.fst_map.search(lev).into_stream(), limit)
    }

    /// Pool of plausible records for a loose name: typo matches of the whole
    /// name, then prefix matches of the name and of each of its words.
    pub fn candidate_pool(&self, query: &str, limit: usize) -> Vec<&CatalogRecord> {
        let key = normalize_name(query);
        if key.is_empty() || limit == 0 {
            return vec![];
        }

        let distance = if key.len() >= 8 { 2 } else { 1 };
        let mut batches = vec![
            self.search_fuzzy(&key, distance, limit),
            self.search_prefix(&key, limit),
        ];
        batches.extend(
            key.split_whitespace()
                .filter(|w| w.len() >= MIN_WORD_LEN)
                .map(|w| self.search_prefix(w, limit)),
        );

        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut pool: Vec<&CatalogRecord> = Vec::new();
        for record in batches.into_iter().flatten() {
            if seen.insert(record.id.as_str()) {
                pool.push(record);
                if pool.len() >= limit {
                    break;
                }
            }
        }

        pool
    }

    /// Same-genus relatives first, then same-family, each alphabetical.
    pub fn related(&self, record: &CatalogRecord, limit: usize) -> Vec<RelatedRecord> {
        let mut seen: FxHashSet<usize> = FxHashSet::default();
        if let Some(&own) = self.by_id.get(&record.id) {
            seen.insert(own);
        }

        let mut out = Vec::new();
        let groups = [
            (genus_key(record).and_then(|g| self.by_genus.get(&g)), SAME_GENUS_RELEVANCE),
            (
                record
                    .family
                    .as_deref()
                    .map(normalize_name)
                    .and_then(|f| self.by_family.get(&f)),
                SAME_FAMILY_RELEVANCE,
            ),
        ];

        for (indices, relevance) in groups {
            for &idx in indices.into_iter().flatten() {
                if out.len() >= limit {
                    return out;
                }
                if self.records[idx].id == record.id || !seen.insert(idx) {
                    continue;
                }
                out.push(RelatedRecord {
                    record: self.records[idx].clone(),
                    relevance: Some(relevance),
                });
            }
        }

        out
    }

    /// Get index statistics
    pub fn stats(&self) -> CatalogIndexStats {
        CatalogIndexStats {
            plant_count: self.records.len(),
            term_count: self.term_to_indices.len(),
            fst_bytes: self.fst_size,
        }
    }

    fn collect_matches<'a, S>(&'a self, mut stream: S, limit: usize) -> Vec<&'a CatalogRecord>
    where
        S: for<'s> Streamer<'s, Item = (&'s [u8], u64)>,
    {
        let mut seen: FxHashSet<usize> = FxHashSet::default();
        let mut results: Vec<&CatalogRecord> = Vec::new();

        while let Some((term, _idx)) = stream.next() {
            let Ok(term_str) = std::str::from_utf8(term) else {
                continue;
            };
            let Some(indices) = self.term_to_indices.get(term_str) else {
                continue;
            };
            for &idx in indices {
                if idx < self.records.len() && seen.insert(idx) {
                    results.push(&self.records[idx]);
                    if results.len() >= limit {
                        return results;
                    }
                }
            }
        }

        results
    }
}

/// Index a normalized name plus each of its words
fn push_with_words(terms: &mut Vec<(String, usize)>, name: &str, idx: usize) {
    terms.push((name.to_string(), idx));
    for word in name.split_whitespace() {
        if word.len() >= MIN_WORD_LEN && word != name {
            terms.push((word.to_string(), idx));
        }
    }
}

/// Normalized genus: explicit field, else first word of the scientific name
fn genus_key(record: &CatalogRecord) -> Option<String> {
    record
        .genus
        .as_deref()
        .map(normalize_name)
        .filter(|g| !g.is_empty())
        .or_else(|| {
            normalize_name(&record.scientific_name)
                .split_whitespace()
                .next()
                .map(str::to_string)
        })
}

#[async_trait]
impl PlantCatalog for CatalogIndex {
    async fn find_by_scientific_name(&self, name: &str) -> Result<Option<CatalogRecord>, CatalogError> {
        Ok(self
            .by_scientific
            .get(&normalize_name(name))
            .map(|&idx| self.records[idx].clone()))
    }

    async fn find_by_common_name(&self, name: &str) -> Result<Option<CatalogRecord>, CatalogError> {
        Ok(self
            .by_common
            .get(&normalize_name(name))
            .map(|&idx| self.records[idx].clone()))
    }

    async fn search_names(&self, query: &str, limit: usize) -> Result<Vec<CatalogRecord>, CatalogError> {
        Ok(self.candidate_pool(query, limit).into_iter().cloned().collect())
    }

    async fn find_related(&self, record: &CatalogRecord, limit: usize) -> Result<Vec<RelatedRecord>, CatalogError> {
        Ok(self.related(record, limit))
    }
}

#[derive(Debug, serde::Serialize)]
pub struct CatalogIndexStats {
    pub plant_count: usize,
    pub term_count: usize,
    pub fst_bytes: usize,
}
