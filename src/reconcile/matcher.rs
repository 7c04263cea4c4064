//! Tiered catalog matching
//!
//! Each candidate is resolved to at most one catalog record by trying
//! progressively looser criteria, stopping at the first hit:
//! 1. exact scientific name (case-insensitive)
//! 2. exact common name: the candidate's `name`, then each of its `commonNames`
//! 3. fuzzy scientific name: containment or token overlap against a pool of
//!    loosely matching records; best overlap wins, ties go to the
//!    alphabetically first scientific name
//!
//! A failing or slow lookup only affects its own candidate.

use std::cmp::Ordering;

use futures::future::join_all;

use crate::catalog::PlantCatalog;
use crate::config::ReconcileConfig;
use crate::error::CatalogError;
use crate::types::{Candidate, CatalogRecord};
use crate::utils::normalization::{contained_in, normalize_name, token_overlap};

/// Which tier produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    ScientificName,
    CommonName,
    Fuzzy,
}

/// Result of resolving one candidate
#[derive(Debug)]
pub enum MatchOutcome {
    Matched { record: CatalogRecord, tier: MatchTier },
    NoMatch,
    /// The catalog failed for this candidate; treated as no match
    LookupFailed(CatalogError),
}

impl MatchOutcome {
    pub fn record(&self) -> Option<&CatalogRecord> {
        match self {
            MatchOutcome::Matched { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn tier(&self) -> Option<MatchTier> {
        match self {
            MatchOutcome::Matched { tier, .. } => Some(*tier),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, MatchOutcome::LookupFailed(_))
    }
}

pub struct DatabaseMatcher<'a> {
    catalog: &'a dyn PlantCatalog,
    config: &'a ReconcileConfig,
}

impl<'a> DatabaseMatcher<'a> {
    pub fn new(catalog: &'a dyn PlantCatalog, config: &'a ReconcileConfig) -> Self {
        Self { catalog, config }
    }

    /// Resolve all candidates concurrently; outcome `i` belongs to candidate `i`
    pub async fn match_all(&self, candidates: &[Candidate]) -> Vec<MatchOutcome> {
        join_all(candidates.iter().map(|c| self.match_candidate(c))).await
    }

    /// Resolve one candidate within the configured lookup timeout
    pub async fn match_candidate(&self, candidate: &Candidate) -> MatchOutcome {
        let timeout = self.config.lookup_timeout;
        match tokio::time::timeout(timeout, self.resolve(candidate)).await {
            Ok(Ok(Some((record, tier)))) => {
                tracing::debug!(
                    "Candidate '{}' matched {} ({}) via {:?}",
                    candidate.scientific_name,
                    record.id,
                    record.scientific_name,
                    tier
                );
                MatchOutcome::Matched { record, tier }
            }
            Ok(Ok(None)) => {
                tracing::debug!("Candidate '{}' has no catalog match", candidate.scientific_name);
                MatchOutcome::NoMatch
            }
            Ok(Err(e)) => {
                tracing::warn!("Catalog lookup failed for '{}': {}", candidate.scientific_name, e);
                MatchOutcome::LookupFailed(e)
            }
            Err(_) => {
                tracing::warn!("Catalog lookup for '{}' timed out after {:?}", candidate.scientific_name, timeout);
                MatchOutcome::LookupFailed(CatalogError::Timeout(timeout))
            }
        }
    }

    async fn resolve(&self, candidate: &Candidate) -> Result<Option<(CatalogRecord, MatchTier)>, CatalogError> {
        // Tier 1: exact scientific name
        if let Some(record) = self.catalog.find_by_scientific_name(&candidate.match_key).await? {
            return Ok(Some((record, MatchTier::ScientificName)));
        }

        // Tier 2: exact common name
        for name in std::iter::once(&candidate.name).chain(candidate.common_names.iter()) {
            if normalize_name(name).is_empty() {
                continue;
            }
            if let Some(record) = self.catalog.find_by_common_name(name).await? {
                return Ok(Some((record, MatchTier::CommonName)));
            }
        }

        // Tier 3: fuzzy scientific name
        let pool = self
            .catalog
            .search_names(&candidate.match_key, self.config.fuzzy_pool_size)
            .await?;
        Ok(best_fuzzy_match(&candidate.match_key, pool, self.config.fuzzy_threshold)
            .map(|record| (record, MatchTier::Fuzzy)))
    }
}

/// Pick the best tier-3 match from a pool.
///
/// A record qualifies if the candidate key sits inside its scientific name
/// as whole words, or their token overlap reaches `threshold`. Highest
/// overlap wins; exact ties go to the alphabetically first normalized
/// scientific name.
pub fn best_fuzzy_match(match_key: &str, pool: Vec<CatalogRecord>, threshold: f64) -> Option<CatalogRecord> {
    pool.into_iter()
        .filter_map(|record| {
            let target = normalize_name(&record.scientific_name);
            let overlap = token_overlap(match_key, &target);
            (overlap >= threshold || contained_in(match_key, &target)).then_some((overlap, target, record))
        })
        .min_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        })
        .map(|(_, _, record)| record)
}
