//! Identification reconciliation
//!
//! Turns a model's raw species guesses into an ordered list of enriched
//! results:
//! 1. normalize candidates (drop unusable ones, clamp confidence)
//! 2. resolve every candidate against the catalog concurrently
//! 3. fuse each candidate with its match (or make it a synthetic entry)
//! 4. suggest similar plants around the strongest match
//! 5. dedup, sort and append suggestions
//!
//! Collaborator failures degrade the output; they never fail the call.

pub mod assembler;
pub mod fusion;
pub mod matcher;
pub mod normalizer;
pub mod similar;

use std::sync::Arc;
use std::time::Instant;

use rustc_hash::FxHashSet;

use crate::catalog::PlantCatalog;
use crate::config::ReconcileConfig;
use crate::identifier::SpeciesIdentifier;
use crate::types::{EnrichedResult, IdentificationInput, RawCandidate};

pub use assembler::assemble;
pub use fusion::{fuse, synthetic_id, SYNTHETIC_ID_PREFIX};
pub use matcher::{best_fuzzy_match, DatabaseMatcher, MatchOutcome, MatchTier};
pub use normalizer::normalize_candidates;
pub use similar::{select_top_match, SimilarPlantFinder};

/// What happened during one reconciliation, for logging
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileDiagnostics {
    pub candidates_in: usize,
    pub candidates_dropped: usize,
    /// Match tier per surviving candidate, in candidate order
    pub tiers: Vec<Option<MatchTier>>,
    pub lookup_failures: usize,
    pub similar_lookup_failed: bool,
    pub similar_added: usize,
}

impl ReconcileDiagnostics {
    pub fn matched(&self) -> usize {
        self.tiers.iter().filter(|t| t.is_some()).count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub results: Vec<EnrichedResult>,
    pub diagnostics: ReconcileDiagnostics,
}

/// Reconciliation engine over an injected catalog
///
/// Holds no per-request state; one engine serves concurrent requests.
pub struct ReconcileEngine {
    catalog: Arc<dyn PlantCatalog>,
    config: ReconcileConfig,
}

impl ReconcileEngine {
    pub fn new(catalog: Arc<dyn PlantCatalog>, config: ReconcileConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Reconcile raw candidates into the final result list
    pub async fn reconcile(&self, raw: Vec<RawCandidate>) -> Vec<EnrichedResult> {
        self.reconcile_with_diagnostics(raw).await.results
    }

    pub async fn reconcile_with_diagnostics(&self, raw: Vec<RawCandidate>) -> ReconcileOutcome {
        let start = Instant::now();
        let mut diagnostics = ReconcileDiagnostics {
            candidates_in: raw.len(),
            ..Default::default()
        };

        let candidates = normalize_candidates(raw);
        diagnostics.candidates_dropped = diagnostics.candidates_in - candidates.len();
        if candidates.is_empty() {
            tracing::info!("No usable candidates ({} received)", diagnostics.candidates_in);
            return ReconcileOutcome { results: vec![], diagnostics };
        }

        let catalog = self.catalog.as_ref();
        let outcomes = DatabaseMatcher::new(catalog, &self.config).match_all(&candidates).await;

        diagnostics.tiers = outcomes.iter().map(MatchOutcome::tier).collect();
        diagnostics.lookup_failures = outcomes.iter().filter(|o| o.is_failure()).count();
        if diagnostics.lookup_failures == outcomes.len() {
            tracing::warn!(
                "Catalog lookups failed for all {} candidates; returning unverified results",
                outcomes.len()
            );
        }

        let primary: Vec<EnrichedResult> = candidates
            .iter()
            .zip(&outcomes)
            .map(|(candidate, outcome)| fuse(candidate, outcome.record()))
            .collect();

        let pairs: Vec<_> = candidates.iter().zip(outcomes.iter().map(MatchOutcome::record)).collect();
        let similar = match select_top_match(&pairs) {
            Some(top) => {
                let exclude: FxHashSet<String> = primary.iter().map(|r| r.id.clone()).collect();
                match SimilarPlantFinder::new(catalog, &self.config).find(top, &exclude).await {
                    Ok(similar) => similar,
                    Err(e) => {
                        tracing::warn!("Similar plant lookup for {} failed: {}", top.id, e);
                        diagnostics.similar_lookup_failed = true;
                        vec![]
                    }
                }
            }
            None => vec![],
        };

        let primary_count = primary.len();
        let results = assemble(primary, similar);
        diagnostics.similar_added = results.iter().filter(|r| r.is_similar_plant).count();

        tracing::info!(
            "Reconciled {} candidates: {} matched, {} unverified, {} similar ({:.2?})",
            candidates.len(),
            diagnostics.matched(),
            primary_count - diagnostics.matched(),
            diagnostics.similar_added,
            start.elapsed()
        );

        ReconcileOutcome { results, diagnostics }
    }

    /// Ask the identifier for candidates, then reconcile them.
    ///
    /// A failed or slow model yields an empty list rather than an error.
    pub async fn identify(&self, identifier: &dyn SpeciesIdentifier, input: &IdentificationInput) -> Vec<EnrichedResult> {
        let timeout = self.config.model_timeout;
        let raw = match tokio::time::timeout(timeout, identifier.identify(input)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                tracing::warn!("Identification ({}) failed: {}", input.kind(), e);
                return vec![];
            }
            Err(_) => {
                tracing::warn!("Identification ({}) timed out after {:?}", input.kind(), timeout);
                return vec![];
            }
        };

        tracing::debug!("Model returned {} candidates for {} input", raw.len(), input.kind());
        self.reconcile(raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogIndex;
    use crate::error::IdentifyError;
    use crate::identifier::FixtureIdentifier;
    use crate::types::CatalogRecord;
    use async_trait::async_trait;

    fn record(id: &str, sci: &str, common: &[&str], family: &str) -> CatalogRecord {
        CatalogRecord {
            id: id.to_string(),
            scientific_name: sci.to_string(),
            common_names: common.iter().map(|s| s.to_string()).collect(),
            description: format!("{} description", sci),
            image_url: None,
            genus: None,
            family: Some(family.to_string()),
        }
    }

    fn engine() -> ReconcileEngine {
        let index = CatalogIndex::build(vec![
            record("p1", "Monstera deliciosa", &["Swiss cheese plant"], "Araceae"),
            record("p2", "Monstera adansonii", &["Swiss cheese vine"], "Araceae"),
            record("p3", "Philodendron hederaceum", &["Heartleaf philodendron"], "Araceae"),
            record("p4", "Ficus lyrata", &["Fiddle-leaf fig"], "Moraceae"),
        ])
        .unwrap();
        ReconcileEngine::new(Arc::new(index), ReconcileConfig::default())
    }

    fn raw(sci: &str, confidence: f64) -> RawCandidate {
        RawCandidate {
            scientific_name: Some(sci.to_string()),
            confidence: Some(confidence),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_diagnostics() {
        let outcome = engine()
            .reconcile_with_diagnostics(vec![raw("Monstera deliciosa", 0.9), raw("", 0.5), raw("Nonexistus plantus", 0.4)])
            .await;
        let d = &outcome.diagnostics;
        assert_eq!(d.candidates_in, 3);
        assert_eq!(d.candidates_dropped, 1);
        assert_eq!(d.tiers, vec![Some(MatchTier::ScientificName), None]);
        assert_eq!(d.matched(), 1);
        assert_eq!(d.lookup_failures, 0);
        assert!(!d.similar_lookup_failed);
        assert_eq!(d.similar_added, 2);

        let ids: Vec<&str> = outcome.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids[0], "p1");
        assert!(ids[1].starts_with(SYNTHETIC_ID_PREFIX));
        // same genus first, then same family
        assert_eq!(&ids[2..], &["p2", "p3"]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outcome = engine().reconcile_with_diagnostics(vec![]).await;
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.diagnostics, ReconcileDiagnostics::default());
    }

    #[tokio::test]
    async fn test_identify_uses_identifier_output() {
        let identifier = FixtureIdentifier::new().with_description("split leaves", vec![raw("Monstera deliciosa", 0.8)]);
        let results = engine()
            .identify(&identifier, &IdentificationInput::Description("Split   Leaves".to_string()))
            .await;
        assert_eq!(results[0].id, "p1");
        assert!(results[0].database_match);
    }

    struct FailingIdentifier;

    #[async_trait]
    impl SpeciesIdentifier for FailingIdentifier {
        async fn identify(&self, _input: &IdentificationInput) -> Result<Vec<RawCandidate>, IdentifyError> {
            Err(IdentifyError::Unavailable("quota exhausted".to_string()))
        }
    }

    #[tokio::test]
    async fn test_identify_failure_is_empty() {
        let results = engine()
            .identify(&FailingIdentifier, &IdentificationInput::Description("anything".to_string()))
            .await;
        assert!(results.is_empty());
    }
}
