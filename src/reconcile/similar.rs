//! Similar plant suggestions
//!
//! Once at least one candidate matched the catalog, the strongest match
//! (highest confidence, earliest candidate on ties) seeds a bounded list of
//! related catalog records. They are suggestions to browse, so their
//! confidence is capped below anything that would outrank a real
//! identification.

use std::cmp::Ordering;

use rustc_hash::FxHashSet;

use super::fusion::similar_result;
use crate::catalog::PlantCatalog;
use crate::config::{ReconcileConfig, SIMILAR_CONFIDENCE_CAP};
use crate::error::CatalogError;
use crate::types::{Candidate, CatalogRecord, EnrichedResult, RelatedRecord};

/// Upper bound on rows requested from the catalog for one suggestion list
const MAX_RELATED_REQUEST: usize = 256;

/// Highest-confidence matched record; ties go to the earlier candidate
pub fn select_top_match<'a>(matches: &[(&'a Candidate, Option<&'a CatalogRecord>)]) -> Option<&'a CatalogRecord> {
    matches
        .iter()
        .filter_map(|(candidate, record)| record.map(|r| (*candidate, r)))
        .fold(None, |best: Option<(&Candidate, &CatalogRecord)>, (candidate, record)| match best {
            Some((b, _)) if b.confidence.partial_cmp(&candidate.confidence) != Some(Ordering::Less) => best,
            _ => Some((candidate, record)),
        })
        .map(|(_, record)| record)
}

pub struct SimilarPlantFinder<'a> {
    catalog: &'a dyn PlantCatalog,
    config: &'a ReconcileConfig,
}

impl<'a> SimilarPlantFinder<'a> {
    pub fn new(catalog: &'a dyn PlantCatalog, config: &'a ReconcileConfig) -> Self {
        Self { catalog, config }
    }

    /// Related records for `top`, excluding `top` and every id in `exclude`
    pub async fn find(
        &self,
        top: &CatalogRecord,
        exclude: &FxHashSet<String>,
    ) -> Result<Vec<EnrichedResult>, CatalogError> {
        let limit = self.config.similar_limit;
        if limit == 0 {
            return Ok(vec![]);
        }

        let timeout = self.config.lookup_timeout;
        let related = tokio::time::timeout(timeout, self.collect_related(top, exclude, limit))
            .await
            .map_err(|_| CatalogError::Timeout(timeout))??;

        let cap = self.config.similar_confidence_cap.min(SIMILAR_CONFIDENCE_CAP);
        let similar: Vec<EnrichedResult> = related
            .into_iter()
            .map(|r| {
                let relevance = r.relevance.filter(|v| v.is_finite()).unwrap_or(cap);
                similar_result(&r.record, relevance.min(cap))
            })
            .collect();

        tracing::debug!(
            "Found {} similar plants for {} ({})",
            similar.len(),
            top.id,
            top.scientific_name
        );
        Ok(similar)
    }

    /// Up to `limit` distinct related records that are neither `top` nor
    /// excluded. The catalog may repeat rows, so the request grows until
    /// enough survive or the catalog runs out.
    async fn collect_related(
        &self,
        top: &CatalogRecord,
        exclude: &FxHashSet<String>,
        limit: usize,
    ) -> Result<Vec<RelatedRecord>, CatalogError> {
        let mut request = limit + exclude.len() + 1;
        loop {
            let batch = self.catalog.find_related(top, request).await?;
            let exhausted = batch.len() < request;

            let mut seen: FxHashSet<String> = FxHashSet::default();
            let kept: Vec<RelatedRecord> = batch
                .into_iter()
                .filter(|r| r.record.id != top.id && !exclude.contains(&r.record.id))
                .filter(|r| seen.insert(r.record.id.clone()))
                .take(limit)
                .collect();

            if kept.len() >= limit || exhausted || request >= MAX_RELATED_REQUEST {
                return Ok(kept);
            }
            request = (request * 2).min(MAX_RELATED_REQUEST);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::normalization::normalize_name;
    use async_trait::async_trait;

    fn record(id: &str, sci: &str) -> CatalogRecord {
        CatalogRecord {
            id: id.to_string(),
            scientific_name: sci.to_string(),
            common_names: vec![],
            description: String::new(),
            image_url: None,
            genus: None,
            family: None,
        }
    }

    fn candidate(sci: &str, confidence: f64) -> Candidate {
        Candidate {
            index: 0,
            name: sci.to_string(),
            scientific_name: sci.to_string(),
            match_key: normalize_name(sci),
            confidence,
            description: String::new(),
            care_instructions: None,
            common_names: vec![],
        }
    }

    /// Returns a fixed related list, including the top record itself
    struct FixedRelated(Vec<RelatedRecord>);

    #[async_trait]
    impl PlantCatalog for FixedRelated {
        async fn find_by_scientific_name(&self, _name: &str) -> Result<Option<CatalogRecord>, CatalogError> {
            Ok(None)
        }
        async fn find_by_common_name(&self, _name: &str) -> Result<Option<CatalogRecord>, CatalogError> {
            Ok(None)
        }
        async fn search_names(&self, _query: &str, _limit: usize) -> Result<Vec<CatalogRecord>, CatalogError> {
            Ok(vec![])
        }
        async fn find_related(&self, _record: &CatalogRecord, limit: usize) -> Result<Vec<RelatedRecord>, CatalogError> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    fn related(id: &str, relevance: Option<f64>) -> RelatedRecord {
        RelatedRecord { record: record(id, id), relevance }
    }

    #[test]
    fn test_top_match_highest_confidence_first_on_tie() {
        let (a, b, c) = (candidate("A a", 0.7), candidate("B b", 0.9), candidate("C c", 0.9));
        let (ra, rb, rc) = (record("ra", "A a"), record("rb", "B b"), record("rc", "C c"));
        let top = select_top_match(&[(&a, Some(&ra)), (&b, Some(&rb)), (&c, Some(&rc))]);
        assert_eq!(top.unwrap().id, "rb");

        let unmatched = candidate("D d", 0.99);
        let top = select_top_match(&[(&unmatched, None), (&a, Some(&ra))]);
        assert_eq!(top.unwrap().id, "ra");

        assert!(select_top_match(&[(&unmatched, None)]).is_none());
    }

    #[tokio::test]
    async fn test_excludes_and_caps() {
        let catalog = FixedRelated(vec![
            related("top", Some(0.9)),
            related("primary", Some(0.9)),
            related("s1", Some(0.9)),
            related("s1", Some(0.9)),
            related("s2", None),
            related("s3", Some(0.3)),
            related("s4", Some(0.6)),
        ]);
        let config = ReconcileConfig::default();
        let finder = SimilarPlantFinder::new(&catalog, &config);

        let exclude: FxHashSet<String> = ["primary".to_string()].into_iter().collect();
        let similar = finder.find(&record("top", "Top top"), &exclude).await.unwrap();

        let ids: Vec<&str> = similar.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);
        let confidences: Vec<f64> = similar.iter().map(|r| r.confidence).collect();
        assert_eq!(confidences, vec![0.6, 0.6, 0.3]);
        assert!(similar.iter().all(|r| r.is_similar_plant && !r.database_match));
    }

    #[tokio::test]
    async fn test_respects_configured_limit() {
        let catalog = FixedRelated(vec![related("s1", None), related("s2", None)]);
        let config = ReconcileConfig { similar_limit: 1, ..ReconcileConfig::default() };
        let finder = SimilarPlantFinder::new(&catalog, &config);
        let similar = finder.find(&record("top", "Top top"), &FxHashSet::default()).await.unwrap();
        assert_eq!(similar.len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_rows_do_not_shrink_the_list() {
        let catalog = FixedRelated(vec![
            related("top", None),
            related("s1", None),
            related("s1", None),
            related("s2", None),
            related("s2", None),
            related("s3", None),
            related("s4", None),
        ]);
        let config = ReconcileConfig::default();
        let finder = SimilarPlantFinder::new(&catalog, &config);
        let similar = finder.find(&record("top", "Top top"), &FxHashSet::default()).await.unwrap();

        let ids: Vec<&str> = similar.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);
    }

    #[tokio::test]
    async fn test_short_catalog_returns_what_it_has() {
        let catalog = FixedRelated(vec![related("s1", None), related("s1", None)]);
        let config = ReconcileConfig::default();
        let finder = SimilarPlantFinder::new(&catalog, &config);
        let similar = finder.find(&record("top", "Top top"), &FxHashSet::default()).await.unwrap();
        assert_eq!(similar.len(), 1);
    }

    #[tokio::test]
    async fn test_configured_cap_never_exceeds_ceiling() {
        let catalog = FixedRelated(vec![related("s1", None), related("s2", Some(0.9))]);
        let config = ReconcileConfig {
            similar_confidence_cap: 0.95,
            ..ReconcileConfig::default()
        };
        let finder = SimilarPlantFinder::new(&catalog, &config);
        let similar = finder.find(&record("top", "Top top"), &FxHashSet::default()).await.unwrap();

        let confidences: Vec<f64> = similar.iter().map(|r| r.confidence).collect();
        assert_eq!(confidences, vec![SIMILAR_CONFIDENCE_CAP, SIMILAR_CONFIDENCE_CAP]);
    }
}
