//! Plant catalog capability
//!
//! The catalog is externally owned and read-only to the engine. It is passed
//! in explicitly as a `PlantCatalog` implementation, so tests can substitute
//! an in-memory or failing catalog.

pub mod search_index;
#[cfg(feature = "api")]
pub mod query_engine;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CatalogError;
use crate::types::{CatalogRecord, RelatedRecord};

pub use search_index::{CatalogIndex, CatalogIndexStats};
#[cfg(feature = "api")]
pub use query_engine::QueryEngine;

#[async_trait]
pub trait PlantCatalog: Send + Sync {
    /// Exact, case-insensitive scientific name lookup
    async fn find_by_scientific_name(&self, name: &str) -> Result<Option<CatalogRecord>, CatalogError>;

    /// Exact, case-insensitive common name lookup
    async fn find_by_common_name(&self, name: &str) -> Result<Option<CatalogRecord>, CatalogError>;

    /// Loose name search (prefix, word and typo tolerant) returning a pool of
    /// records for the caller to score. Order carries no meaning.
    async fn search_names(&self, query: &str, limit: usize) -> Result<Vec<CatalogRecord>, CatalogError>;

    /// Records related to `record`, most related first. Never includes `record`.
    async fn find_related(&self, record: &CatalogRecord, limit: usize) -> Result<Vec<RelatedRecord>, CatalogError>;
}

#[async_trait]
impl<T: PlantCatalog + ?Sized> PlantCatalog for Arc<T> {
    async fn find_by_scientific_name(&self, name: &str) -> Result<Option<CatalogRecord>, CatalogError> {
        (**self).find_by_scientific_name(name).await
    }

    async fn find_by_common_name(&self, name: &str) -> Result<Option<CatalogRecord>, CatalogError> {
        (**self).find_by_common_name(name).await
    }

    async fn search_names(&self, query: &str, limit: usize) -> Result<Vec<CatalogRecord>, CatalogError> {
        (**self).search_names(query, limit).await
    }

    async fn find_related(&self, record: &CatalogRecord, limit: usize) -> Result<Vec<RelatedRecord>, CatalogError> {
        (**self).find_related(record, limit).await
    }
}
