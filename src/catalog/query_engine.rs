// DataFusion query engine for parquet plant catalogs
//
// Purpose: read the plant master parquet once at startup and hand the rows
// to `CatalogIndex`, which serves every lookup from memory afterwards.
// Column names follow the plant master dataset (wfo_taxon_id,
// wfo_scientific_name, vernacular_name_en, genus, family); plain names
// (id, scientific_name, common_names, ...) are accepted as fallbacks.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, LargeStringArray, StringArray, StringViewArray};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::error::DataFusionError;
use datafusion::prelude::*;

use super::CatalogIndex;
use crate::types::CatalogRecord;
use crate::utils::vernacular::split_vernacular;

pub type DFResult<T> = Result<T, DataFusionError>;

/// Helper enum to handle StringArray, LargeStringArray and StringViewArray
enum StringColumn<'a> {
    Array(&'a StringArray),
    Large(&'a LargeStringArray),
    View(&'a StringViewArray),
}

impl<'a> StringColumn<'a> {
    fn from_batch(batch: &'a RecordBatch, names: &[&str]) -> Option<Self> {
        let col = names.iter().find_map(|n| batch.column_by_name(n))?;
        let any = col.as_any();
        if let Some(a) = any.downcast_ref::<StringViewArray>() {
            Some(StringColumn::View(a))
        } else if let Some(a) = any.downcast_ref::<StringArray>() {
            Some(StringColumn::Array(a))
        } else {
            any.downcast_ref::<LargeStringArray>().map(StringColumn::Large)
        }
    }

    /// Non-null, non-blank value at row `i`
    fn get(&self, i: usize) -> Option<&'a str> {
        let value = match *self {
            StringColumn::Array(a) => (!a.is_null(i)).then(|| a.value(i)),
            StringColumn::Large(a) => (!a.is_null(i)).then(|| a.value(i)),
            StringColumn::View(v) => (!v.is_null(i)).then(|| v.value(i)),
        }?;
        let value = value.trim();
        (!value.is_empty() && value != "NA").then_some(value)
    }
}

#[derive(Clone)]
pub struct QueryEngine {
    ctx: Arc<SessionContext>,
}

impl QueryEngine {
    /// Register the plant parquet file as table `plants`
    pub async fn new(plants_path: &str) -> DFResult<Self> {
        if !Path::new(plants_path).exists() {
            return Err(DataFusionError::External(
                format!("Plant catalog not found: {}", plants_path).into(),
            ));
        }

        let ctx = SessionContext::new();
        ctx.register_parquet("plants", plants_path, ParquetReadOptions::default())
            .await?;

        Ok(Self { ctx: Arc::new(ctx) })
    }

    /// Raw SQL execution
    pub async fn query(&self, sql: &str) -> DFResult<Vec<RecordBatch>> {
        let df = self.ctx.sql(sql).await?;
        df.collect().await
    }

    /// Read every plant row as a catalog record
    pub async fn load_records(&self) -> DFResult<Vec<CatalogRecord>> {
        let batches = self.query("SELECT * FROM plants").await?;
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for batch in &batches {
            let id_col = StringColumn::from_batch(batch, &["wfo_taxon_id", "id"]);
            let sci_col = StringColumn::from_batch(batch, &["wfo_scientific_name", "scientific_name"]);
            let (Some(id_col), Some(sci_col)) = (id_col, sci_col) else {
                return Err(DataFusionError::Plan(
                    "plants table needs an id and a scientific name column".to_string(),
                ));
            };
            let common_col = StringColumn::from_batch(batch, &["vernacular_name_en", "common_names"]);
            let genus_col = StringColumn::from_batch(batch, &["genus"]);
            let family_col = StringColumn::from_batch(batch, &["family"]);
            let desc_col = StringColumn::from_batch(batch, &["description"]);
            let image_col = StringColumn::from_batch(batch, &["image_url"]);

            for i in 0..batch.num_rows() {
                let (Some(id), Some(sci)) = (id_col.get(i), sci_col.get(i)) else {
                    skipped += 1;
                    continue;
                };
                let text = |col: &Option<StringColumn<'_>>| col.as_ref().and_then(|c| c.get(i)).map(str::to_string);

                records.push(CatalogRecord {
                    id: id.to_string(),
                    scientific_name: sci.to_string(),
                    common_names: text(&common_col).map(|s| split_vernacular(&s)).unwrap_or_default(),
                    description: text(&desc_col).unwrap_or_default(),
                    image_url: text(&image_col),
                    genus: text(&genus_col),
                    family: text(&family_col),
                });
            }
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} plant rows without id or scientific name", skipped);
        }
        Ok(records)
    }
}

impl CatalogIndex {
    /// Load a parquet plant catalog through DataFusion and index it
    pub async fn from_parquet(plants_path: &str) -> anyhow::Result<Self> {
        tracing::info!("Initializing DataFusion query engine...");
        let engine = QueryEngine::new(plants_path).await?;
        let records = engine.load_records().await?;
        tracing::info!("Read {} plant rows from {}", records.len(), plants_path);
        Ok(CatalogIndex::build(records)?)
    }
}
