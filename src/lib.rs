//! Plant identification reconciliation
//!
//! Takes the species guesses of an identification model and reconciles them
//! against an authoritative plant catalog, producing a ranked, enriched list
//! of results plus a few similar-plant suggestions.
//!
//! - `reconcile/`: the engine (normalize, match, fuse, suggest, assemble)
//! - `catalog/`: the catalog capability and its FST-backed index
//! - `identifier`: the model capability and its adapters
//! - `api_server`: HTTP surface (feature `api`)

pub mod utils;
pub mod types;
pub mod error;
pub mod config;
pub mod model_output;
pub mod identifier;
pub mod catalog;
pub mod reconcile;

#[cfg(feature = "api")]
pub mod api_server;

// Re-export commonly used types
pub use catalog::{CatalogIndex, PlantCatalog};
pub use config::{ReconcileConfig, ServerConfig};
pub use error::{CatalogError, IdentifyError, RequestError};
pub use identifier::SpeciesIdentifier;
pub use reconcile::{ReconcileEngine, ReconcileOutcome};
pub use types::*;

#[cfg(feature = "api")]
pub use api_server::{create_router, AppState};
