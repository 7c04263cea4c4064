//! Name handling shared by the catalog index and the reconciler
//!
//! - Normalization: matching keys and token similarity
//! - Vernacular: common-name cleanup and display names

pub mod normalization;
pub mod vernacular;

// Re-export commonly used functions
pub use normalization::{clamp_unit, normalize_name, token_overlap};
pub use vernacular::display_name;
