//! Error types for the reconciliation engine and its collaborators
//!
//! Collaborator errors never reach the HTTP caller: the engine absorbs them
//! into a degraded (possibly empty) result list. Only `RequestError` is
//! surfaced, as a client error.

use std::time::Duration;

/// Failure of the plant catalog capability
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("catalog query failed: {0}")]
    Query(String),

    #[error("catalog lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to load catalog: {0}")]
    Load(String),
}

/// Failure of the species identification (model) capability
#[derive(Debug, thiserror::Error)]
pub enum IdentifyError {
    #[error("identification model unavailable: {0}")]
    Unavailable(String),

    #[error("identification model timed out after {0:?}")]
    Timeout(Duration),

    #[error("unparseable model output: {0}")]
    Parse(String),
}

/// Malformed identification request
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("invalid identification type '{0}' (expected 'image' or 'description')")]
    InvalidType(String),

    #[error("missing input: provide an image or a description")]
    MissingInput,

    #[error("'{0}' is required for identification type '{0}'")]
    MissingField(&'static str),
}
