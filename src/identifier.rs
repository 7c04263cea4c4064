//! Species identification capability (the generative model seam)
//!
//! The engine never talks to a model directly; it is handed something that
//! implements `SpeciesIdentifier`. Two adapters live here:
//! - `RetryingIdentifier`: bounded retry policy owned by the collaborator
//! - `FixtureIdentifier`: canned model replies loaded from a JSON file

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::IdentifyError;
use crate::model_output::{candidates_from_value, parse_model_reply};
use crate::types::{IdentificationInput, RawCandidate};

/// Retry attempts the model collaborator makes before giving up
pub const DEFAULT_MODEL_ATTEMPTS: usize = 2;

/// Async capability producing raw candidate identifications.
///
/// Returning an empty list is legitimate ("the model had no idea").
#[async_trait]
pub trait SpeciesIdentifier: Send + Sync {
    async fn identify(&self, input: &IdentificationInput) -> Result<Vec<RawCandidate>, IdentifyError>;
}

#[async_trait]
impl<T: SpeciesIdentifier + ?Sized> SpeciesIdentifier for Arc<T> {
    async fn identify(&self, input: &IdentificationInput) -> Result<Vec<RawCandidate>, IdentifyError> {
        (**self).identify(input).await
    }
}

/// Wraps an identifier with a fixed number of attempts and a pause between them
pub struct RetryingIdentifier<I> {
    inner: I,
    attempts: usize,
    backoff: Duration,
}

impl<I: SpeciesIdentifier> RetryingIdentifier<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            attempts: DEFAULT_MODEL_ATTEMPTS,
            backoff: Duration::from_millis(250),
        }
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

#[async_trait]
impl<I: SpeciesIdentifier> SpeciesIdentifier for RetryingIdentifier<I> {
    async fn identify(&self, input: &IdentificationInput) -> Result<Vec<RawCandidate>, IdentifyError> {
        let mut attempt = 1;
        loop {
            match self.inner.identify(input).await {
                Ok(candidates) => return Ok(candidates),
                // Unparseable output is not transient
                Err(e @ IdentifyError::Parse(_)) => return Err(e),
                Err(e) if attempt >= self.attempts => return Err(e),
                Err(e) => {
                    tracing::warn!("Identification attempt {}/{} failed: {}", attempt, self.attempts, e);
                    attempt += 1;
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }
}

/// Fixture file layout:
///
/// ```json
/// {
///   "descriptions": { "large split leaves": "<raw model reply or candidate array>" },
///   "image": [ { "scientificName": "Monstera deliciosa", "confidence": 0.9 } ]
/// }
/// ```
///
/// Reply values may be a JSON string (parsed as raw model text) or JSON.
#[derive(Debug, Default, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    descriptions: HashMap<String, serde_json::Value>,
    #[serde(default)]
    image: Option<serde_json::Value>,
}

/// Serves canned model replies: descriptions by case-insensitive exact text,
/// every image gets the same reply.
#[derive(Debug, Default, Clone)]
pub struct FixtureIdentifier {
    descriptions: HashMap<String, Vec<RawCandidate>>,
    image: Vec<RawCandidate>,
}

impl FixtureIdentifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, text: &str, candidates: Vec<RawCandidate>) -> Self {
        self.descriptions.insert(fixture_key(text), candidates);
        self
    }

    pub fn with_image_reply(mut self, candidates: Vec<RawCandidate>) -> Self {
        self.image = candidates;
        self
    }

    /// Load fixtures from a JSON file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model fixtures: {:?}", path))?;
        let file: FixtureFile = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse model fixtures: {:?}", path))?;

        let mut fixtures = Self::new();
        for (text, reply) in &file.descriptions {
            let candidates = reply_candidates(reply)
                .with_context(|| format!("Invalid fixture reply for description '{}'", text))?;
            fixtures.descriptions.insert(fixture_key(text), candidates);
        }
        if let Some(reply) = &file.image {
            fixtures.image = reply_candidates(reply).context("Invalid fixture reply for image")?;
        }

        tracing::info!(
            "Loaded model fixtures ({} descriptions, {} image candidates)",
            fixtures.descriptions.len(),
            fixtures.image.len()
        );
        Ok(fixtures)
    }
}

fn fixture_key(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn reply_candidates(reply: &serde_json::Value) -> Result<Vec<RawCandidate>, IdentifyError> {
    match reply {
        serde_json::Value::String(text) => parse_model_reply(text),
        other => candidates_from_value(other),
    }
}

#[async_trait]
impl SpeciesIdentifier for FixtureIdentifier {
    async fn identify(&self, input: &IdentificationInput) -> Result<Vec<RawCandidate>, IdentifyError> {
        match input {
            IdentificationInput::Image { .. } => Ok(self.image.clone()),
            IdentificationInput::Description(text) => Ok(self
                .descriptions
                .get(&fixture_key(text))
                .cloned()
                .unwrap_or_default()),
        }
    }
}

/// Stand-in used when no model is configured: every call fails, which the
/// engine turns into an empty result list.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredIdentifier;

#[async_trait]
impl SpeciesIdentifier for UnconfiguredIdentifier {
    async fn identify(&self, _input: &IdentificationInput) -> Result<Vec<RawCandidate>, IdentifyError> {
        Err(IdentifyError::Unavailable("no identification model configured".to_string()))
    }
}
