//! Data model shared by the reconciliation pipeline
//!
//! - `RawCandidate`: a model guess as it arrives from the model boundary
//! - `Candidate`: a normalized guess ready for matching
//! - `CatalogRecord`: an authoritative catalog entry (read-only)
//! - `EnrichedResult`: the unit returned to callers

use serde::{Deserialize, Serialize};

use crate::error::RequestError;

/// One species guess as produced by the model capability.
///
/// Every field is optional because model output is untrusted; the
/// normalizer decides what survives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawCandidate {
    pub name: Option<String>,
    pub scientific_name: Option<String>,
    pub confidence: Option<f64>,
    pub description: Option<String>,
    pub care_instructions: Option<String>,
    pub common_names: Vec<String>,
}

/// A normalized candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Position in the model's original candidate list
    pub index: usize,
    pub name: String,
    /// Display form, original casing
    pub scientific_name: String,
    /// Case-folded, whitespace-collapsed form used for matching
    pub match_key: String,
    pub confidence: f64,
    pub description: String,
    pub care_instructions: Option<String>,
    pub common_names: Vec<String>,
}

/// A canonical plant catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub id: String,
    pub scientific_name: String,
    #[serde(default)]
    pub common_names: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
}

/// A catalog record returned by a relatedness query, with an optional
/// relevance score supplied by the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedRecord {
    pub record: CatalogRecord,
    pub relevance: Option<f64>,
}

/// Final result unit, flattened for transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedResult {
    pub id: String,
    pub name: String,
    pub scientific_name: String,
    pub common_names: Vec<String>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub care_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    pub confidence: f64,
    pub database_match: bool,
    pub is_similar_plant: bool,
}

/// What the model capability is asked to identify
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentificationInput {
    Image {
        /// Base64 payload with any `data:` URL prefix removed
        data: String,
        mime_type: Option<String>,
    },
    Description(String),
}

impl IdentificationInput {
    pub fn kind(&self) -> &'static str {
        match self {
            IdentificationInput::Image { .. } => "image",
            IdentificationInput::Description(_) => "description",
        }
    }
}

/// Identification request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub image: Option<String>,
    pub description: Option<String>,
}

impl IdentifyRequest {
    /// Validate the request shape and convert it to model input
    pub fn into_input(self) -> Result<IdentificationInput, RequestError> {
        let image = self.image.filter(|s| !s.trim().is_empty());
        let description = self
            .description
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if image.is_none() && description.is_none() {
            return Err(RequestError::MissingInput);
        }

        match self.kind.trim() {
            "image" => {
                let raw = image.ok_or(RequestError::MissingField("image"))?;
                let (data, mime_type) = split_data_url(raw.trim());
                Ok(IdentificationInput::Image { data, mime_type })
            }
            "description" => description
                .map(IdentificationInput::Description)
                .ok_or(RequestError::MissingField("description")),
            other => Err(RequestError::InvalidType(other.to_string())),
        }
    }
}

/// Split `data:image/jpeg;base64,AAAA` into payload and mime type
fn split_data_url(raw: &str) -> (String, Option<String>) {
    if let Some(rest) = raw.strip_prefix("data:") {
        if let Some((meta, payload)) = rest.split_once(',') {
            let mime = meta.split(';').next().unwrap_or("").trim();
            let mime = (!mime.is_empty()).then(|| mime.to_string());
            return (payload.to_string(), mime);
        }
    }
    (raw.to_string(), None)
}

/// Identification response body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentifyResponse {
    pub results: Vec<EnrichedResult>,
}

/// Body of a reconcile-only request (caller already has model output)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileRequest {
    pub candidates: Vec<serde_json::Value>,
}
