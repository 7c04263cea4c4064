//! Engine and server configuration
//!
//! Configuration comes from environment variables with defaults, the same
//! way the server binary has always been configured (systemd sets them in
//! production). Invalid values are logged and ignored.

use std::time::Duration;

/// Hard cap on similar-plant suggestions
pub const MAX_SIMILAR_PLANTS: usize = 3;

/// Similar plants never report more confidence than this
pub const SIMILAR_CONFIDENCE_CAP: f64 = 0.6;

/// Tunables of the reconciliation engine
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    /// Maximum similar-plant suggestions appended (never above 3)
    pub similar_limit: usize,
    /// Confidence ceiling (and default) for similar-plant suggestions
    pub similar_confidence_cap: f64,
    /// Minimum token overlap for a tier-3 (fuzzy) match
    pub fuzzy_threshold: f64,
    /// How many loosely matching records tier 3 scores per candidate
    pub fuzzy_pool_size: usize,
    /// Bound on one candidate's whole tiered lookup
    pub lookup_timeout: Duration,
    /// Bound on the model call
    pub model_timeout: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            similar_limit: MAX_SIMILAR_PLANTS,
            similar_confidence_cap: SIMILAR_CONFIDENCE_CAP,
            fuzzy_threshold: 0.75,
            fuzzy_pool_size: 25,
            lookup_timeout: Duration::from_millis(2_000),
            model_timeout: Duration::from_millis(20_000),
        }
    }
}

impl ReconcileConfig {
    /// Defaults overlaid with `SIMILAR_LIMIT`, `FUZZY_THRESHOLD`,
    /// `FUZZY_POOL_SIZE`, `LOOKUP_TIMEOUT_MS` and `MODEL_TIMEOUT_MS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(limit) = parse_var::<usize, _>(&lookup, "SIMILAR_LIMIT") {
            if limit > MAX_SIMILAR_PLANTS {
                tracing::warn!("SIMILAR_LIMIT={} above maximum, using {}", limit, MAX_SIMILAR_PLANTS);
            }
            config.similar_limit = limit.min(MAX_SIMILAR_PLANTS);
        }
        if let Some(threshold) = parse_var::<f64, _>(&lookup, "FUZZY_THRESHOLD") {
            if (0.0..=1.0).contains(&threshold) {
                config.fuzzy_threshold = threshold;
            } else {
                tracing::warn!("Ignoring FUZZY_THRESHOLD={} (must be within 0..=1)", threshold);
            }
        }
        if let Some(pool) = parse_var::<usize, _>(&lookup, "FUZZY_POOL_SIZE") {
            config.fuzzy_pool_size = pool.max(1);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "LOOKUP_TIMEOUT_MS") {
            config.lookup_timeout = Duration::from_millis(ms.max(1));
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MODEL_TIMEOUT_MS") {
            config.model_timeout = Duration::from_millis(ms.max(1));
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

/// Server settings read by the `api_server` binary
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// JSON (array of records) or parquet plant catalog
    pub catalog_path: String,
    /// Optional canned model replies (see `FixtureIdentifier`)
    pub model_fixtures: Option<String>,
    pub port: u16,
    pub reconcile: ReconcileConfig,
}

impl ServerConfig {
    /// `CATALOG_PATH`, `MODEL_FIXTURES`, `PORT` plus the engine variables
    pub fn from_env() -> Self {
        let lookup = |key: &str| std::env::var(key).ok();
        Self {
            catalog_path: lookup("CATALOG_PATH").unwrap_or_else(|| "data/catalog.json".to_string()),
            model_fixtures: lookup("MODEL_FIXTURES").filter(|s| !s.trim().is_empty()),
            port: parse_var::<u16, _>(&lookup, "PORT").unwrap_or(3000),
            reconcile: ReconcileConfig::from_lookup(lookup),
        }
    }
}
