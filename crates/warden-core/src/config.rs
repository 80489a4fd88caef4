//! Moderation configuration loaded once at startup.
//!
//! The configuration file is JSON. Cache settings, the full scoring table,
//! and the block threshold are mandatory; anything missing or inconsistent is
//! a fatal [`ConfigError`].

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::scoring::{ScoringTable, ScoringTableConfig, ThresholdPolicy};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "moderation-rules.json";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON or is missing required keys.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// The values are present but unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Cache sizing and freshness.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CacheSettings {
    /// Maximum number of cached classifications.
    pub max_size: usize,
    /// Seconds before a cached classification goes stale.
    pub ttl_seconds: u64,
}

impl CacheSettings {
    /// Returns the TTL as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Input size limits.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ContentLimits {
    /// Maximum accepted content length, in characters.
    pub max_content_chars: usize,
    /// Number of leading characters sent to the classifier.
    pub classifier_max_chars: usize,
    /// Truncate content to this many characters before fingerprinting.
    pub fingerprint_chars: Option<usize>,
}

impl Default for ContentLimits {
    fn default() -> Self {
        Self {
            max_content_chars: 10_000,
            classifier_max_chars: 500,
            fingerprint_chars: None,
        }
    }
}

/// Connection settings for the llama.cpp classifier backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Whether a backend should be used at all.
    pub enabled: bool,
    /// Base URL of the OpenAI-compatible server.
    pub base_url: String,
    /// Model name reported in results and requested from the server.
    pub model: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Token budget for the verdict.
    pub max_tokens: u32,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://127.0.0.1:8080".to_string(),
            model: "phi-3-mini".to_string(),
            timeout_secs: 30,
            max_tokens: 5,
        }
    }
}

impl ClassifierSettings {
    /// Returns the request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    cache_settings: CacheSettings,
    scoring_table: ScoringTableConfig,
    thresholds: ThresholdPolicy,
    #[serde(default)]
    limits: ContentLimits,
    #[serde(default)]
    classifier: ClassifierSettings,
}

/// Validated moderation configuration.
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    pub cache: CacheSettings,
    pub scoring: ScoringTable,
    pub thresholds: ThresholdPolicy,
    pub limits: ContentLimits,
    pub classifier: ClassifierSettings,
}

impl ModerationConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parses and validates configuration from a JSON string.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text)?;

        if raw.cache_settings.max_size == 0 {
            return Err(ConfigError::Invalid(
                "cache_settings.max_size must be at least 1".to_string(),
            ));
        }
        if raw.cache_settings.ttl_seconds == 0 {
            return Err(ConfigError::Invalid(
                "cache_settings.ttl_seconds must be at least 1".to_string(),
            ));
        }
        if raw.limits.max_content_chars == 0 || raw.limits.classifier_max_chars == 0 {
            return Err(ConfigError::Invalid(
                "content limits must be at least 1 character".to_string(),
            ));
        }
        raw.thresholds.validate()?;

        Ok(Self {
            cache: raw.cache_settings,
            scoring: ScoringTable::try_from(raw.scoring_table)?,
            thresholds: raw.thresholds,
            limits: raw.limits,
            classifier: raw.classifier,
        })
    }
}
