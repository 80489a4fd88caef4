//! Moderation pipeline.
//!
//! ```text
//! request → validate → fingerprint → cache.get ─hit──────────────────────→ outcome
//!                                       └─miss→ classify ─ok→ score → cache.set → outcome
//!                                                   └─unavailable→ degraded outcome (not cached)
//! ```
//!
//! The cache lock is only taken inside `get`/`set`; classification runs with
//! no lock held. Concurrent misses on the same fingerprint each call the
//! classifier and the last write wins.

use std::num::NonZeroUsize;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheStats, ContentFingerprint, FingerprintCache};
use crate::classifier::ContentClassifier;
use crate::config::{ConfigError, ContentLimits, ModerationConfig};
use crate::scoring::{ScoringTable, ThresholdPolicy};

/// Model name reported for cache hits.
pub const CACHE_MODEL: &str = "cache";

/// Model name reported when no classifier answered.
pub const NO_MODEL: &str = "none";

/// Category reported when the classifier is unavailable.
pub const ERROR_CATEGORY: &str = "error";

/// How much the verdict can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Where the content comes from. Informational only; it does not change the
/// fingerprint or the verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Post,
    Chat,
    Comment,
    Profile,
}

/// Result of classifying one piece of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub category: String,
    pub severity: u8,
    pub reason: String,
    pub confidence: Confidence,
    pub model_used: String,
}

impl ClassificationResult {
    /// Degraded result returned when the classifier is unavailable.
    pub fn unavailable() -> Self {
        Self {
            category: ERROR_CATEGORY.to_string(),
            severity: 0,
            reason: "Moderation unavailable".to_string(),
            confidence: Confidence::Low,
            model_used: NO_MODEL.to_string(),
        }
    }

    /// Returns true for degraded results.
    pub fn is_error(&self) -> bool {
        self.category == ERROR_CATEGORY
    }

    fn served_from_cache(&self) -> Self {
        Self {
            model_used: CACHE_MODEL.to_string(),
            ..self.clone()
        }
    }
}

/// Content submitted for moderation.
#[derive(Debug, Clone)]
pub struct ModerationRequest {
    pub content: String,
    pub user_id: Option<String>,
    pub content_type: ContentType,
}

impl ModerationRequest {
    /// Creates a request for a post with no user.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            user_id: None,
            content_type: ContentType::Post,
        }
    }
}

/// Decision returned for a moderation request.
#[derive(Debug, Clone)]
pub struct ModerationOutcome {
    /// The classification. On a cache hit `model_used` is "cache".
    pub result: Arc<ClassificationResult>,
    /// Whether the result was served from the cache.
    pub cache_hit: bool,
    /// Derived from the current threshold policy; never cached.
    pub is_blocked: bool,
}

/// Errors surfaced to callers of [`Moderator::moderate`].
#[derive(Debug, Error)]
pub enum ModerationError {
    /// The request was rejected before any cache or classifier access.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Something unexpected failed inside the pipeline.
    #[error("internal moderation error: {0}")]
    Internal(String),
}

/// Cache-fronted moderation pipeline.
pub struct Moderator {
    cache: FingerprintCache<ClassificationResult>,
    classifier: Arc<dyn ContentClassifier>,
    scoring: ScoringTable,
    policy: ThresholdPolicy,
    limits: ContentLimits,
}

impl std::fmt::Debug for Moderator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Moderator")
            .field("cache", &self.cache)
            .field("classifier", &self.classifier.name())
            .field("scoring_version", &self.scoring.version())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Moderator {
    /// Builds a moderator from validated configuration.
    pub fn new(
        config: &ModerationConfig,
        classifier: Arc<dyn ContentClassifier>,
    ) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(config.cache.max_size).ok_or_else(|| {
            ConfigError::Invalid("cache_settings.max_size must be at least 1".to_string())
        })?;

        Ok(Self {
            cache: FingerprintCache::new(capacity, config.cache.ttl()),
            classifier,
            scoring: config.scoring.clone(),
            policy: config.thresholds,
            limits: config.limits,
        })
    }

    /// Moderates content, consulting the cache before the classifier.
    pub async fn moderate(
        &self,
        request: &ModerationRequest,
    ) -> Result<ModerationOutcome, ModerationError> {
        self.validate(request)?;

        let fingerprint =
            ContentFingerprint::with_limit(&request.content, self.limits.fingerprint_chars);

        if let Some(result) = self.cache.get(&fingerprint) {
            debug!(
                fingerprint = %fingerprint,
                severity = result.severity,
                "Cache hit"
            );
            return Ok(self.outcome(Arc::new(result.served_from_cache()), true));
        }

        debug!(
            fingerprint = %fingerprint,
            content_type = ?request.content_type,
            user_id = ?request.user_id,
            "Cache miss, classifying"
        );

        let verdict = match self
            .classifier
            .classify(&request.content, self.limits.classifier_max_chars)
            .await
        {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(
                    fingerprint = %fingerprint,
                    classifier = self.classifier.name(),
                    "Classifier unavailable: {}",
                    e
                );
                return Ok(self.outcome(Arc::new(ClassificationResult::unavailable()), false));
            }
        };

        let severity = verdict.resolve(&self.policy);
        let entry = self.scoring.lookup(severity);
        let result = Arc::new(ClassificationResult {
            category: entry.category.clone(),
            severity,
            reason: entry.reason.clone(),
            confidence: Confidence::Medium,
            model_used: self.classifier.name().to_string(),
        });

        self.cache.set(fingerprint, Arc::clone(&result));
        Ok(self.outcome(result, false))
    }

    /// Runs [`Moderator::moderate`] on its own task.
    ///
    /// Dropping the returned future does not cancel the classification, so a
    /// caller that disconnects still leaves a populated cache behind.
    pub async fn moderate_detached(
        self: Arc<Self>,
        request: ModerationRequest,
    ) -> Result<ModerationOutcome, ModerationError> {
        tokio::spawn(async move { self.moderate(&request).await })
            .await
            .map_err(|e| ModerationError::Internal(format!("moderation task failed: {}", e)))?
    }

    fn validate(&self, request: &ModerationRequest) -> Result<(), ModerationError> {
        if request.content.is_empty() {
            return Err(ModerationError::InvalidInput(
                "content must not be empty".to_string(),
            ));
        }

        let max = self.limits.max_content_chars;
        if request.content.chars().nth(max).is_some() {
            return Err(ModerationError::InvalidInput(format!(
                "content must be at most {} characters",
                max
            )));
        }
        Ok(())
    }

    fn outcome(&self, result: Arc<ClassificationResult>, cache_hit: bool) -> ModerationOutcome {
        let is_blocked = self.policy.is_blocked(result.severity);
        ModerationOutcome {
            result,
            cache_hit,
            is_blocked,
        }
    }

    /// Returns approximate cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Returns the classifier backing this moderator.
    pub fn classifier(&self) -> &Arc<dyn ContentClassifier> {
        &self.classifier
    }

    /// Returns the scoring table version.
    pub fn scoring_version(&self) -> &str {
        self.scoring.version()
    }
}
