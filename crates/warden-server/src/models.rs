//! API request and response models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{CacheStats, Confidence, ContentType, ModerationRequest};

/// Request body for POST /moderate.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerateRequest {
    /// Text to moderate (1..=10000 characters).
    pub content: String,
    /// Optional id of the author.
    #[serde(default, alias = "user_id")]
    pub user_id: Option<String>,
    /// Where the content is posted (default: post).
    #[serde(default, alias = "content_type")]
    pub content_type: ContentType,
}

impl From<ModerateRequest> for ModerationRequest {
    fn from(req: ModerateRequest) -> Self {
        Self {
            content: req.content,
            user_id: req.user_id,
            content_type: req.content_type,
        }
    }
}

/// Response body for POST /moderate.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerateResponse {
    pub category: String,
    pub severity: u8,
    pub reason: String,
    pub confidence: Confidence,
    pub is_blocked: bool,
    pub model_used: String,
    pub cache_hit: bool,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: f64,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub classifier_loaded: bool,
    pub scoring_version: String,
    pub cache: CacheStats,
}
