//! API route handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use tracing::{debug, info};

use crate::error::{ApiError, Result};
use crate::models::{HealthResponse, ModerateRequest, ModerateResponse};
use crate::state::AppState;

/// GET /health - Report liveness, classifier readiness, and cache counters.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        classifier_loaded: state.moderator.classifier().is_loaded(),
        scoring_version: state.moderator.scoring_version().to_string(),
        cache: state.moderator.cache_stats(),
    })
}

/// POST /moderate - Classify content and return a blocking decision.
pub async fn moderate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ModerateRequest>, JsonRejection>,
) -> Result<Json<ModerateResponse>> {
    let Json(req) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    debug!(
        content_len = req.content.len(),
        content_type = ?req.content_type,
        "Moderating content"
    );

    let start = Instant::now();
    let outcome = Arc::clone(&state.moderator)
        .moderate_detached(req.into())
        .await?;
    let processing_time_ms = round_ms(start.elapsed().as_secs_f64() * 1000.0);

    info!(
        severity = outcome.result.severity,
        category = %outcome.result.category,
        is_blocked = outcome.is_blocked,
        cache_hit = outcome.cache_hit,
        processing_time_ms,
        "Moderation complete"
    );

    Ok(Json(ModerateResponse {
        category: outcome.result.category.clone(),
        severity: outcome.result.severity,
        reason: outcome.result.reason.clone(),
        confidence: outcome.result.confidence,
        is_blocked: outcome.is_blocked,
        model_used: outcome.result.model_used.clone(),
        cache_hit: outcome.cache_hit,
        timestamp: Utc::now(),
        processing_time_ms,
    }))
}

/// Rounds milliseconds to two decimal places.
fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}
