use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::db::{prediction_queries, sent_alert_queries, subscriber_queries};
use crate::errors::AppError;
use crate::models::{
    AccuracyStatsResponse, RegisterOutcome, RegisterSubscriber, SentAlert, Subscriber,
    TickerAccuracyView,
};
use crate::routes::auth::AdminClaims;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register).get(list_subscribers))
        .route("/:id/approve", post(approve_subscriber))
        .route("/:id/reject", post(reject_subscriber))
        .route("/accuracy", get(accuracy_stats))
        .route("/alerts", get(recent_alerts))
}

/// POST /api/subscribers
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterSubscriber>,
) -> Result<Json<RegisterOutcome>, AppError> {
    if request.username.trim().is_empty() {
        return Err(AppError::Validation("username is required".to_string()));
    }

    let outcome = subscriber_queries::register(
        &state.pool,
        request.username.trim(),
        request.telegram_id.as_deref(),
    )
    .await?;

    info!(
        "Subscriber registration: {} -> {}",
        outcome.username, outcome.status
    );
    Ok(Json(outcome))
}

/// GET /api/subscribers (admin)
pub async fn list_subscribers(
    AdminClaims(claims): AdminClaims,
    State(state): State<AppState>,
) -> Result<Json<Vec<Subscriber>>, AppError> {
    info!("Admin {} listing subscribers", claims.sub);
    Ok(Json(subscriber_queries::get_all(&state.pool).await?))
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub telegram_id: String,
}

/// POST /api/subscribers/:id/approve (admin)
pub async fn approve_subscriber(
    AdminClaims(claims): AdminClaims,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<Subscriber>, AppError> {
    info!("Admin {} approving subscriber {}", claims.sub, id);

    subscriber_queries::approve(&state.pool, id, &request.telegram_id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// POST /api/subscribers/:id/reject (admin)
pub async fn reject_subscriber(
    AdminClaims(claims): AdminClaims,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Subscriber>, AppError> {
    info!("Admin {} rejecting subscriber {}", claims.sub, id);

    subscriber_queries::reject(&state.pool, id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// GET /api/subscribers/alerts (admin)
///
/// Alerts delivered in the last 24 hours.
pub async fn recent_alerts(
    AdminClaims(claims): AdminClaims,
    State(state): State<AppState>,
) -> Result<Json<Vec<SentAlert>>, AppError> {
    info!("Admin {} listing recent alerts", claims.sub);
    Ok(Json(sent_alert_queries::recent(&state.pool, 24).await?))
}

/// GET /api/subscribers/accuracy
pub async fn accuracy_stats(
    State(state): State<AppState>,
) -> Result<Json<AccuracyStatsResponse>, AppError> {
    let stats = prediction_queries::accuracy_stats(&state.pool).await?;

    let total: i64 = stats.iter().map(|s| s.total).sum();
    let correct: i64 = stats.iter().map(|s| s.correct).sum();
    let overall = if total > 0 {
        (correct as f64 / total as f64 * 1000.0).round() / 10.0
    } else {
        0.0
    };

    let per_ticker = stats
        .into_iter()
        .map(|s| TickerAccuracyView {
            accuracy_pct: s.accuracy_pct(),
            ticker: s.ticker,
            total: s.total,
            correct: s.correct,
        })
        .collect();

    Ok(Json(AccuracyStatsResponse {
        per_ticker,
        total,
        correct,
        overall_accuracy_pct: overall,
    }))
}
