use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::{SentimentHistoryResponse, SentimentSnapshot};
use crate::routes::validate_ticker;
use crate::services::sentiment_service;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SentimentHistoryParams {
    /// Number of filings to return (default: 50)
    #[serde(default = "default_points")]
    pub n: usize,
}

fn default_points() -> usize {
    50
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:ticker/history", get(get_sentiment_history))
        .route("/:ticker/latest", get(get_latest_sentiment))
}

/// GET /api/sentiment/:ticker/history?n=50
pub async fn get_sentiment_history(
    Path(ticker): Path<String>,
    Query(params): Query<SentimentHistoryParams>,
    State(state): State<AppState>,
) -> Result<Json<SentimentHistoryResponse>, AppError> {
    let ticker = validate_ticker(&ticker)?;
    info!("Fetching sentiment history for {} (n={})", ticker, params.n);

    let data = sentiment_service::load_history(&state.settings.data_root, &ticker, params.n)?;

    Ok(Json(SentimentHistoryResponse { ticker, data }))
}

/// GET /api/sentiment/:ticker/latest
pub async fn get_latest_sentiment(
    Path(ticker): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SentimentSnapshot>, AppError> {
    let ticker = validate_ticker(&ticker)?;
    let snapshot = sentiment_service::load_latest(&state.settings.data_root, &ticker)?;
    Ok(Json(snapshot))
}
