use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::models::AnalogyResult;
use crate::routes::validate_ticker;
use crate::services::analogy_service::{self, AnalogyOptions};
use crate::services::feature_service;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalogyParams {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Temporal exclusion window in days
    #[serde(default = "default_min_days_ago")]
    pub min_days_ago: i64,
}

fn default_top_n() -> usize {
    3
}

fn default_min_days_ago() -> i64 {
    365
}

#[derive(Debug, Serialize)]
pub struct AnalogiesResponse {
    pub ticker: String,
    pub count: usize,
    pub analogies: Vec<AnalogyResult>,
    /// Prompt-ready rendering of the same analogies
    pub formatted: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/:ticker", get(get_analogies))
}

/// GET /api/analogies/:ticker?top_n=3&min_days_ago=365
///
/// Engineers today's feature vector and retrieves the most similar
/// historical trading days with their realized outcomes.
pub async fn get_analogies(
    Path(ticker): Path<String>,
    Query(params): Query<AnalogyParams>,
    State(state): State<AppState>,
) -> Result<Json<AnalogiesResponse>, AppError> {
    let ticker = validate_ticker(&ticker)?;
    if params.top_n == 0 {
        return Err(AppError::Validation("top_n must be at least 1".to_string()));
    }

    info!(
        "Finding analogies for {} (top_n={}, min_days_ago={})",
        ticker, params.top_n, params.min_days_ago
    );

    let (frame, _) = feature_service::latest_feature_frame(
        state.price_provider.as_ref(),
        &state.settings.data_root,
        &ticker,
        500,
    )
    .await?;

    let (query, as_of) = frame
        .last()
        .map(|row| (&row.values, row.date))
        .ok_or_else(|| AppError::Validation(format!("empty feature frame for {}", ticker)))?;

    let opts = AnalogyOptions {
        top_n: params.top_n,
        min_days_ago: params.min_days_ago,
        as_of,
    };
    let analogies =
        analogy_service::find_similar_days(&state.settings.data_root, &ticker, query, &opts)?;

    let formatted = analogy_service::format_analogies(&analogies, &ticker);

    Ok(Json(AnalogiesResponse {
        count: analogies.len(),
        analogies,
        formatted,
        ticker,
    }))
}
