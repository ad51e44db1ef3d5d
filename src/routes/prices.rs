use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::{PriceHistoryResponse, PricePoint};
use crate::routes::validate_ticker;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PriceHistoryParams {
    /// Calendar days of history to fetch (default: 100)
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    100
}

pub fn router() -> Router<AppState> {
    Router::new().route("/:ticker/history", get(get_price_history))
}

/// GET /api/prices/:ticker/history?days=100
pub async fn get_price_history(
    Path(ticker): Path<String>,
    Query(params): Query<PriceHistoryParams>,
    State(state): State<AppState>,
) -> Result<Json<PriceHistoryResponse>, AppError> {
    let ticker = validate_ticker(&ticker)?;
    info!("Fetching {} days of prices for {}", params.days, ticker);

    let history = state
        .price_provider
        .fetch_daily_history(&ticker, params.days)
        .await?;

    // Serve at most the trailing 90 bars, rounded for display
    let skip = history.len().saturating_sub(90);
    let data = history
        .into_iter()
        .skip(skip)
        .map(|p| PricePoint {
            date: p.date,
            open: round2(p.open),
            high: round2(p.high),
            low: round2(p.low),
            close: round2(p.close),
            volume: p.volume.round(),
        })
        .collect();

    Ok(Json(PriceHistoryResponse { ticker, data }))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
