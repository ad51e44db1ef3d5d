use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tracing::info;

use crate::config;
use crate::errors::AppError;
use crate::models::{Explanation, ModelInfo, PredictionResponse};
use crate::routes::validate_ticker;
use crate::services::{explainer_service, feature_service, sentiment_service};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:ticker", get(get_prediction))
        .route("/:ticker/explanation", get(get_explanation))
        .route("/:ticker/model-info", get(get_model_info))
        .route("/cache/clear", post(clear_prediction_cache))
}

/// POST /api/predictions/cache/clear
pub async fn clear_prediction_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.prediction_cache.clear();
    info!("Prediction cache cleared");
    Json(json!({
        "success": true,
        "message": "Prediction cache cleared",
    }))
}

/// GET /api/predictions/:ticker
pub async fn get_prediction(
    Path(ticker): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<PredictionResponse>, AppError> {
    let ticker = validate_ticker(&ticker)?;

    if let Some(cached) = state.prediction_cache.get(&ticker) {
        info!("Returning cached prediction for {}", ticker);
        return Ok(Json(cached));
    }

    let response = build_prediction(&state, &ticker).await?;
    state.prediction_cache.insert(&ticker, response.clone());

    Ok(Json(response))
}

/// GET /api/predictions/:ticker/explanation
pub async fn get_explanation(
    Path(ticker): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Explanation>, AppError> {
    let ticker = validate_ticker(&ticker)?;
    info!("Generating explanation for {}", ticker);

    let (frame, _) = feature_service::latest_feature_frame(
        state.price_provider.as_ref(),
        &state.settings.data_root,
        &ticker,
        500,
    )
    .await?;
    let prediction = state.predictor.predict(&ticker, &frame)?;
    let sentiment = sentiment_service::load_latest(&state.settings.data_root, &ticker)?;

    let (query, as_of) = frame
        .last()
        .map(|row| (row.values.clone(), row.date))
        .ok_or_else(|| AppError::Validation(format!("empty feature frame for {}", ticker)))?;

    let explanation = explainer_service::explain_prediction(
        state.llm.as_deref(),
        &state.settings.data_root,
        &ticker,
        &prediction,
        sentiment.lm_sentiment_score,
        sentiment.label(),
        &query,
        as_of,
    )
    .await;

    Ok(Json(explanation))
}

/// GET /api/predictions/:ticker/model-info
pub async fn get_model_info(
    Path(ticker): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ModelInfo>, AppError> {
    let ticker = validate_ticker(&ticker)?;
    Ok(Json(state.predictor.model_info(&ticker)?))
}

async fn build_prediction(
    state: &AppState,
    ticker: &str,
) -> Result<PredictionResponse, AppError> {
    let (frame, _) = feature_service::latest_feature_frame(
        state.price_provider.as_ref(),
        &state.settings.data_root,
        ticker,
        500,
    )
    .await?;
    let prediction = state.predictor.predict(ticker, &frame)?;
    let sentiment = sentiment_service::load_latest(&state.settings.data_root, ticker)?;

    let as_of = frame
        .last()
        .map(|row| row.date)
        .ok_or_else(|| AppError::Validation(format!("empty feature frame for {}", ticker)))?;

    Ok(PredictionResponse {
        ticker: ticker.to_string(),
        name: config::display_name(ticker).to_string(),
        prediction: prediction.direction,
        confidence: prediction.confidence,
        prob_up: prediction.prob_up,
        prob_down: prediction.prob_down,
        predicted_date: as_of + chrono::Duration::days(1),
        as_of_date: as_of,
        top_signals: prediction.top_signals,
        sentiment_score: sentiment.lm_sentiment_score,
        sentiment_label: sentiment.label().to_string(),
        model_accuracy: prediction.cv_accuracy,
    })
}
