use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::ResearchBrief;
use crate::services::synthesizer_service::{self, CaseSide};
use crate::services::{
    evidence_service, feature_service, hypothesis_service, market_context_service,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HypothesisRequest {
    pub text: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(evaluate_hypothesis))
}

/// POST /api/hypothesis
///
/// Full research-brief pipeline: parse the free-text hypothesis, collect
/// the market picture and historical evidence, gather bull/bear cases, and
/// synthesize the brief.
pub async fn evaluate_hypothesis(
    State(state): State<AppState>,
    Json(request): Json<HypothesisRequest>,
) -> Result<Json<ResearchBrief>, AppError> {
    info!("Evaluating hypothesis: {:?}", request.text);

    // A ticker is required before anything else can run
    let probe = hypothesis_service::extract_ticker(&request.text).ok_or_else(|| {
        AppError::Validation(format!(
            "Could not identify a supported ticker. Supported: {}",
            crate::config::supported_symbols().join(", ")
        ))
    })?;

    // Feature frame + prices feed the market context, the realism check's
    // companion signals, and the analogy query. Failures degrade: the
    // brief is still assembled from whatever evidence is available.
    let (frame, prices) = match feature_service::latest_feature_frame(
        state.price_provider.as_ref(),
        &state.settings.data_root,
        probe,
        500,
    )
    .await
    {
        Ok((frame, prices)) => (frame, prices),
        Err(e) => {
            warn!("Feature pipeline unavailable for {}: {}", probe, e);
            (Vec::new(), Vec::new())
        }
    };

    let current_price = prices.last().map(|p| p.close);
    let parsed =
        hypothesis_service::parse_hypothesis(&state.settings.data_root, &request.text, current_price)?;
    let ticker = parsed.ticker.clone();

    let market = market_context_service::collect_market_context(&ticker, &prices, &frame);

    let evidence = evidence_service::collect_evidence(
        &state.settings.data_root,
        &ticker,
        parsed.implied_return_pct,
        parsed.timeframe_days,
        feature_service::query_vector(&frame),
        Utc::now().date_naive(),
    );

    let llm = state.llm.as_deref();
    let (bull_case, bear_case) = tokio::join!(
        synthesizer_service::collect_case(llm, &ticker, CaseSide::Bull),
        synthesizer_service::collect_case(llm, &ticker, CaseSide::Bear),
    );

    let brief =
        synthesizer_service::synthesize(llm, parsed, market, evidence, bull_case, bear_case).await;

    Ok(Json(brief))
}
