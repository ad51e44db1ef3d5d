use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config;
use crate::db::sent_alert_queries;
use crate::errors::AppError;
use crate::models::Direction;
use crate::services::job_scheduler_service::JobContext;
use crate::services::{digest, feature_service, sentiment_service};

/// Sentiment z-scores beyond this trigger a spike alert.
const SENTIMENT_ZSCORE_THRESHOLD: f64 = 2.0;

/// Last prediction seen per ticker, for flip detection. Lives for the
/// process lifetime inside the job context.
#[derive(Default)]
pub struct WatcherState {
    last_predictions: Mutex<HashMap<String, Direction>>,
}

impl WatcherState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the latest prediction and returns the previous one.
    pub fn swap_prediction(&self, ticker: &str, prediction: Direction) -> Option<Direction> {
        self.last_predictions
            .lock()
            .insert(ticker.to_string(), prediction)
    }
}

/// Runs every signal check for every supported ticker.
/// Returns (processed, failed).
pub async fn run_all_checks(ctx: &JobContext) -> (i32, i32) {
    info!("Running signal checks at {}", Utc::now());
    let mut processed = 0;
    let mut failed = 0;

    for ticker in config::supported_symbols() {
        for result in [
            check_direction_flip(ctx, ticker).await,
            check_sentiment_spike(ctx, ticker).await,
            check_litigation_spike(ctx, ticker).await,
        ] {
            match result {
                Ok(()) => processed += 1,
                Err(e) => {
                    failed += 1;
                    warn!("Signal check failed for {}: {}", ticker, e);
                }
            }
        }
    }

    (processed, failed)
}

/// Alerts when the model flipped direction since the last check.
async fn check_direction_flip(ctx: &JobContext, ticker: &str) -> Result<(), AppError> {
    let (frame, _) = feature_service::latest_feature_frame(
        ctx.price_provider.as_ref(),
        &ctx.settings.data_root,
        ticker,
        500,
    )
    .await?;
    let prediction = ctx.predictor.predict(ticker, &frame)?;

    let previous = ctx.watcher.swap_prediction(ticker, prediction.direction);

    if let Some(previous) = previous {
        if previous != prediction.direction {
            let key = format!("flip_{}_{}", ticker, Utc::now().format("%Y%m%d"));
            if !sent_alert_queries::already_sent(&ctx.pool, &key, 12).await? {
                let message = digest::fmt_direction_flip(
                    ticker,
                    previous,
                    prediction.direction,
                    prediction.confidence,
                );
                ctx.notifier.broadcast(&ctx.pool, &message).await?;
                sent_alert_queries::mark_sent(&ctx.pool, &key, "direction_flip", Some(ticker))
                    .await?;
                info!("Direction flip alert sent for {}", ticker);
            }
        }
    }

    Ok(())
}

/// Alerts when the latest filing's uncertainty language spiked beyond the
/// z-score threshold.
async fn check_sentiment_spike(ctx: &JobContext, ticker: &str) -> Result<(), AppError> {
    let sentiment = sentiment_service::load_latest(&ctx.settings.data_root, ticker)?;

    if sentiment.lm_uncertainty_zscore.abs() > SENTIMENT_ZSCORE_THRESHOLD {
        let key = format!("sent_spike_{}_{}", ticker, Utc::now().format("%Y%m%d"));
        if !sent_alert_queries::already_sent(&ctx.pool, &key, 24).await? {
            let message = digest::fmt_sentiment_spike(
                ticker,
                sentiment.lm_sentiment_score,
                sentiment.lm_uncertainty_zscore,
            );
            ctx.notifier.broadcast(&ctx.pool, &message).await?;
            sent_alert_queries::mark_sent(&ctx.pool, &key, "sentiment_spike", Some(ticker)).await?;
            info!("Sentiment spike alert sent for {}", ticker);
        }
    }

    Ok(())
}

/// Alerts when litigation language spiked in the latest filing.
async fn check_litigation_spike(ctx: &JobContext, ticker: &str) -> Result<(), AppError> {
    let sentiment = sentiment_service::load_latest(&ctx.settings.data_root, ticker)?;

    if sentiment.lm_litigation_spike == 1.0 {
        let key = format!("litigation_{}_{}", ticker, Utc::now().format("%Y%m%d"));
        if !sent_alert_queries::already_sent(&ctx.pool, &key, 48).await? {
            let message = digest::fmt_litigation_spike(ticker);
            ctx.notifier.broadcast(&ctx.pool, &message).await?;
            sent_alert_queries::mark_sent(&ctx.pool, &key, "litigation_spike", Some(ticker)).await?;
            info!("Litigation spike alert sent for {}", ticker);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_prediction_returns_previous() {
        let state = WatcherState::new();
        assert_eq!(state.swap_prediction("KO", Direction::Up), None);
        assert_eq!(state.swap_prediction("KO", Direction::Down), Some(Direction::Up));
        assert_eq!(state.swap_prediction("KO", Direction::Down), Some(Direction::Down));
    }
}
