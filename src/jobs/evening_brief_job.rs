use chrono::Utc;
use tracing::{info, warn};

use crate::db::{prediction_queries, sent_alert_queries};
use crate::errors::AppError;
use crate::models::Direction;
use crate::services::digest::{self, OutcomeLine};
use crate::services::job_scheduler_service::{JobContext, JobResult};

/// After-close job: fill in realized outcomes for logged predictions and
/// broadcast the evening scorecard.
pub async fn run(ctx: JobContext) -> Result<JobResult, AppError> {
    info!("🌆 Running evening brief job");

    let key = format!("evening_{}", Utc::now().format("%Y%m%d"));
    if sent_alert_queries::already_sent(&ctx.pool, &key, 20).await? {
        info!("Evening brief already sent today, skipping");
        return Ok(JobResult {
            items_processed: 0,
            items_failed: 0,
        });
    }

    let today = Utc::now().date_naive();
    let pending = prediction_queries::pending_outcomes(&ctx.pool, today).await?;
    info!("{} predictions awaiting outcomes", pending.len());

    let mut outcomes = Vec::new();
    let mut failed = 0;

    for record in pending {
        match backfill_outcome(&ctx, &record).await {
            Ok(Some(outcome)) => outcomes.push(outcome),
            Ok(None) => {} // market data not available yet
            Err(e) => {
                failed += 1;
                warn!("Outcome backfill failed for {}: {}", record.ticker, e);
            }
        }
    }

    if outcomes.is_empty() {
        info!("No outcomes to report yet");
        return Ok(JobResult {
            items_processed: 0,
            items_failed: failed,
        });
    }

    let stats = prediction_queries::accuracy_stats(&ctx.pool).await?;
    let total: i64 = stats.iter().map(|s| s.total).sum();
    let correct: i64 = stats.iter().map(|s| s.correct).sum();

    let message = digest::fmt_evening_brief(&outcomes, total, correct, Utc::now());
    ctx.notifier.broadcast(&ctx.pool, &message).await?;
    sent_alert_queries::mark_sent(&ctx.pool, &key, "evening_brief", None).await?;

    Ok(JobResult {
        items_processed: outcomes.len() as i32,
        items_failed: failed,
    })
}

/// Computes the realized next-day move for one logged prediction. Returns
/// None when the predicted date's bar has not been published yet.
async fn backfill_outcome(
    ctx: &JobContext,
    record: &crate::models::PredictionRecord,
) -> Result<Option<OutcomeLine>, AppError> {
    let history = ctx
        .price_provider
        .fetch_daily_history(&record.ticker, 15)
        .await?;

    let Some(idx) = history.iter().position(|p| p.date >= record.predicted_date) else {
        return Ok(None);
    };
    if idx == 0 {
        return Ok(None);
    }

    let prev_close = history[idx - 1].close;
    if prev_close == 0.0 {
        return Ok(None);
    }

    let actual_return = (history[idx].close - prev_close) / prev_close * 100.0;
    let actual_direction = Direction::from_return(actual_return);
    let correct = record.prediction == actual_direction.as_str();

    prediction_queries::record_outcome(
        &ctx.pool,
        record.id,
        actual_direction.as_str(),
        (actual_return * 10_000.0).round() / 10_000.0,
        correct,
    )
    .await?;

    info!(
        "Outcome: {} predicted={} actual={} correct={}",
        record.ticker, record.prediction, actual_direction, correct
    );

    Ok(Some(OutcomeLine {
        ticker: record.ticker.clone(),
        prediction: record.prediction.clone(),
        actual_direction: actual_direction.as_str().to_string(),
        actual_return,
    }))
}
