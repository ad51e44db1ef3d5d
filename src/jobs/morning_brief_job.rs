use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};

use crate::config;
use crate::db::{prediction_queries, sent_alert_queries};
use crate::errors::AppError;
use crate::services::digest::{self, BriefPrediction};
use crate::services::feature_service;
use crate::services::job_scheduler_service::{JobContext, JobResult};

/// Weekday-open job: predict every supported ticker, log the calls for
/// outcome tracking, and broadcast the morning brief.
pub async fn run(ctx: JobContext) -> Result<JobResult, AppError> {
    info!("🌅 Running morning brief job");

    let key = format!("morning_{}", Utc::now().format("%Y%m%d"));
    if sent_alert_queries::already_sent(&ctx.pool, &key, 20).await? {
        info!("Morning brief already sent today, skipping");
        return Ok(JobResult {
            items_processed: 0,
            items_failed: 0,
        });
    }

    let tickers = config::supported_symbols();
    let fetches = tickers.iter().map(|&ticker| {
        let ctx = ctx.clone();
        async move {
            let result: Result<BriefPrediction, AppError> = async {
                let (frame, _) = feature_service::latest_feature_frame(
                    ctx.price_provider.as_ref(),
                    &ctx.settings.data_root,
                    ticker,
                    500,
                )
                .await?;
                let prediction = ctx.predictor.predict(ticker, &frame)?;

                // Log for the evening outcome backfill
                let as_of = frame.last().map(|r| r.date).unwrap_or_else(|| Utc::now().date_naive());
                let predicted_date = as_of + chrono::Duration::days(1);
                prediction_queries::log_prediction(
                    &ctx.pool,
                    ticker,
                    predicted_date,
                    prediction.direction.as_str(),
                    prediction.confidence,
                )
                .await?;

                Ok(BriefPrediction {
                    ticker: ticker.to_string(),
                    prediction: prediction.direction,
                    confidence: prediction.confidence,
                })
            }
            .await;

            (ticker, result)
        }
    });

    let mut predictions = Vec::new();
    let mut failed = 0;
    for (ticker, result) in join_all(fetches).await {
        match result {
            Ok(prediction) => predictions.push(prediction),
            Err(e) => {
                failed += 1;
                warn!("Could not predict {}: {}", ticker, e);
            }
        }
    }

    if predictions.is_empty() {
        return Ok(JobResult {
            items_processed: 0,
            items_failed: failed,
        });
    }

    let message = digest::fmt_morning_brief(&predictions, Utc::now());
    ctx.notifier.broadcast(&ctx.pool, &message).await?;
    sent_alert_queries::mark_sent(&ctx.pool, &key, "morning_brief", None).await?;

    Ok(JobResult {
        items_processed: predictions.len() as i32,
        items_failed: failed,
    })
}
