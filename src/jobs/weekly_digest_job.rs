use chrono::Utc;
use tracing::{info, warn};

use crate::db::{prediction_queries, sent_alert_queries};
use crate::errors::AppError;
use crate::services::digest;
use crate::services::job_scheduler_service::{JobContext, JobResult};

/// Sunday-evening job: per-ticker accuracy summary for the week.
pub async fn run(ctx: JobContext) -> Result<JobResult, AppError> {
    info!("📈 Running weekly digest job");

    let key = format!("weekly_{}", Utc::now().format("%Y%W"));
    if sent_alert_queries::already_sent(&ctx.pool, &key, 100).await? {
        info!("Weekly digest already sent this week, skipping");
        return Ok(JobResult {
            items_processed: 0,
            items_failed: 0,
        });
    }

    let stats = prediction_queries::accuracy_stats(&ctx.pool).await?;
    if stats.is_empty() {
        warn!("No accuracy data yet, skipping weekly digest");
        return Ok(JobResult {
            items_processed: 0,
            items_failed: 0,
        });
    }

    let message = digest::fmt_weekly_digest(&stats, Utc::now());
    ctx.notifier.broadcast(&ctx.pool, &message).await?;
    sent_alert_queries::mark_sent(&ctx.pool, &key, "weekly_digest", None).await?;

    Ok(JobResult {
        items_processed: stats.len() as i32,
        items_failed: 0,
    })
}
