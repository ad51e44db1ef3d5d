use tracing::info;

use crate::errors::AppError;
use crate::services::job_scheduler_service::{JobContext, JobResult};
use crate::services::watcher_service;

/// Bi-hourly job: direction flips, sentiment spikes, litigation flags.
pub async fn run(ctx: JobContext) -> Result<JobResult, AppError> {
    info!("⚠️ Running signal watcher job");

    let (processed, failed) = watcher_service::run_all_checks(&ctx).await;

    Ok(JobResult {
        items_processed: processed,
        items_failed: failed,
    })
}
