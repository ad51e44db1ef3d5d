use chrono::{Duration, Utc};
use sqlx::PgPool;

use crate::models::SentAlert;

// ==============================================================================
// Alert Deduplication
// ==============================================================================

/// True when an alert with this key was delivered within the cooldown.
pub async fn already_sent(
    pool: &PgPool,
    alert_key: &str,
    cooldown_hours: i64,
) -> Result<bool, sqlx::Error> {
    let cutoff = Utc::now() - Duration::hours(cooldown_hours);

    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        SELECT id FROM sent_alerts
        WHERE alert_key = $1 AND sent_at > $2
        LIMIT 1
        "#,
    )
    .bind(alert_key)
    .bind(cutoff)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

pub async fn mark_sent(
    pool: &PgPool,
    alert_key: &str,
    alert_type: &str,
    ticker: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO sent_alerts (alert_key, alert_type, ticker)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(alert_key)
    .bind(alert_type)
    .bind(ticker)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn recent(pool: &PgPool, hours: i64) -> Result<Vec<SentAlert>, sqlx::Error> {
    let cutoff = Utc::now() - Duration::hours(hours);

    sqlx::query_as::<_, SentAlert>(
        r#"
        SELECT alert_key, alert_type, ticker, sent_at
        FROM sent_alerts
        WHERE sent_at > $1
        ORDER BY sent_at DESC
        "#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await
}
