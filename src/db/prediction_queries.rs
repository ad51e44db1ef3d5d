use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::info;

use crate::models::{PredictionRecord, TickerAccuracy};

// ==============================================================================
// Prediction History
// ==============================================================================

/// Logs a prediction for later outcome tracking. One row per
/// (ticker, predicted_date); repeats are ignored.
pub async fn log_prediction(
    pool: &PgPool,
    ticker: &str,
    predicted_date: NaiveDate,
    prediction: &str,
    confidence: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO prediction_history (ticker, predicted_date, prediction, confidence)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (ticker, predicted_date) DO NOTHING
        "#,
    )
    .bind(ticker)
    .bind(predicted_date)
    .bind(prediction)
    .bind(confidence)
    .execute(pool)
    .await?;

    info!(
        "Logged prediction: {} {} for {}",
        ticker, prediction, predicted_date
    );
    Ok(())
}

/// Predictions whose outcome is still unknown and whose date has passed.
pub async fn pending_outcomes(
    pool: &PgPool,
    as_of: NaiveDate,
) -> Result<Vec<PredictionRecord>, sqlx::Error> {
    sqlx::query_as::<_, PredictionRecord>(
        r#"
        SELECT id, ticker, predicted_date, prediction, confidence,
               actual_direction, actual_return, correct
        FROM prediction_history
        WHERE actual_direction IS NULL AND predicted_date <= $1
        ORDER BY predicted_date
        "#,
    )
    .bind(as_of)
    .fetch_all(pool)
    .await
}

pub async fn record_outcome(
    pool: &PgPool,
    id: i32,
    actual_direction: &str,
    actual_return: f64,
    correct: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE prediction_history
        SET actual_direction = $2, actual_return = $3, correct = $4
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(actual_direction)
    .bind(actual_return)
    .bind(correct)
    .execute(pool)
    .await?;

    Ok(())
}

/// Per-ticker hit counts over all resolved predictions.
pub async fn accuracy_stats(pool: &PgPool) -> Result<Vec<TickerAccuracy>, sqlx::Error> {
    sqlx::query_as::<_, TickerAccuracy>(
        r#"
        SELECT ticker,
               COUNT(*) AS total,
               COUNT(*) FILTER (WHERE correct) AS correct
        FROM prediction_history
        WHERE correct IS NOT NULL
        GROUP BY ticker
        ORDER BY ticker
        "#,
    )
    .fetch_all(pool)
    .await
}
