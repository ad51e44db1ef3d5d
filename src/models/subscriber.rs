use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Telegram alert subscriber. Status is one of
/// `pending` / `approved` / `rejected`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscriber {
    pub id: Uuid,
    pub username: String,
    pub telegram_id: Option<String>,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterSubscriber {
    pub username: String,
    pub telegram_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterOutcome {
    pub id: Uuid,
    pub username: String,
    pub status: String,
    pub message: String,
}

/// Dedup record for an alert already delivered.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SentAlert {
    pub alert_key: String,
    pub alert_type: String,
    pub ticker: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// Logged prediction with its realized outcome once known.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PredictionRecord {
    pub id: i32,
    pub ticker: String,
    pub predicted_date: NaiveDate,
    pub prediction: String,
    pub confidence: f64,
    pub actual_direction: Option<String>,
    pub actual_return: Option<f64>,
    pub correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TickerAccuracy {
    pub ticker: String,
    pub total: i64,
    pub correct: i64,
}

impl TickerAccuracy {
    pub fn accuracy_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.correct as f64 / self.total as f64 * 1000.0).round() / 10.0
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccuracyStatsResponse {
    pub per_ticker: Vec<TickerAccuracyView>,
    pub total: i64,
    pub correct: i64,
    pub overall_accuracy_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickerAccuracyView {
    pub ticker: String,
    pub total: i64,
    pub correct: i64,
    pub accuracy_pct: f64,
}
