use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::analogy::Direction;

/// One interpreted signal backing a prediction, e.g. RSI = 27.3 "Oversold".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopSignal {
    pub name: String,
    pub value: f64,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub ticker: String,
    pub name: String,
    pub prediction: Direction,
    pub confidence: f64,
    pub prob_up: f64,
    pub prob_down: f64,
    pub predicted_date: NaiveDate,
    pub as_of_date: NaiveDate,
    pub top_signals: Vec<TopSignal>,
    pub sentiment_score: f64,
    pub sentiment_label: String,
    pub model_accuracy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub ticker: String,
    pub name: String,
    pub sector: String,
    pub cv_accuracy: f64,
    pub trained_on: String,
    pub input_features: usize,
    pub model_type: String,
}
