use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Loughran-McDonald sentiment features for one SEC filing, as produced by
/// the external filing-preprocessing pipeline and stored per ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentSnapshot {
    pub date: NaiveDate,
    pub form_type: String,
    pub lm_positive: f64,
    pub lm_negative: f64,
    pub lm_uncertain: f64,
    pub lm_litigious: f64,
    pub lm_constraining: f64,
    pub lm_pos_pct: f64,
    pub lm_neg_pct: f64,
    pub lm_uncertain_pct: f64,
    pub lm_sentiment_score: f64,
    pub lm_sentiment_ma5: f64,
    pub lm_sentiment_ma20: f64,
    pub lm_sentiment_delta: f64,
    pub lm_uncertainty_zscore: f64,
    pub lm_litigation_spike: f64,
    pub lm_neg_dominant: f64,
}

impl SentimentSnapshot {
    /// Name -> value view used to forward-fill sentiment into the
    /// engineered feature frame.
    pub fn feature_map(&self) -> Vec<(&'static str, f64)> {
        vec![
            ("lm_positive", self.lm_positive),
            ("lm_negative", self.lm_negative),
            ("lm_uncertain", self.lm_uncertain),
            ("lm_litigious", self.lm_litigious),
            ("lm_constraining", self.lm_constraining),
            ("lm_pos_pct", self.lm_pos_pct),
            ("lm_neg_pct", self.lm_neg_pct),
            ("lm_uncertain_pct", self.lm_uncertain_pct),
            ("lm_sentiment_score", self.lm_sentiment_score),
            ("lm_sentiment_ma5", self.lm_sentiment_ma5),
            ("lm_sentiment_ma20", self.lm_sentiment_ma20),
            ("lm_sentiment_delta", self.lm_sentiment_delta),
            ("lm_uncertainty_zscore", self.lm_uncertainty_zscore),
            ("lm_litigation_spike", self.lm_litigation_spike),
            ("lm_neg_dominant", self.lm_neg_dominant),
        ]
    }

    pub fn label(&self) -> &'static str {
        if self.lm_sentiment_score > 0.5 {
            "Positive"
        } else if self.lm_sentiment_score < -0.5 {
            "Negative"
        } else {
            "Neutral"
        }
    }
}

/// Compact point for the sentiment-history chart endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentPoint {
    pub date: NaiveDate,
    pub lm_sentiment_score: f64,
    pub lm_neg_pct: f64,
    pub lm_uncertain_pct: f64,
    pub form_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentimentHistoryResponse {
    pub ticker: String,
    pub data: Vec<SentimentPoint>,
}
