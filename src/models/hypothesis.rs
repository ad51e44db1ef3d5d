use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::analogy::AnalogyResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HypothesisType {
    PriceTarget,
    Directional,
    EventDriven,
}

/// Structured form of a free-text market hypothesis
/// ("Coca-Cola will reach $90 in 3 months").
#[derive(Debug, Clone, Serialize)]
pub struct ParsedHypothesis {
    pub raw_text: String,
    pub ticker: String,
    pub target_price: Option<f64>,
    pub timeframe_days: i64,
    pub current_price: Option<f64>,
    /// Signed percent implied by target vs current price.
    pub implied_return_pct: Option<f64>,
    pub hypothesis_type: HypothesisType,
    /// True when the implied move sits beyond the z-score threshold of the
    /// historical N-day return distribution.
    pub unrealistic: bool,
    pub historical_std_pct: Option<f64>,
    pub z_score: Option<f64>,
    pub warnings: Vec<String>,
}

/// Empirical frequencies of forward moves over a fixed timeframe.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BaseRates {
    pub total_periods: usize,
    pub timeframe_days: i64,
    pub up_5pct: f64,
    pub up_10pct: f64,
    pub up_20pct: f64,
    pub down_5pct: f64,
    pub either_10pct: f64,
    pub max_gain: f64,
    pub max_loss: f64,
    pub median_return: f64,
    pub mean_return: f64,
    pub implied_return_pct: Option<f64>,
    /// Percent of periods that achieved the implied move.
    pub rate_for_implied: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoricalEvidence {
    pub ticker: String,
    pub timeframe_days: i64,
    pub implied_return_pct: Option<f64>,
    pub base_rates: Option<BaseRates>,
    pub similar_setups: Vec<AnalogyResult>,
    pub verdict: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketContext {
    pub ticker: String,
    pub current_price: Option<f64>,
    pub week52_high: Option<f64>,
    pub week52_low: Option<f64>,
    pub distance_to_high_pct: Option<f64>,
    pub distance_above_low_pct: Option<f64>,
    pub sector: String,
    /// Snapshot of the latest engineered signals, rounded to 4 decimals.
    pub signals: BTreeMap<String, f64>,
}

/// One bull catalyst or bear risk produced by the case agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseItem {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchBrief {
    pub parsed: ParsedHypothesis,
    pub market: MarketContext,
    pub evidence: HistoricalEvidence,
    pub bull_case: Vec<CaseItem>,
    pub bear_case: Vec<CaseItem>,
    pub feasibility_score: u8,
    /// LLM-synthesized brief (free-form JSON), or a deterministic fallback.
    pub brief: serde_json::Value,
}
