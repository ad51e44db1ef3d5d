use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One OHLCV bar as served by the price-history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceHistoryResponse {
    pub ticker: String,
    pub data: Vec<PricePoint>,
}
