use std::collections::BTreeMap;

use crate::config;
use crate::models::{MarketContext, PricePoint};
use crate::services::feature_service::FeatureRow;

/// Trading days in a 52-week window.
const WEEK52_BARS: usize = 252;

/// Signal columns surfaced in the research-brief technical picture.
const CONTEXT_SIGNALS: [&str; 19] = [
    "rsi_14",
    "ma_7",
    "ma_20",
    "ma_50",
    "ma_200",
    "distance_from_ma20",
    "distance_from_ma50",
    "momentum_5d",
    "momentum_10d",
    "volume_ratio_20",
    "volatility_20",
    "lm_sentiment_score",
    "lm_uncertainty_zscore",
    "lm_sentiment_delta",
    "lm_neg_dominant",
    "lm_litigation_spike",
    "market_regime_enc",
    "ma20_above_ma50",
    "volume_surge",
];

/// Assembles the current market picture for a ticker from already-fetched
/// prices and the engineered feature frame: last price, 52-week range, and
/// a rounded signal snapshot from the latest row.
pub fn collect_market_context(
    ticker: &str,
    prices: &[PricePoint],
    frame: &[FeatureRow],
) -> MarketContext {
    let current_price = prices.last().map(|p| p.close);

    let window_start = prices.len().saturating_sub(WEEK52_BARS);
    let window = &prices[window_start..];
    let week52_high = window
        .iter()
        .map(|p| p.high)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));
    let week52_low = window
        .iter()
        .map(|p| p.low)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))));

    let distance_to_high_pct = match (current_price, week52_high) {
        (Some(price), Some(high)) if price != 0.0 => {
            Some(round2((high - price) / price * 100.0))
        }
        _ => None,
    };
    let distance_above_low_pct = match (current_price, week52_low) {
        (Some(price), Some(low)) if low != 0.0 => Some(round2((price - low) / low * 100.0)),
        _ => None,
    };

    let mut signals = BTreeMap::new();
    if let Some(latest) = frame.last() {
        for name in CONTEXT_SIGNALS {
            if let Some(&value) = latest.values.get(name) {
                if !value.is_nan() {
                    signals.insert(name.to_string(), round4(value));
                }
            }
        }
    }

    MarketContext {
        ticker: ticker.to_string(),
        current_price,
        week52_high,
        week52_low,
        distance_to_high_pct,
        distance_above_low_pct,
        sector: config::ticker_meta(ticker)
            .map(|m| m.sector)
            .unwrap_or("Unknown")
            .to_string(),
        signals,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn prices() -> Vec<PricePoint> {
        let start: chrono::NaiveDate = "2025-01-02".parse().unwrap();
        (0..300)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.05);
                PricePoint {
                    date: start + chrono::Duration::days(i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000_000.0,
                }
            })
            .collect()
    }

    fn frame() -> Vec<FeatureRow> {
        vec![FeatureRow {
            date: "2025-10-01".parse().unwrap(),
            values: HashMap::from([
                ("rsi_14".to_string(), 55.12345),
                ("momentum_5d".to_string(), 1.2),
                ("not_a_context_signal".to_string(), 9.9),
            ]),
        }]
    }

    #[test]
    fn test_52_week_range_uses_trailing_window() {
        let ctx = collect_market_context("KO", &prices(), &frame());
        // Rising series: high is the last bar's high, low sits 252 bars back
        assert_eq!(ctx.week52_high, Some(100.0 + 299.0 * 0.05 + 1.0));
        assert_eq!(ctx.week52_low, Some(100.0 + 48.0 * 0.05 - 1.0));
        assert!(ctx.distance_to_high_pct.unwrap() > 0.0);
        assert!(ctx.distance_above_low_pct.unwrap() > 0.0);
    }

    #[test]
    fn test_signals_filtered_and_rounded() {
        let ctx = collect_market_context("KO", &prices(), &frame());
        assert_eq!(ctx.signals.get("rsi_14"), Some(&55.1234));
        assert!(!ctx.signals.contains_key("not_a_context_signal"));
        assert_eq!(ctx.sector, "Consumer Staples");
    }

    #[test]
    fn test_empty_inputs_yield_empty_context() {
        let ctx = collect_market_context("KO", &[], &[]);
        assert_eq!(ctx.current_price, None);
        assert!(ctx.signals.is_empty());
    }
}
