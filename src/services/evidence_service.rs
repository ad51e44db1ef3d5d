use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::models::{BaseRates, HistoricalEvidence};
use crate::services::analogy_service::{self, AnalogyOptions};
use crate::services::dataset;

/// Empirical base rates of forward moves over `timeframe_days`, computed
/// from every overlapping window in the close series.
pub fn compute_base_rates(
    closes: &[f64],
    implied_return_pct: Option<f64>,
    timeframe_days: i64,
) -> Option<BaseRates> {
    let step = timeframe_days as usize;
    if step == 0 || closes.len() <= step {
        return None;
    }

    let forward_returns: Vec<f64> = (0..closes.len() - step)
        .filter(|&i| closes[i] != 0.0)
        .map(|i| (closes[i + step] - closes[i]) / closes[i] * 100.0)
        .collect();

    if forward_returns.is_empty() {
        return None;
    }

    let total = forward_returns.len();
    let rate_up = |threshold: f64| {
        round2(forward_returns.iter().filter(|&&r| r >= threshold).count() as f64 / total as f64 * 100.0)
    };
    let rate_down = |threshold: f64| {
        round2(forward_returns.iter().filter(|&&r| r <= threshold).count() as f64 / total as f64 * 100.0)
    };
    let rate_either = |threshold: f64| {
        round2(
            forward_returns.iter().filter(|&&r| r.abs() >= threshold).count() as f64
                / total as f64
                * 100.0,
        )
    };

    let mut sorted = forward_returns.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = if total % 2 == 0 {
        (sorted[total / 2 - 1] + sorted[total / 2]) / 2.0
    } else {
        sorted[total / 2]
    };

    let rate_for_implied = implied_return_pct.map(|implied| {
        if implied > 0.0 {
            rate_up(implied)
        } else {
            rate_down(implied)
        }
    });

    Some(BaseRates {
        total_periods: total,
        timeframe_days,
        up_5pct: rate_up(5.0),
        up_10pct: rate_up(10.0),
        up_20pct: rate_up(20.0),
        down_5pct: rate_down(-5.0),
        either_10pct: rate_either(10.0),
        max_gain: round2(sorted[total - 1]),
        max_loss: round2(sorted[0]),
        median_return: round2(median),
        mean_return: round2(forward_returns.iter().sum::<f64>() / total as f64),
        implied_return_pct: implied_return_pct.map(round2),
        rate_for_implied,
    })
}

/// Gathers the historical evidence for a hypothesis: base rates over the
/// requested horizon plus similar past setups from the analogy engine.
/// Evidence gathering degrades instead of failing: a missing dataset yields
/// empty base rates, a failed similarity search yields zero setups.
pub fn collect_evidence(
    data_root: &Path,
    ticker: &str,
    implied_return_pct: Option<f64>,
    timeframe_days: i64,
    query: Option<&HashMap<String, f64>>,
    as_of: NaiveDate,
) -> HistoricalEvidence {
    info!(
        "Gathering historical evidence for {} (implied {:?}%, {}d horizon)",
        ticker, implied_return_pct, timeframe_days
    );

    let base_rates = match dataset::load_dataset(data_root, ticker) {
        Ok(ds) => {
            let closes = ds.column_values("close").unwrap_or_default();
            compute_base_rates(&closes, implied_return_pct, timeframe_days)
        }
        Err(e) => {
            warn!("Base rates unavailable for {}: {}", ticker, e);
            None
        }
    };

    let similar_setups = match query {
        Some(query) => {
            match analogy_service::find_similar_days(
                data_root,
                ticker,
                query,
                &AnalogyOptions::new(as_of),
            ) {
                Ok(setups) => setups,
                Err(e) => {
                    warn!("Similarity search failed for {}: {}", ticker, e);
                    Vec::new()
                }
            }
        }
        None => Vec::new(),
    };

    let verdict = base_rates
        .as_ref()
        .and_then(|br| implied_return_pct.map(|implied| verdict_for(br, implied)));

    HistoricalEvidence {
        ticker: ticker.to_string(),
        timeframe_days,
        implied_return_pct,
        base_rates,
        similar_setups,
        verdict,
    }
}

/// Plain-English read of the base-rate table for the implied move.
fn verdict_for(base_rates: &BaseRates, implied_return_pct: f64) -> String {
    let rate = base_rates.rate_for_implied.unwrap_or(0.0);
    let n = base_rates.timeframe_days;

    if implied_return_pct > base_rates.max_gain {
        format!(
            "The implied move of {:+.1}% exceeds the maximum historical {}-day gain of {:+.1}% - \
             this has never happened in {} periods analyzed.",
            implied_return_pct, n, base_rates.max_gain, base_rates.total_periods
        )
    } else if rate < 5.0 {
        format!(
            "Only {}% of historical {}-day windows produced a {:+.1}% move. This is a rare outcome.",
            rate, n, implied_return_pct
        )
    } else if rate < 20.0 {
        format!(
            "{}% of {}-day periods achieved {:+.1}%. Possible but unlikely without a major catalyst.",
            rate, n, implied_return_pct
        )
    } else {
        format!(
            "{}% of {}-day periods achieved {:+.1}%. This move is within the historical range of normal outcomes.",
            rate, n, implied_return_pct
        )
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
