use std::collections::HashMap;
use std::path::Path;

use chrono::{Datelike, NaiveDate};

use crate::errors::AppError;
use crate::external::price_provider::PriceProvider;
use crate::models::{PricePoint, SentimentSnapshot};
use crate::services::{indicators, sentiment_service};

/// One engineered trading day, ready for model inference or similarity
/// search. `values` holds every engineered column by name.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub values: HashMap<String, f64>,
}

/// Fetches recent prices and engineers the full feature frame with the
/// latest filing sentiment folded in. The last row is the similarity-search
/// query vector and the classifier input.
pub async fn latest_feature_frame(
    provider: &dyn PriceProvider,
    data_root: &Path,
    ticker: &str,
    days: u32,
) -> Result<(Vec<FeatureRow>, Vec<PricePoint>), AppError> {
    let raw = provider.fetch_daily_history(ticker, days).await?;
    let prices: Vec<PricePoint> = raw
        .into_iter()
        .map(|p| PricePoint {
            date: p.date,
            open: p.open,
            high: p.high,
            low: p.low,
            close: p.close,
            volume: p.volume,
        })
        .collect();

    if prices.is_empty() {
        return Err(AppError::External(format!("no price data for {}", ticker)));
    }

    let sentiment = sentiment_service::load_latest(data_root, ticker)?;
    let frame = engineer_features(&prices, &sentiment);

    if frame.is_empty() {
        return Err(AppError::Validation(format!(
            "insufficient price history to engineer features for {} ({} bars)",
            ticker,
            prices.len()
        )));
    }

    Ok((frame, prices))
}

pub fn query_vector(frame: &[FeatureRow]) -> Option<&HashMap<String, f64>> {
    frame.last().map(|row| &row.values)
}

/// Replicates the training pipeline's feature engineering over a price
/// series, with the latest filing sentiment forward-filled across all rows.
/// Rows with any incomplete window column are dropped, so the first usable
/// row appears once the 200-day moving average exists.
pub fn engineer_features(prices: &[PricePoint], sentiment: &SentimentSnapshot) -> Vec<FeatureRow> {
    let n = prices.len();
    if n == 0 {
        return Vec::new();
    }

    let closes: Vec<f64> = prices.iter().map(|p| p.close).collect();
    let opens: Vec<f64> = prices.iter().map(|p| p.open).collect();
    let volumes: Vec<f64> = prices.iter().map(|p| p.volume).collect();

    let daily_return = indicators::pct_change(&closes, 1);

    let mut gap_pct: Vec<Option<f64>> = vec![None; n];
    for i in 1..n {
        let prev_close = closes[i - 1];
        if prev_close != 0.0 {
            gap_pct[i] = Some((opens[i] - prev_close) / prev_close * 100.0);
        }
    }

    let ma_7 = indicators::sma(&closes, 7);
    let ma_20 = indicators::sma(&closes, 20);
    let ma_50 = indicators::sma(&closes, 50);
    let ma_200 = indicators::sma(&closes, 200);

    let volatility_20 = rolling_std_opt(&daily_return, 20);
    let volatility_30 = rolling_std_opt(&daily_return, 30);

    let (avg_volume_20, volume_ratio_20) = indicators::volume_trend(&volumes, 20);

    let momentum_5d = indicators::pct_change(&closes, 5);
    let momentum_10d = indicators::pct_change(&closes, 10);

    let distance_from = |ma: &[Option<f64>]| -> Vec<Option<f64>> {
        (0..n)
            .map(|i| ma[i].and_then(|m| if m != 0.0 { Some((closes[i] - m) / m * 100.0) } else { None }))
            .collect()
    };
    let distance_from_ma20 = distance_from(&ma_20);
    let distance_from_ma50 = distance_from(&ma_50);

    let (_, upper_band_20, lower_band_20) = indicators::bollinger_bands(&closes, 20, 2.0);

    let rsi_14 = indicators::rsi(&closes, 14);

    // Sentiment is forward-filled from the latest filing: one scalar per
    // column across all rows, lags included.
    let sentiment_features = sentiment.feature_map();
    let score_series = vec![sentiment.lm_sentiment_score; n];
    let lm_sentiment_lag1 = indicators::lag(&score_series, 1);
    let lm_sentiment_lag5 = indicators::lag(&score_series, 5);
    let lm_sentiment_lag10 = indicators::lag(&score_series, 10);
    let neg_series = vec![sentiment.lm_neg_pct; n];
    let lm_neg_pct_lag1 = indicators::lag(&neg_series, 1);
    let unc_series = vec![sentiment.lm_uncertain_pct; n];
    let lm_uncertain_lag1 = indicators::lag(&unc_series, 1);

    let return_lag1 = lag_opt(&daily_return, 1);
    let return_lag2 = lag_opt(&daily_return, 2);
    let return_lag3 = lag_opt(&daily_return, 3);
    let return_lag5 = lag_opt(&daily_return, 5);

    let vol20_baseline = indicators::sma_opt(&volatility_20, 60);

    let sent_x_vol: Vec<Option<f64>> = volatility_20
        .iter()
        .map(|v| v.map(|vol| sentiment.lm_sentiment_score * vol))
        .collect();

    // Columns whose absence drops the row (incomplete windows).
    let gated: Vec<(&str, &[Option<f64>])> = vec![
        ("daily_return", &daily_return),
        ("gap_pct", &gap_pct),
        ("ma_7", &ma_7),
        ("ma_20", &ma_20),
        ("ma_50", &ma_50),
        ("ma_200", &ma_200),
        ("volatility_20", &volatility_20),
        ("volatility_30", &volatility_30),
        ("avg_volume_20", &avg_volume_20),
        ("volume_ratio_20", &volume_ratio_20),
        ("momentum_5d", &momentum_5d),
        ("momentum_10d", &momentum_10d),
        ("distance_from_ma20", &distance_from_ma20),
        ("distance_from_ma50", &distance_from_ma50),
        ("upper_band_20", &upper_band_20),
        ("lower_band_20", &lower_band_20),
        ("rsi_14", &rsi_14),
        ("lm_sentiment_lag1", &lm_sentiment_lag1),
        ("lm_sentiment_lag5", &lm_sentiment_lag5),
        ("lm_sentiment_lag10", &lm_sentiment_lag10),
        ("lm_neg_pct_lag1", &lm_neg_pct_lag1),
        ("lm_uncertain_lag1", &lm_uncertain_lag1),
        ("return_lag1", &return_lag1),
        ("return_lag2", &return_lag2),
        ("return_lag3", &return_lag3),
        ("return_lag5", &return_lag5),
        ("sent_x_vol", &sent_x_vol),
    ];

    let close_lag1 = indicators::lag(&closes, 1);
    let close_lag5 = indicators::lag(&closes, 5);
    let close_lag10 = indicators::lag(&closes, 10);
    let close_lags: Vec<(&str, &[Option<f64>])> = vec![
        ("close_lag1", &close_lag1),
        ("close_lag5", &close_lag5),
        ("close_lag10", &close_lag10),
    ];

    let mut rows = Vec::new();
    'days: for i in 0..n {
        let mut values: HashMap<String, f64> = HashMap::new();

        for (name, series) in gated.iter().chain(close_lags.iter()) {
            match series[i] {
                Some(v) => {
                    values.insert((*name).to_string(), v);
                }
                None => continue 'days,
            }
        }

        let p = &prices[i];
        values.insert("open".to_string(), p.open);
        values.insert("high".to_string(), p.high);
        values.insert("low".to_string(), p.low);
        values.insert("close".to_string(), p.close);
        values.insert("volume".to_string(), p.volume);

        values.insert(
            "market_regime_enc".to_string(),
            flag(ma_200[i].map(|m| closes[i] > m)),
        );

        values.insert(
            "day_of_week".to_string(),
            p.date.weekday().num_days_from_monday() as f64,
        );
        values.insert("month".to_string(), p.date.month() as f64);
        values.insert("quarter".to_string(), ((p.date.month() - 1) / 3 + 1) as f64);

        for (name, value) in &sentiment_features {
            values.insert((*name).to_string(), *value);
        }

        values.insert(
            "vol_regime".to_string(),
            flag(match (volatility_20[i], vol20_baseline[i]) {
                (Some(v), Some(base)) => Some(v > base),
                _ => None,
            }),
        );
        values.insert("rsi_oversold".to_string(), flag(rsi_14[i].map(|r| r < 30.0)));
        values.insert(
            "rsi_overbought".to_string(),
            flag(rsi_14[i].map(|r| r > 70.0)),
        );
        values.insert(
            "ma7_above_ma20".to_string(),
            flag(match (ma_7[i], ma_20[i]) {
                (Some(a), Some(b)) => Some(a > b),
                _ => None,
            }),
        );
        values.insert(
            "ma20_above_ma50".to_string(),
            flag(match (ma_20[i], ma_50[i]) {
                (Some(a), Some(b)) => Some(a > b),
                _ => None,
            }),
        );
        values.insert(
            "volume_surge".to_string(),
            flag(volume_ratio_20[i].map(|r| r > 1.5)),
        );

        values.insert(
            "sent_x_unc".to_string(),
            sentiment.lm_sentiment_score * sentiment.lm_uncertain_pct,
        );

        rows.push(FeatureRow {
            date: p.date,
            values,
        });
    }

    rows
}

fn flag(condition: Option<bool>) -> f64 {
    // Missing inputs compare as false, matching the training pipeline
    if condition.unwrap_or(false) {
        1.0
    } else {
        0.0
    }
}

fn lag_opt(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for i in period..values.len() {
        out[i] = values[i - period];
    }
    out
}

fn rolling_std_opt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window < 2 {
        return out;
    }
    for i in 0..values.len() {
        if i + 1 >= window {
            let slice = &values[i + 1 - window..=i];
            if slice.iter().all(|v| v.is_some()) {
                let vals: Vec<f64> = slice.iter().map(|v| v.unwrap()).collect();
                let mean = vals.iter().sum::<f64>() / window as f64;
                let variance =
                    vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window as f64 - 1.0);
                out[i] = Some(variance.sqrt());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sentiment() -> SentimentSnapshot {
        SentimentSnapshot {
            date: "2024-06-03".parse().unwrap(),
            form_type: "10-Q".to_string(),
            lm_positive: 120.0,
            lm_negative: 95.0,
            lm_uncertain: 60.0,
            lm_litigious: 15.0,
            lm_constraining: 22.0,
            lm_pos_pct: 1.4,
            lm_neg_pct: 1.1,
            lm_uncertain_pct: 0.7,
            lm_sentiment_score: 0.12,
            lm_sentiment_ma5: 0.10,
            lm_sentiment_ma20: 0.08,
            lm_sentiment_delta: 0.04,
            lm_uncertainty_zscore: 0.3,
            lm_litigation_spike: 0.0,
            lm_neg_dominant: 0.0,
        }
    }

    fn sample_prices(n: usize) -> Vec<PricePoint> {
        let start: NaiveDate = "2023-01-02".parse().unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.1) + ((i as f64) * 0.7).sin();
                PricePoint {
                    date: start + chrono::Duration::days(i as i64),
                    open: close - 0.2,
                    high: close + 0.5,
                    low: close - 0.6,
                    close,
                    volume: 1_000_000.0 + (i as f64 * 500.0),
                }
            })
            .collect()
    }

    #[test]
    fn test_engineer_features_drops_warmup_rows() {
        let prices = sample_prices(260);
        let frame = engineer_features(&prices, &sample_sentiment());

        // The 200-day MA is the longest window; first complete row is day 200
        assert_eq!(frame.len(), 260 - 199);
        assert_eq!(frame.last().unwrap().date, prices.last().unwrap().date);
    }

    #[test]
    fn test_engineered_row_has_similarity_columns() {
        let prices = sample_prices(260);
        let frame = engineer_features(&prices, &sample_sentiment());
        let last = &frame.last().unwrap().values;

        for col in [
            "daily_return",
            "ma_200",
            "rsi_14",
            "volume_ratio_20",
            "distance_from_ma20",
            "lm_sentiment_score",
            "day_of_week",
            "quarter",
        ] {
            assert!(last.contains_key(col), "missing column {}", col);
        }

        let rsi = last["rsi_14"];
        assert!((0.0..=100.0).contains(&rsi));
    }

    #[test]
    fn test_too_short_series_yields_empty_frame() {
        let prices = sample_prices(50);
        let frame = engineer_features(&prices, &sample_sentiment());
        assert!(frame.is_empty());
    }

    #[test]
    fn test_sentiment_forward_fill_is_constant() {
        let prices = sample_prices(260);
        let frame = engineer_features(&prices, &sample_sentiment());
        let first = &frame.first().unwrap().values;
        let last = &frame.last().unwrap().values;
        assert_eq!(first["lm_sentiment_score"], last["lm_sentiment_score"]);
        assert_eq!(first["lm_sentiment_lag5"], last["lm_sentiment_score"]);
    }
}
