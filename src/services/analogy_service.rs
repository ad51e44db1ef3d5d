use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::NaiveDate;
use ndarray::{Array1, Array2, Axis};
use tracing::error;

use crate::errors::AppError;
use crate::models::{AnalogyResult, Direction};
use crate::services::dataset::{self, HistoricalDataset};

/// Feature columns eligible for similarity comparison. The effective
/// comparison space per call is the intersection of this list with the
/// columns actually present in the dataset and the keys present in the
/// query vector, taken in this order.
pub const SIMILARITY_FEATURES: [&str; 38] = [
    "daily_return",
    "gap_pct",
    "close_lag1",
    "close_lag5",
    "close_lag10",
    "ma_7",
    "ma_20",
    "ma_50",
    "ma_200",
    "volatility_20",
    "volatility_30",
    "avg_volume_20",
    "volume_ratio_20",
    "momentum_5d",
    "momentum_10d",
    "distance_from_ma20",
    "distance_from_ma50",
    "upper_band_20",
    "lower_band_20",
    "rsi_14",
    "day_of_week",
    "month",
    "quarter",
    "lm_positive",
    "lm_negative",
    "lm_uncertain",
    "lm_litigious",
    "lm_constraining",
    "lm_pos_pct",
    "lm_neg_pct",
    "lm_uncertain_pct",
    "lm_sentiment_score",
    "lm_sentiment_ma5",
    "lm_sentiment_ma20",
    "lm_sentiment_delta",
    "lm_uncertainty_zscore",
    "lm_litigation_spike",
    "lm_neg_dominant",
];

/// Interpretability subset reported on each analogy, with display labels.
pub const KEY_SIGNALS: [(&str, &str); 10] = [
    ("rsi_14", "RSI"),
    ("lm_sentiment_score", "SEC Sentiment Score"),
    ("distance_from_ma20", "Distance from MA20 (%)"),
    ("volatility_20", "20-Day Volatility"),
    ("momentum_5d", "5-Day Momentum (%)"),
    ("lm_uncertain_pct", "Uncertainty Language (%)"),
    ("lm_neg_pct", "Negative Language (%)"),
    ("ma20_above_ma50", "Trend (MA20 > MA50)"),
    ("volume_ratio_20", "Volume Ratio"),
    ("lm_litigation_spike", "Litigation Spike"),
];

const NORM_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct AnalogyOptions {
    pub top_n: usize,
    /// Minimum age in days a historical row must have to be an eligible
    /// candidate. Keeps recent near-duplicates of the live signal out.
    pub min_days_ago: i64,
    pub as_of: NaiveDate,
}

impl AnalogyOptions {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            top_n: 3,
            min_days_ago: 365,
            as_of,
        }
    }
}

/// Finds the `top_n` historical trading days most similar to the query
/// feature snapshot, using cosine similarity in a standardized feature
/// space fit on the historical rows only.
pub fn find_similar_days(
    data_root: &Path,
    ticker: &str,
    query: &HashMap<String, f64>,
    opts: &AnalogyOptions,
) -> Result<Vec<AnalogyResult>, AppError> {
    let dataset = dataset::load_eligible(
        data_root,
        ticker,
        opts.as_of,
        opts.min_days_ago,
        opts.top_n,
    )?;
    rank_analogies(&dataset, query, opts)
}

/// Scores and ranks an already-loaded eligible dataset against a query.
pub fn rank_analogies(
    dataset: &HistoricalDataset,
    query: &HashMap<String, f64>,
    opts: &AnalogyOptions,
) -> Result<Vec<AnalogyResult>, AppError> {
    // Comparison space: allow-list order, present on both sides. Computed
    // fresh per call since data availability varies.
    let selected: Vec<(usize, f64)> = SIMILARITY_FEATURES
        .iter()
        .filter_map(|name| {
            match (dataset.column_index(name), query.get(*name)) {
                (Some(col), Some(&value)) => Some((col, value)),
                _ => None,
            }
        })
        .collect();

    if selected.is_empty() {
        error!(
            "no overlap between query vector and dataset columns; upstream feature pipeline drift?"
        );
        return Err(AppError::NoComparableFeatures);
    }

    let n = dataset.records.len();
    let d = selected.len();

    let mut matrix = Array2::<f64>::zeros((n, d));
    for (i, record) in dataset.records.iter().enumerate() {
        for (j, &(col, _)) in selected.iter().enumerate() {
            matrix[[i, j]] = record.values[col];
        }
    }

    // Historical NaNs become the column mean over the eligible rows, so
    // imputed values stay representative of the candidate pool. Query NaNs
    // become 0: a degraded-but-safe fallback for an unexpected gap.
    impute_column_means(&mut matrix);
    let mut query_vec = Array1::from(selected.iter().map(|&(_, v)| v).collect::<Vec<f64>>());
    query_vec.mapv_inplace(|v| if v.is_nan() { 0.0 } else { v });

    // Standardize with statistics fit on the historical matrix only; the
    // query must never influence the scaling parameters.
    standardize(&mut matrix, &mut query_vec);

    let similarities = cosine_similarities(&matrix, &query_vec);

    // Stable descending sort: exact ties keep dataset order, so earlier
    // dates win.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        similarities[b]
            .partial_cmp(&similarities[a])
            .unwrap_or(Ordering::Equal)
    });

    let results = order
        .iter()
        .take(opts.top_n)
        .map(|&idx| {
            let record = &dataset.records[idx];
            let mut key_signals = BTreeMap::new();
            for (column, label) in KEY_SIGNALS {
                if let Some(col) = dataset.column_index(column) {
                    let value = record.values[col];
                    if !value.is_nan() {
                        key_signals.insert(label.to_string(), round4(value));
                    }
                }
            }

            AnalogyResult {
                date: record.date,
                similarity: round4(similarities[idx]),
                actual_direction: if record.target_direction {
                    Direction::Up
                } else {
                    Direction::Down
                },
                actual_return: round4(record.next_day_return),
                key_signals,
                days_ago: (opts.as_of - record.date).num_days(),
            }
        })
        .collect();

    Ok(results)
}

/// Renders analogies as a labeled text block for injection into LLM
/// prompts. Illustrative prose, not a wire format.
pub fn format_analogies(analogies: &[AnalogyResult], ticker: &str) -> String {
    if analogies.is_empty() {
        return "No historical analogies found.".to_string();
    }

    let mut lines = vec![format!("Historical analogies for {}:\n", ticker)];

    for (i, a) in analogies.iter().enumerate() {
        lines.push(format!(
            "Analogy {} - {} ({} days ago, similarity: {:.2}%)",
            i + 1,
            a.date,
            a.days_ago,
            a.similarity * 100.0
        ));
        lines.push(format!(
            "  Outcome: {} ({:+.2}% next day)",
            a.actual_direction, a.actual_return
        ));
        lines.push("  Conditions that day:".to_string());
        for (label, value) in &a.key_signals {
            lines.push(format!("    - {}: {}", label, value));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

fn impute_column_means(matrix: &mut Array2<f64>) {
    for mut column in matrix.axis_iter_mut(Axis(1)) {
        let mut sum = 0.0;
        let mut count = 0usize;
        for &v in column.iter() {
            if !v.is_nan() {
                sum += v;
                count += 1;
            }
        }
        let mean = if count > 0 { sum / count as f64 } else { 0.0 };
        for v in column.iter_mut() {
            if v.is_nan() {
                *v = mean;
            }
        }
    }
}

fn standardize(matrix: &mut Array2<f64>, query: &mut Array1<f64>) {
    let n = matrix.nrows() as f64;
    for (j, mut column) in matrix.axis_iter_mut(Axis(1)).enumerate() {
        let mean = column.iter().sum::<f64>() / n;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        // Zero-variance columns pass through unscaled
        let scale = if std == 0.0 { 1.0 } else { std };

        for v in column.iter_mut() {
            *v = (*v - mean) / scale;
        }
        query[j] = (query[j] - mean) / scale;
    }
}

fn cosine_similarities(matrix: &Array2<f64>, query: &Array1<f64>) -> Vec<f64> {
    let query_norm = query.dot(query).sqrt() + NORM_EPSILON;
    let unit_query = query.mapv(|v| v / query_norm);

    matrix
        .axis_iter(Axis(0))
        .map(|row| {
            let row_norm = row.dot(&row).sqrt() + NORM_EPSILON;
            row.dot(&unit_query) / row_norm
        })
        .collect()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dataset::TradingDayRecord;

    fn day(date: &str, rsi: f64, momentum: f64, ret: f64) -> TradingDayRecord {
        TradingDayRecord {
            date: date.parse().unwrap(),
            next_day_return: ret,
            target_direction: ret > 0.0,
            values: vec![rsi, momentum],
        }
    }

    fn dataset() -> HistoricalDataset {
        HistoricalDataset {
            columns: vec!["rsi_14".to_string(), "momentum_5d".to_string()],
            records: vec![
                day("2015-03-02", 25.0, -2.0, 1.4),
                day("2015-06-10", 72.0, 3.1, -0.8),
                day("2016-01-15", 30.0, -1.5, 0.6),
                day("2016-09-01", 55.0, 0.2, 0.1),
            ],
        }
    }

    fn query(rsi: f64, momentum: f64) -> HashMap<String, f64> {
        HashMap::from([
            ("rsi_14".to_string(), rsi),
            ("momentum_5d".to_string(), momentum),
        ])
    }

    fn opts(top_n: usize) -> AnalogyOptions {
        AnalogyOptions {
            top_n,
            min_days_ago: 365,
            as_of: "2020-01-01".parse().unwrap(),
        }
    }

    #[test]
    fn test_self_similar_row_ranks_first() {
        let ds = dataset();
        let results = rank_analogies(&ds, &query(25.0, -2.0), &opts(3)).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].date.to_string(), "2015-03-02");
        // Sorted by non-increasing similarity
        assert!(results[0].similarity >= results[1].similarity);
        assert!(results[1].similarity >= results[2].similarity);
    }

    #[test]
    fn test_empty_intersection_is_an_error() {
        let ds = dataset();
        let disjoint = HashMap::from([("unknown_feature".to_string(), 1.0)]);
        let err = rank_analogies(&ds, &disjoint, &opts(3)).unwrap_err();
        assert!(matches!(err, AppError::NoComparableFeatures));
    }

    #[test]
    fn test_missing_query_feature_shrinks_comparison_space() {
        // Query exposes only rsi_14; momentum is silently excluded rather
        // than treated as an error.
        let ds = dataset();
        let partial = HashMap::from([("rsi_14".to_string(), 25.0)]);
        let results = rank_analogies(&ds, &partial, &opts(2)).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_determinism_identical_calls() {
        let ds = dataset();
        let q = query(40.0, 1.0);
        let a = rank_analogies(&ds, &q, &opts(3)).unwrap();
        let b = rank_analogies(&ds, &q, &opts(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tie_break_prefers_earlier_dataset_row() {
        // Two identical historical rows: the earlier one must rank first.
        let ds = HistoricalDataset {
            columns: vec!["rsi_14".to_string(), "momentum_5d".to_string()],
            records: vec![
                day("2014-05-05", 50.0, 1.0, 0.5),
                day("2015-05-05", 50.0, 1.0, -0.5),
                day("2016-05-05", 10.0, -4.0, 0.2),
            ],
        };
        let results = rank_analogies(&ds, &query(50.0, 1.0), &opts(2)).unwrap();
        assert_eq!(results[0].date.to_string(), "2014-05-05");
        assert_eq!(results[1].date.to_string(), "2015-05-05");
        assert_eq!(results[0].similarity, results[1].similarity);
    }

    #[test]
    fn test_mean_imputation_preserves_column_mean() {
        let mut matrix =
            Array2::from_shape_vec((4, 1), vec![2.0, f64::NAN, 4.0, 6.0]).unwrap();
        let mean_before = 12.0 / 3.0;

        impute_column_means(&mut matrix);

        let mean_after = matrix.column(0).iter().sum::<f64>() / 4.0;
        assert!((mean_after - mean_before).abs() < 1e-12);
        assert!((matrix[[1, 0]] - mean_before).abs() < 1e-12);
    }

    #[test]
    fn test_query_nan_is_zero_filled_not_error() {
        let ds = dataset();
        let q = HashMap::from([
            ("rsi_14".to_string(), f64::NAN),
            ("momentum_5d".to_string(), 1.0),
        ]);
        let results = rank_analogies(&ds, &q, &opts(3)).unwrap();
        assert_eq!(results.len(), 3);
        for r in &results {
            assert!(r.similarity.is_finite());
        }
    }

    #[test]
    fn test_key_signals_skip_missing_values() {
        let ds = HistoricalDataset {
            columns: vec!["rsi_14".to_string(), "momentum_5d".to_string()],
            records: vec![
                day("2015-03-02", f64::NAN, -2.0, 1.4),
                day("2015-06-10", 72.0, 3.1, -0.8),
            ],
        };
        let results = rank_analogies(&ds, &query(70.0, 3.0), &opts(2)).unwrap();
        let nan_rsi_day = results.iter().find(|r| r.date.to_string() == "2015-03-02");
        assert!(!nan_rsi_day.unwrap().key_signals.contains_key("RSI"));
    }

    #[test]
    fn test_format_analogies_renders_block() {
        let ds = dataset();
        let results = rank_analogies(&ds, &query(25.0, -2.0), &opts(1)).unwrap();
        let text = format_analogies(&results, "KO");
        assert!(text.contains("Historical analogies for KO"));
        assert!(text.contains("Analogy 1 - 2015-03-02"));
        assert!(text.contains("Outcome: UP"));
    }

    #[test]
    fn test_format_analogies_empty() {
        assert_eq!(format_analogies(&[], "KO"), "No historical analogies found.");
    }

    /// End-to-end scenario: 400 eligible rows plus 30 recent rows inside
    /// the exclusion window, a query matching one known oversold day.
    #[test]
    fn test_oversold_scenario_through_loader() {
        let as_of: NaiveDate = "2020-01-01".parse().unwrap();
        let start: NaiveDate = "2017-11-27".parse().unwrap();
        let target_day: NaiveDate = "2018-03-15".parse().unwrap();

        let mut csv = String::from(
            "date,close,rsi_14,momentum_5d,volatility_20,lm_sentiment_score,next_day_return,target_direction\n",
        );
        for i in 0..430i64 {
            let date = start + chrono::Duration::days(i);
            let (rsi, momentum, vol, sent) = if date == target_day {
                // Distinct near-oversold signature
                (25.0, -3.2, 2.8, -0.6)
            } else {
                (
                    20.0 + (i % 61) as f64,
                    -2.0 + (i % 9) as f64 * 0.5,
                    0.5 + (i % 7) as f64 * 0.3,
                    -0.4 + (i % 5) as f64 * 0.2,
                )
            };
            let ret = if i % 2 == 0 { 0.8 } else { -0.5 };
            csv.push_str(&format!(
                "{},{:.2},{},{},{},{},{},{}\n",
                date,
                100.0 + i as f64 * 0.05,
                rsi,
                momentum,
                vol,
                sent,
                ret,
                if ret > 0.0 { 1 } else { 0 },
            ));
        }

        let mut ds = HistoricalDataset::from_reader(csv.as_bytes()).unwrap();
        ds.restrict_to_min_age(as_of, 365);
        assert_eq!(ds.len(), 400);

        let query = HashMap::from([
            ("rsi_14".to_string(), 25.0),
            ("momentum_5d".to_string(), -3.2),
            ("volatility_20".to_string(), 2.8),
            ("lm_sentiment_score".to_string(), -0.6),
        ]);
        let opts = AnalogyOptions {
            top_n: 3,
            min_days_ago: 365,
            as_of,
        };
        let results = rank_analogies(&ds, &query, &opts).unwrap();

        // Exactly top_n results, non-increasing similarity, all outside
        // the exclusion window
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].date, target_day);
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        for r in &results {
            assert!(r.days_ago >= 365);
            assert!((0.0..=1.0).contains(&r.similarity));
        }
    }
}
