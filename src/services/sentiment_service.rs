use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::errors::AppError;
use crate::models::{SentimentPoint, SentimentSnapshot};

/// Per-ticker Loughran-McDonald sentiment series produced by the filing
/// pipeline, one row per SEC filing.
pub fn sentiment_path(data_root: &Path, ticker: &str) -> PathBuf {
    data_root.join(ticker).join("sentiment_features.csv")
}

/// Most recent filing sentiment for a ticker.
pub fn load_latest(data_root: &Path, ticker: &str) -> Result<SentimentSnapshot, AppError> {
    let snapshots = load_all(data_root, ticker)?;
    snapshots
        .into_iter()
        .last()
        .ok_or_else(|| AppError::Validation(format!("sentiment series for {} is empty", ticker)))
}

/// Last `n` sentiment points for the history chart.
pub fn load_history(
    data_root: &Path,
    ticker: &str,
    n: usize,
) -> Result<Vec<SentimentPoint>, AppError> {
    let snapshots = load_all(data_root, ticker)?;
    let skip = snapshots.len().saturating_sub(n);
    Ok(snapshots
        .into_iter()
        .skip(skip)
        .map(|s| SentimentPoint {
            date: s.date,
            lm_sentiment_score: s.lm_sentiment_score,
            lm_neg_pct: s.lm_neg_pct,
            lm_uncertain_pct: s.lm_uncertain_pct,
            form_type: s.form_type,
        })
        .collect())
}

fn load_all(data_root: &Path, ticker: &str) -> Result<Vec<SentimentSnapshot>, AppError> {
    let path = sentiment_path(data_root, ticker);
    if !path.exists() {
        return Err(AppError::DatasetNotFound(ticker.to_string()));
    }
    let file = File::open(&path)
        .map_err(|e| AppError::Validation(format!("failed to open {}: {}", path.display(), e)))?;
    read_snapshots(file)
}

/// Parses the sentiment CSV and returns rows sorted ascending by date.
pub fn read_snapshots<R: Read>(reader: R) -> Result<Vec<SentimentSnapshot>, AppError> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| AppError::Validation(format!("unreadable sentiment header: {}", e)))?
        .clone();
    let col = |name: &str| -> Result<usize, AppError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| AppError::Validation(format!("sentiment file missing column {}", name)))
    };

    let date_idx = col("date")?;
    let form_idx = col("form_type")?;
    let numeric_cols = [
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
    let mut indices = Vec::with_capacity(numeric_cols.len());
    for name in numeric_cols {
        indices.push(col(name)?);
    }

    let mut snapshots = Vec::new();
    for row in rdr.records() {
        let row =
            row.map_err(|e| AppError::Validation(format!("unreadable sentiment row: {}", e)))?;

        let date_cell = row.get(date_idx).unwrap_or("");
        let date = NaiveDate::parse_from_str(date_cell, "%Y-%m-%d").map_err(|_| {
            AppError::Validation(format!("unparseable sentiment date: {:?}", date_cell))
        })?;

        let mut nums = [0.0f64; 15];
        for (slot, &idx) in nums.iter_mut().zip(indices.iter()) {
            *slot = row
                .get(idx)
                .and_then(|c| c.trim().parse::<f64>().ok())
                .unwrap_or(0.0);
        }

        snapshots.push(SentimentSnapshot {
            date,
            form_type: row.get(form_idx).unwrap_or("").to_string(),
            lm_positive: nums[0],
            lm_negative: nums[1],
            lm_uncertain: nums[2],
            lm_litigious: nums[3],
            lm_constraining: nums[4],
            lm_pos_pct: nums[5],
            lm_neg_pct: nums[6],
            lm_uncertain_pct: nums[7],
            lm_sentiment_score: nums[8],
            lm_sentiment_ma5: nums[9],
            lm_sentiment_ma20: nums[10],
            lm_sentiment_delta: nums[11],
            lm_uncertainty_zscore: nums[12],
            lm_litigation_spike: nums[13],
            lm_neg_dominant: nums[14],
        });
    }

    snapshots.sort_by_key(|s| s.date);
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
date,form_type,lm_positive,lm_negative,lm_uncertain,lm_litigious,lm_constraining,lm_pos_pct,lm_neg_pct,lm_uncertain_pct,lm_sentiment_score,lm_sentiment_ma5,lm_sentiment_ma20,lm_sentiment_delta,lm_uncertainty_zscore,lm_litigation_spike,lm_neg_dominant
2024-02-20,10-K,100,120,60,12,20,1.2,1.5,0.8,-0.2,-0.1,0.0,-0.2,1.1,0,1
2023-11-01,10-Q,140,90,40,8,15,1.6,1.0,0.5,0.35,0.3,0.2,0.15,-0.4,0,0
";

    #[test]
    fn test_read_snapshots_sorted_by_date() {
        let snapshots = read_snapshots(SAMPLE.as_bytes()).unwrap();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].form_type, "10-Q");
        assert_eq!(snapshots[1].form_type, "10-K");
        assert!(snapshots[0].date < snapshots[1].date);
    }

    #[test]
    fn test_latest_values_parsed() {
        let snapshots = read_snapshots(SAMPLE.as_bytes()).unwrap();
        let latest = snapshots.last().unwrap();
        assert_eq!(latest.lm_sentiment_score, -0.2);
        assert_eq!(latest.lm_neg_dominant, 1.0);
        assert_eq!(latest.label(), "Neutral");
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let csv = "date,form_type\n2024-02-20,10-K\n";
        assert!(read_snapshots(csv.as_bytes()).is_err());
    }
}
