use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::errors::AppError;

/// One labeled trading day. `values` is aligned with the owning dataset's
/// `columns`; missing cells are stored as NaN.
#[derive(Debug, Clone)]
pub struct TradingDayRecord {
    pub date: NaiveDate,
    /// Realized next-day return, signed percent.
    pub next_day_return: f64,
    /// True when the next-day return was positive.
    pub target_direction: bool,
    pub values: Vec<f64>,
}

/// Per-ticker feature/outcome table, sorted ascending by date. Built fresh
/// for every query from the on-disk CSV; never mutated.
#[derive(Debug, Clone)]
pub struct HistoricalDataset {
    pub columns: Vec<String>,
    pub records: Vec<TradingDayRecord>,
}

pub fn dataset_path(data_root: &Path, ticker: &str) -> PathBuf {
    data_root.join(ticker).join("merged_dataset.csv")
}

/// Loads the full labeled history for a ticker: reads the CSV, drops rows
/// without a realized outcome, and sorts by date.
pub fn load_dataset(data_root: &Path, ticker: &str) -> Result<HistoricalDataset, AppError> {
    let path = dataset_path(data_root, ticker);
    if !path.exists() {
        return Err(AppError::DatasetNotFound(ticker.to_string()));
    }

    let file = File::open(&path)
        .map_err(|e| AppError::Validation(format!("failed to open {}: {}", path.display(), e)))?;
    HistoricalDataset::from_reader(file)
}

/// Loads a ticker's history restricted to rows eligible as analogy
/// candidates: at least `min_days_ago` old relative to `as_of`. Fails with
/// `InsufficientHistory` when fewer than `min_rows` rows survive, so callers
/// can rely on getting at least that many candidates back.
pub fn load_eligible(
    data_root: &Path,
    ticker: &str,
    as_of: NaiveDate,
    min_days_ago: i64,
    min_rows: usize,
) -> Result<HistoricalDataset, AppError> {
    let mut dataset = load_dataset(data_root, ticker)?;
    dataset.restrict_to_min_age(as_of, min_days_ago);

    if dataset.records.len() < min_rows {
        return Err(AppError::InsufficientHistory {
            ticker: ticker.to_string(),
            needed: min_rows,
            got: dataset.records.len(),
        });
    }

    Ok(dataset)
}

impl HistoricalDataset {
    /// Parses the CSV table. `date`, `next_day_return` and `target_direction`
    /// are required columns; every other column becomes a numeric feature
    /// (non-numeric or empty cells parse to NaN). Rows missing either label
    /// cell are dropped: they are the most recent day(s) with no realized
    /// outcome yet.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, AppError> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| AppError::Validation(format!("unreadable dataset header: {}", e)))?
            .clone();

        let find = |name: &str| headers.iter().position(|h| h == name);
        let date_idx = find("date")
            .ok_or_else(|| AppError::Validation("dataset missing date column".to_string()))?;
        let return_idx = find("next_day_return").ok_or_else(|| {
            AppError::Validation("dataset missing next_day_return column".to_string())
        })?;
        let direction_idx = find("target_direction").ok_or_else(|| {
            AppError::Validation("dataset missing target_direction column".to_string())
        })?;

        let feature_indices: Vec<usize> = (0..headers.len())
            .filter(|&i| i != date_idx && i != return_idx && i != direction_idx)
            .collect();
        let columns: Vec<String> = feature_indices
            .iter()
            .map(|&i| headers[i].to_string())
            .collect();

        let mut records = Vec::new();
        for row in rdr.records() {
            let row =
                row.map_err(|e| AppError::Validation(format!("unreadable dataset row: {}", e)))?;

            let date_cell = row.get(date_idx).unwrap_or("");
            let date = NaiveDate::parse_from_str(date_cell, "%Y-%m-%d").map_err(|_| {
                AppError::Validation(format!("unparseable dataset date: {:?}", date_cell))
            })?;

            let next_day_return = match parse_cell(row.get(return_idx)) {
                v if v.is_nan() => continue,
                v => v,
            };
            let direction_raw = parse_cell(row.get(direction_idx));
            if direction_raw.is_nan() {
                continue;
            }

            let values = feature_indices
                .iter()
                .map(|&i| parse_cell(row.get(i)))
                .collect();

            records.push(TradingDayRecord {
                date,
                next_day_return,
                target_direction: direction_raw > 0.5,
                values,
            });
        }

        records.sort_by_key(|r| r.date);

        Ok(Self { columns, records })
    }

    /// Drops rows younger than `min_days_ago` relative to `as_of`: the
    /// temporal exclusion window that keeps near-duplicates of the live
    /// signal from posing as historical precedent.
    pub fn restrict_to_min_age(&mut self, as_of: NaiveDate, min_days_ago: i64) {
        let cutoff = as_of - chrono::Duration::days(min_days_ago);
        self.records.retain(|r| r.date < cutoff);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column in row order. NaN where missing.
    pub fn column_values(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.column_index(name)?;
        Some(self.records.iter().map(|r| r.values[idx]).collect())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn parse_cell(cell: Option<&str>) -> f64 {
    cell.and_then(|c| {
        let c = c.trim();
        if c.is_empty() {
            None
        } else {
            c.parse::<f64>().ok()
        }
    })
    .unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
date,close,rsi_14,next_day_return,target_direction
2020-01-03,54.0,61.0,-0.4,0
2020-01-02,53.5,60.2,0.9,1
2020-01-06,,48.3,1.2,1
2020-01-07,55.1,47.0,,
";

    #[test]
    fn test_from_reader_sorts_and_drops_unlabeled() {
        let ds = HistoricalDataset::from_reader(SAMPLE.as_bytes()).unwrap();

        // Unlabeled 2020-01-07 row is dropped
        assert_eq!(ds.len(), 3);

        // Sorted ascending by date
        let dates: Vec<String> = ds.records.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, vec!["2020-01-02", "2020-01-03", "2020-01-06"]);

        assert!(ds.records[0].target_direction);
        assert!(!ds.records[1].target_direction);
    }

    #[test]
    fn test_empty_cells_parse_as_nan() {
        let ds = HistoricalDataset::from_reader(SAMPLE.as_bytes()).unwrap();
        let close_idx = ds.column_index("close").unwrap();
        assert!(ds.records[2].values[close_idx].is_nan());
    }

    #[test]
    fn test_missing_label_column_is_an_error() {
        let csv = "date,close\n2020-01-02,53.5\n";
        let err = HistoricalDataset::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_column_values_in_row_order() {
        let ds = HistoricalDataset::from_reader(SAMPLE.as_bytes()).unwrap();
        let rsi = ds.column_values("rsi_14").unwrap();
        assert_eq!(rsi, vec![60.2, 61.0, 48.3]);
    }

    #[test]
    fn test_restrict_to_min_age_drops_recent_rows() {
        let mut ds = HistoricalDataset::from_reader(SAMPLE.as_bytes()).unwrap();
        ds.restrict_to_min_age("2021-01-04".parse().unwrap(), 365);
        // Cutoff 2020-01-04: keeps 01-02 and 01-03, drops 01-06
        assert_eq!(ds.len(), 2);
        assert!(ds.records.iter().all(|r| r.date.to_string() < "2020-01-04".to_string()));
    }

    fn write_fixture(name: &str, content: &str) -> std::path::PathBuf {
        let root = std::env::temp_dir().join(format!("tradebrief_dataset_{}", name));
        let dir = root.join("KO");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("merged_dataset.csv"), content).unwrap();
        root
    }

    #[test]
    fn test_load_dataset_missing_ticker() {
        let root = write_fixture("missing", SAMPLE);
        let err = load_dataset(&root, "JNJ").unwrap_err();
        assert!(matches!(err, AppError::DatasetNotFound(t) if t == "JNJ"));
    }

    #[test]
    fn test_load_eligible_insufficient_history() {
        let root = write_fixture("insufficient", SAMPLE);
        // All 3 labeled rows are eligible, but 4 are required
        let err = load_eligible(&root, "KO", "2021-06-01".parse().unwrap(), 365, 4).unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientHistory { needed: 4, got: 3, .. }
        ));
    }
}
