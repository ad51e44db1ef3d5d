use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Realized next-day direction of a trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn from_return(next_day_return: f64) -> Self {
        if next_day_return > 0.0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One retrieved historical analogy: a past trading day similar to the
/// current feature snapshot, with its realized outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogyResult {
    pub date: NaiveDate,
    /// Cosine similarity in the standardized feature space.
    pub similarity: f64,
    pub actual_direction: Direction,
    /// Realized next-day return, signed percent.
    pub actual_return: f64,
    /// Interpretability snapshot: label -> value, rounded to 4 decimals.
    /// Only signals present and non-null on that day are included.
    pub key_signals: BTreeMap<String, f64>,
    /// Whole days between the query date and this analogy's date.
    pub days_ago: i64,
}
