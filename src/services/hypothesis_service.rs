use std::path::Path;

use regex::Regex;
use tracing::{info, warn};

use crate::config;
use crate::errors::AppError;
use crate::models::{HypothesisType, ParsedHypothesis};
use crate::services::dataset;

/// Default horizon when the hypothesis names none.
pub const DEFAULT_TIMEFRAME_DAYS: i64 = 90;
/// Implied moves beyond this many standard deviations of the historical
/// N-day return distribution are flagged unrealistic.
pub const DEFAULT_STD_THRESHOLD: f64 = 3.0;

/// Finds the first supported ticker mentioned in the text: $-notation,
/// bare uppercase symbol, or company alias.
pub fn extract_ticker(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();

    let dollar_re = Regex::new(r"\$([A-Za-z]{1,5})\b").unwrap();
    if let Some(caps) = dollar_re.captures(text) {
        let candidate = caps[1].to_uppercase();
        if let Some(meta) = config::TICKERS.iter().find(|t| t.symbol == candidate) {
            return Some(meta.symbol);
        }
    }

    for meta in &config::TICKERS {
        let symbol_re = Regex::new(&format!(r"\b{}\b", meta.symbol)).unwrap();
        if symbol_re.is_match(text) {
            return Some(meta.symbol);
        }
    }

    for meta in &config::TICKERS {
        if meta.aliases.iter().any(|alias| lower.contains(alias)) {
            return Some(meta.symbol);
        }
    }

    None
}

/// Extracts the most likely target price: keyword-anchored first
/// ("reach $300", "target of 280.50"), any $-amount as fallback.
pub fn extract_target_price(text: &str) -> Option<f64> {
    let keyword_re = Regex::new(
        r"(?i)(?:reach(?:es)?|hits?|go\s+to|target(?:\s+(?:price|of))?|worth|at|climb\s+to|rise\s+to|drop\s+to|fall\s+to)\s+\$?([\d,]+(?:\.\d+)?)",
    )
    .unwrap();
    if let Some(caps) = keyword_re.captures(text) {
        return parse_price(&caps[1]);
    }

    let dollar_re = Regex::new(r"\$([\d,]+(?:\.\d+)?)").unwrap();
    dollar_re
        .captures(text)
        .and_then(|caps| parse_price(&caps[1]))
}

fn parse_price(s: &str) -> Option<f64> {
    s.replace(',', "").parse::<f64>().ok()
}

/// Converts a timeframe mention to days: "3 months" -> 90,
/// "2 years" -> 730, "short-term" -> 30. None when no timeframe appears.
pub fn extract_timeframe_days(text: &str) -> Option<i64> {
    let lower = text.to_lowercase();

    let unit_re = Regex::new(r"(\d+)\s*(years?|months?|weeks?|days?|quarters?)").unwrap();
    if let Some(caps) = unit_re.captures(&lower) {
        let n: i64 = caps[1].parse().ok()?;
        let per_unit = match caps[2].trim_end_matches('s') {
            "year" => 365,
            "month" => 30,
            "week" => 7,
            "day" => 1,
            "quarter" => 90,
            _ => 30,
        };
        return Some(n * per_unit);
    }

    if Regex::new(r"\bshort[- ]term\b").unwrap().is_match(&lower) {
        return Some(30);
    }
    if Regex::new(r"\bmid[- ]term\b").unwrap().is_match(&lower) {
        return Some(180);
    }
    if Regex::new(r"\blong[- ]term\b").unwrap().is_match(&lower) {
        return Some(365);
    }
    if Regex::new(r"\bthis (quarter|q[1-4])\b").unwrap().is_match(&lower) {
        return Some(90);
    }
    if Regex::new(r"\bend of (the )?year\b").unwrap().is_match(&lower) {
        return Some(180);
    }
    if Regex::new(r"\bsoon\b|\bshortly\b").unwrap().is_match(&lower) {
        return Some(14);
    }
    if Regex::new(r"\bovernight\b|\btomorrow\b").unwrap().is_match(&lower) {
        return Some(1);
    }

    None
}

/// Classifies the hypothesis by keyword priority:
/// price target > event-driven > directional.
pub fn classify_hypothesis(text: &str) -> HypothesisType {
    let lower = text.to_lowercase();

    let price_patterns = [
        r"\$[\d,]+(\.\d+)?",
        r"reach(?:es)?\s+\$?[\d,]+",
        r"hits?\s+\$?[\d,]+",
        r"go\s+to\s+\$?[\d,]+",
        r"target\s+(?:price\s+)?\$?[\d,]+",
        r"price\s+target\s+\$?[\d,]+",
        r"worth\s+\$?[\d,]+",
        r"at\s+\$[\d,]+",
    ];
    if price_patterns
        .iter()
        .any(|p| Regex::new(&format!("(?i){}", p)).unwrap().is_match(text))
    {
        return HypothesisType::PriceTarget;
    }

    let event_patterns = [
        r"\b(earnings|report|announcement|merger|acquisition|fda|patent|lawsuit|dividend|split)\b",
        r"\b(q[1-4]|fiscal|guidance|upgrade|downgrade|catalyst)\b",
    ];
    if event_patterns
        .iter()
        .any(|p| Regex::new(p).unwrap().is_match(&lower))
    {
        return HypothesisType::EventDriven;
    }

    HypothesisType::Directional
}

/// Standard deviation of rolling `timeframe_days`-step returns over a close
/// series, as a decimal. None when the series is too short.
pub fn historical_return_std(closes: &[f64], timeframe_days: i64) -> Option<f64> {
    let step = timeframe_days as usize;
    if step == 0 || closes.len() < step + 10 {
        return None;
    }

    let returns: Vec<f64> = (0..closes.len() - step)
        .filter(|&i| closes[i] != 0.0)
        .map(|i| closes[i + step] / closes[i] - 1.0)
        .collect();

    if returns.len() < 2 {
        return None;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Flags an implied move that sits beyond `std_threshold` standard
/// deviations of the historical distribution.
/// Returns (unrealistic, historical std %, z-score).
pub fn realism_check(
    implied_return_pct: f64,
    closes: &[f64],
    timeframe_days: i64,
    std_threshold: f64,
) -> Option<(bool, f64, f64)> {
    let std = historical_return_std(closes, timeframe_days)?;
    if std == 0.0 {
        return None;
    }

    let implied_decimal = implied_return_pct / 100.0;
    let z_score = implied_decimal.abs() / std;

    Some((
        z_score > std_threshold,
        round2(std * 100.0),
        round2(z_score),
    ))
}

/// Parses a raw hypothesis into structured form. `current_price` comes from
/// the caller (live quote); the realism check runs against the on-disk
/// dataset closes.
pub fn parse_hypothesis(
    data_root: &Path,
    text: &str,
    current_price: Option<f64>,
) -> Result<ParsedHypothesis, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("Empty hypothesis text.".to_string()));
    }

    let ticker = extract_ticker(text).ok_or_else(|| {
        AppError::Validation(format!(
            "Could not identify a supported ticker. Supported: {}",
            config::supported_symbols().join(", ")
        ))
    })?;
    info!("Hypothesis ticker identified: {}", ticker);

    let mut warnings = Vec::new();

    let timeframe_days = match extract_timeframe_days(text) {
        Some(days) => days,
        None => {
            warnings.push(format!(
                "No timeframe detected. Historical analysis will use {}-day default.",
                DEFAULT_TIMEFRAME_DAYS
            ));
            DEFAULT_TIMEFRAME_DAYS
        }
    };

    let target_price = extract_target_price(text);

    if current_price.is_none() {
        warnings.push(format!(
            "Could not fetch live price for {}. Implied return unavailable.",
            ticker
        ));
    }

    let implied_return_pct = match (current_price, target_price) {
        (Some(current), Some(target)) if current != 0.0 => {
            Some(round2((target - current) / current * 100.0))
        }
        (Some(_), None) => {
            warnings.push("No target price found - implied return not calculable.".to_string());
            None
        }
        _ => None,
    };

    let hypothesis_type = classify_hypothesis(text);

    let mut unrealistic = false;
    let mut historical_std_pct = None;
    let mut z_score = None;
    if let Some(implied) = implied_return_pct {
        match dataset::load_dataset(data_root, ticker) {
            Ok(ds) => {
                let closes = ds.column_values("close").unwrap_or_default();
                if let Some((flag, std_pct, z)) =
                    realism_check(implied, &closes, timeframe_days, DEFAULT_STD_THRESHOLD)
                {
                    unrealistic = flag;
                    historical_std_pct = Some(std_pct);
                    z_score = Some(z);
                    if flag {
                        warnings.push(format!(
                            "Implied return of {}% is {:.1} std deviations from the historical \
                             {}-day return distribution (sigma={}%). This move would be historically extreme.",
                            implied, z, timeframe_days, std_pct
                        ));
                    }
                }
            }
            Err(e) => {
                warn!("Realism check skipped for {}: {}", ticker, e);
                warnings.push("Historical return distribution unavailable.".to_string());
            }
        }
    }

    Ok(ParsedHypothesis {
        raw_text: text.to_string(),
        ticker: ticker.to_string(),
        target_price,
        timeframe_days,
        current_price,
        implied_return_pct,
        hypothesis_type,
        unrealistic,
        historical_std_pct,
        z_score,
        warnings,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
