use chrono::{DateTime, Utc};

use crate::config;
use crate::models::{Direction, TickerAccuracy};

/// One line of the morning brief.
#[derive(Debug, Clone)]
pub struct BriefPrediction {
    pub ticker: String,
    pub prediction: Direction,
    pub confidence: f64,
}

/// One line of the evening brief: prediction vs realized outcome.
#[derive(Debug, Clone)]
pub struct OutcomeLine {
    pub ticker: String,
    pub prediction: String,
    pub actual_direction: String,
    pub actual_return: f64,
}

const FOOTER: &str = "⚠️ <i>Educational simulation only. Not financial advice.</i>";
const RULE: &str = "─────────────────────────";

pub fn fmt_morning_brief(predictions: &[BriefPrediction], now: DateTime<Utc>) -> String {
    let mut lines = vec![
        "🌅 <b>TradeBrief Morning Brief</b>".to_string(),
        format!("<i>{}</i>", now.format("%A %b %d, %Y · %H:%M UTC")),
        RULE.to_string(),
    ];

    for p in predictions {
        let arrow = match p.prediction {
            Direction::Up => "▲",
            Direction::Down => "▼",
        };
        let emoji = match p.prediction {
            Direction::Up => "🟢",
            Direction::Down => "🔴",
        };
        lines.push(format!(
            "{} <b>{}</b> {} {}  <code>{:.1}%</code> confidence\n   <i>{}</i>",
            emoji,
            p.ticker,
            arrow,
            p.prediction,
            p.confidence * 100.0,
            config::display_name(&p.ticker),
        ));
    }

    lines.push(RULE.to_string());
    lines.push(FOOTER.to_string());
    lines.push("Model accuracy ~52% across all tickers.".to_string());
    lines.join("\n")
}

pub fn fmt_evening_brief(
    outcomes: &[OutcomeLine],
    total: i64,
    correct: i64,
    now: DateTime<Utc>,
) -> String {
    let mut lines = vec![
        "🌆 <b>TradeBrief Evening Brief</b>".to_string(),
        format!("<i>{}</i>", now.format("%A %b %d, %Y · %H:%M UTC")),
        RULE.to_string(),
    ];

    for o in outcomes {
        let emoji = if o.prediction == o.actual_direction {
            "✅"
        } else {
            "❌"
        };
        lines.push(format!(
            "{} <b>{}</b>  Predicted: {} | Actual: {}  <code>{:+.2}%</code>",
            emoji, o.ticker, o.prediction, o.actual_direction, o.actual_return
        ));
    }

    let accuracy = if total > 0 {
        correct as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    lines.push(RULE.to_string());
    lines.push(format!(
        "📊 Running accuracy: <code>{:.1}%</code> ({}/{} correct)",
        accuracy, correct, total
    ));
    lines.push(FOOTER.to_string());
    lines.join("\n")
}

pub fn fmt_weekly_digest(stats: &[TickerAccuracy], now: DateTime<Utc>) -> String {
    let mut lines = vec![
        "📈 <b>TradeBrief Weekly Digest</b>".to_string(),
        format!("<i>{}</i>", now.format("Week ending %b %d, %Y")),
        RULE.to_string(),
    ];

    for s in stats {
        let accuracy = s.accuracy_pct();
        let filled = (accuracy / 10.0) as usize;
        let bar: String = "█".repeat(filled.min(10)) + &"░".repeat(10 - filled.min(10));
        lines.push(format!(
            "<b>{}</b>  {}  <code>{:.0}%</code>  ({} signals)",
            s.ticker, bar, accuracy, s.total
        ));
    }

    lines.push(RULE.to_string());
    lines.push(FOOTER.to_string());
    lines.join("\n")
}

pub fn fmt_direction_flip(
    ticker: &str,
    old_prediction: Direction,
    new_prediction: Direction,
    confidence: f64,
) -> String {
    let arrow = match new_prediction {
        Direction::Up => "▲",
        Direction::Down => "▼",
    };
    format!(
        "🔄 <b>DIRECTION FLIP — {}</b>\n{}\n\nPrevious: <s>{}</s>\nNew: <b>{} {}</b> \
         (<code>{:.1}%</code> confidence)\n\n<i>Model changed its prediction since last run.</i>\n{}",
        ticker,
        config::display_name(ticker),
        old_prediction,
        arrow,
        new_prediction,
        confidence * 100.0,
        FOOTER,
    )
}

pub fn fmt_sentiment_spike(ticker: &str, score: f64, zscore: f64) -> String {
    let direction = if score > 0.0 {
        "positive ↑"
    } else {
        "negative ↓"
    };
    format!(
        "📄 <b>SEC SENTIMENT SPIKE — {}</b>\n{}\n\nNew sentiment score: <code>{:.3}</code> ({})\n\
         Z-score: <code>{:.2}σ</code> from ticker average\n\n\
         <i>A new SEC filing has shifted the sentiment signal significantly.</i>\n{}",
        ticker,
        config::display_name(ticker),
        score,
        direction,
        zscore,
        FOOTER,
    )
}

pub fn fmt_litigation_spike(ticker: &str) -> String {
    format!(
        "⚖️ <b>LITIGATION FLAG — {}</b>\n{}\n\n\
         Loughran-McDonald litigation language spiked in latest SEC filing.\n\
         <i>Elevated legal/regulatory language detected — monitor for developments.</i>\n{}",
        ticker,
        config::display_name(ticker),
        FOOTER,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-08-07T13:30:00Z".parse().unwrap()
    }

    #[test]
    fn test_morning_brief_lists_each_ticker() {
        let text = fmt_morning_brief(
            &[
                BriefPrediction {
                    ticker: "KO".to_string(),
                    prediction: Direction::Up,
                    confidence: 0.61,
                },
                BriefPrediction {
                    ticker: "AAPL".to_string(),
                    prediction: Direction::Down,
                    confidence: 0.55,
                },
            ],
            now(),
        );
        assert!(text.contains("<b>KO</b> ▲ UP"));
        assert!(text.contains("<b>AAPL</b> ▼ DOWN"));
        assert!(text.contains("61.0%"));
        assert!(text.contains("Not financial advice"));
    }

    #[test]
    fn test_evening_brief_marks_hits_and_misses() {
        let text = fmt_evening_brief(
            &[
                OutcomeLine {
                    ticker: "KO".to_string(),
                    prediction: "UP".to_string(),
                    actual_direction: "UP".to_string(),
                    actual_return: 0.84,
                },
                OutcomeLine {
                    ticker: "PG".to_string(),
                    prediction: "UP".to_string(),
                    actual_direction: "DOWN".to_string(),
                    actual_return: -0.31,
                },
            ],
            7,
            4,
            now(),
        );
        assert!(text.contains("✅ <b>KO</b>"));
        assert!(text.contains("❌ <b>PG</b>"));
        assert!(text.contains("+0.84%"));
        assert!(text.contains("57.1%"));
    }

    #[test]
    fn test_weekly_digest_bar_length() {
        let text = fmt_weekly_digest(
            &[TickerAccuracy {
                ticker: "KO".to_string(),
                total: 10,
                correct: 6,
            }],
            now(),
        );
        assert!(text.contains("██████░░░░"));
        assert!(text.contains("(10 signals)"));
    }

    #[test]
    fn test_direction_flip_shows_both_calls() {
        let text = fmt_direction_flip("WMT", Direction::Up, Direction::Down, 0.58);
        assert!(text.contains("<s>UP</s>"));
        assert!(text.contains("▼ DOWN"));
        assert!(text.contains("58.0%"));
    }
}
