use serde_json::json;
use tracing::{info, warn};

use crate::config;
use crate::models::{
    CaseItem, HistoricalEvidence, MarketContext, ParsedHypothesis, ResearchBrief,
};
use crate::services::llm_service::{
    extract_json_array, extract_json_object, CompletionRequest, LlmProvider, SYNTH_MODEL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseSide {
    Bull,
    Bear,
}

/// Deterministic 0-100 feasibility score:
/// base rate for the implied move (40 pts), technical alignment (30 pts),
/// realism (30 pts).
pub fn compute_feasibility_score(
    parsed: &ParsedHypothesis,
    market: &MarketContext,
    evidence: &HistoricalEvidence,
) -> u8 {
    let mut score: i32 = 0;

    // Base-rate component
    if let Some(rate) = evidence
        .base_rates
        .as_ref()
        .and_then(|br| br.rate_for_implied)
    {
        score += if rate >= 40.0 {
            40
        } else if rate >= 20.0 {
            30
        } else if rate >= 10.0 {
            20
        } else if rate >= 5.0 {
            10
        } else {
            2
        };
    }

    // Technical alignment
    let signal = |name: &str| market.signals.get(name).copied();
    let rsi = signal("rsi_14").unwrap_or(50.0);
    let regime_bull = signal("market_regime_enc").unwrap_or(0.0) == 1.0;
    let ma_aligned = signal("ma20_above_ma50").unwrap_or(0.0) == 1.0;
    let momentum = signal("momentum_5d").unwrap_or(0.0);

    if let Some(implied) = parsed.implied_return_pct {
        let bullish = implied > 0.0;
        if bullish {
            if regime_bull {
                score += 10;
            }
            if ma_aligned {
                score += 10;
            }
            if momentum > 0.0 {
                score += 5;
            }
            if rsi > 40.0 && rsi < 70.0 {
                score += 5;
            }
        } else {
            if !regime_bull {
                score += 10;
            }
            if !ma_aligned {
                score += 10;
            }
            if momentum < 0.0 {
                score += 5;
            }
            if rsi > 70.0 || rsi < 30.0 {
                score += 5;
            }
        }
    }

    // Realism component
    if !parsed.unrealistic {
        score += 30;
    } else {
        let z = parsed.z_score.unwrap_or(10.0);
        if z < 5.0 {
            score += 15;
        } else if z < 10.0 {
            score += 5;
        }
    }

    score.clamp(0, 100) as u8
}

/// Asks the LLM for three risks (bear) or three catalysts (bull) for the
/// company. Degrades to an empty list on any failure.
pub async fn collect_case(
    llm: Option<&dyn LlmProvider>,
    ticker: &str,
    side: CaseSide,
) -> Vec<CaseItem> {
    let Some(provider) = llm else {
        return Vec::new();
    };

    let company = config::display_name(ticker);
    let (angle, items) = match side {
        CaseSide::Bear => ("key risks and headwinds", "risks"),
        CaseSide::Bull => ("key catalysts and tailwinds", "catalysts"),
    };

    let prompt = format!(
        "You are a financial analyst. Identify exactly 3 {angle} for {company} ({ticker}) stock \
         over the next year. Return ONLY a JSON array, no markdown. Each item must have: \
         title (5 words max), description (2 sentences).",
    );

    let raw = provider
        .complete(CompletionRequest {
            model: SYNTH_MODEL.to_string(),
            prompt,
            max_tokens: 500,
            temperature: 0.1,
        })
        .await;

    match raw {
        Ok(text) => {
            let parsed = extract_json_array(&text)
                .and_then(|v| serde_json::from_value::<Vec<CaseItem>>(v).ok())
                .unwrap_or_default();
            info!("{} {} found for {}", parsed.len(), items, ticker);
            parsed
        }
        Err(e) => {
            warn!("Case agent ({:?}) failed for {}: {}", side, ticker, e);
            Vec::new()
        }
    }
}

pub fn build_synthesis_prompt(
    parsed: &ParsedHypothesis,
    market: &MarketContext,
    evidence: &HistoricalEvidence,
    bear: &[CaseItem],
    bull: &[CaseItem],
    feasibility_score: u8,
) -> String {
    let ticker = &parsed.ticker;
    let company = config::display_name(ticker);
    let signal = |name: &str| {
        market
            .signals
            .get(name)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "n/a".to_string())
    };

    let tech_summary = format!(
        "RSI={}, MA20_dist={}%, momentum_5d={}%, regime={}, sentiment={}, litigation_spike={}",
        signal("rsi_14"),
        signal("distance_from_ma20"),
        signal("momentum_5d"),
        if market.signals.get("market_regime_enc").copied() == Some(1.0) {
            "Bull"
        } else {
            "Bear"
        },
        signal("lm_sentiment_score"),
        signal("lm_litigation_spike"),
    );

    let base_rate_summary = match &evidence.base_rates {
        Some(br) => format!(
            "Base rate for implied move: {}% | Max historical {}d gain: {}% | Median {}d return: {}%",
            br.rate_for_implied.map(|r| r.to_string()).unwrap_or_else(|| "N/A".to_string()),
            br.timeframe_days,
            br.max_gain,
            br.timeframe_days,
            br.median_return,
        ),
        None => "No base-rate data available.".to_string(),
    };

    let risks_text = bear
        .iter()
        .map(|r| format!("- {}: {}", r.title, r.description))
        .collect::<Vec<_>>()
        .join("\n");
    let catalysts_text = bull
        .iter()
        .map(|c| format!("- {}: {}", c.title, c.description))
        .collect::<Vec<_>>()
        .join("\n");

    let similar_text = evidence
        .similar_setups
        .iter()
        .map(|s| {
            format!(
                "  {} ({}d ago): {} {:+.2}% similarity={:.2}%",
                s.date,
                s.days_ago,
                s.actual_direction,
                s.actual_return,
                s.similarity * 100.0
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a senior financial research analyst writing a structured research brief.

HYPOTHESIS: "{raw_text}"
TICKER: {ticker} ({company})
CURRENT PRICE: ${current_price}
TARGET PRICE: ${target_price}
IMPLIED RETURN: {implied}% over {timeframe} days
FEASIBILITY SCORE: {score}/100
UNREALISTIC FLAG: {unrealistic} (z-score: {z_score})

TECHNICAL PICTURE:
{tech_summary}
52w High: ${high} ({to_high}% away)
52w Low: ${low} ({above_low}% above)

HISTORICAL EVIDENCE:
{base_rate_summary}
Similar past setups:
{similar}

BEAR CASE (current risks):
{risks}

BULL CASE (current catalysts):
{catalysts}

Write a research brief. Return ONLY valid JSON, no markdown:
{{
  "hypothesis_clean": "clean restatement of the hypothesis",
  "ticker": "{ticker}",
  "feasibility_score": {score},
  "reality_check": "2-3 sentences: is this hypothesis realistic? reference base rates and z-score",
  "technical_picture": {{
    "summary": "2 sentences on current technical setup",
    "trend": "bullish/bearish/neutral based on MA alignment and regime",
    "momentum": "positive/negative/neutral"
  }},
  "historical_evidence": {{
    "summary": "2 sentences on what history says about this move"
  }},
  "parameters_to_monitor": [
    {{"param": "RSI", "watch_for": "crosses above 70 (overbought) or below 30 (oversold)"}},
    {{"param": "MA20", "watch_for": "price breaking the 20-day average invalidates the setup"}},
    {{"param": "Sentiment", "watch_for": "new SEC filing that shifts the sentiment score"}}
  ],
  "summary": "3-4 sentence plain English conclusion a retail investor can understand",
  "disclaimer": "This is an educational simulation only. Not financial advice. Model accuracy is ~52%."
}}"#,
        raw_text = parsed.raw_text,
        ticker = ticker,
        company = company,
        current_price = fmt_opt(parsed.current_price),
        target_price = fmt_opt(parsed.target_price),
        implied = fmt_opt(parsed.implied_return_pct),
        timeframe = parsed.timeframe_days,
        score = feasibility_score,
        unrealistic = parsed.unrealistic,
        z_score = fmt_opt(parsed.z_score),
        tech_summary = tech_summary,
        high = fmt_opt(market.week52_high),
        to_high = fmt_opt(market.distance_to_high_pct),
        low = fmt_opt(market.week52_low),
        above_low = fmt_opt(market.distance_above_low_pct),
        base_rate_summary = base_rate_summary,
        similar = if similar_text.is_empty() {
            "None found".to_string()
        } else {
            similar_text
        },
        risks = if risks_text.is_empty() {
            "None identified".to_string()
        } else {
            risks_text
        },
        catalysts = if catalysts_text.is_empty() {
            "None identified".to_string()
        } else {
            catalysts_text
        },
    )
}

/// Synthesizes the final research brief. Without an LLM (or on LLM
/// failure) a deterministic fallback brief is assembled from the computed
/// evidence instead.
pub async fn synthesize(
    llm: Option<&dyn LlmProvider>,
    parsed: ParsedHypothesis,
    market: MarketContext,
    evidence: HistoricalEvidence,
    bull_case: Vec<CaseItem>,
    bear_case: Vec<CaseItem>,
) -> ResearchBrief {
    let feasibility_score = compute_feasibility_score(&parsed, &market, &evidence);
    info!(
        "Synthesizing research brief for {} (feasibility {}/100)",
        parsed.ticker, feasibility_score
    );

    let brief = match llm {
        Some(provider) => {
            let prompt = build_synthesis_prompt(
                &parsed,
                &market,
                &evidence,
                &bear_case,
                &bull_case,
                feasibility_score,
            );
            match provider
                .complete(CompletionRequest {
                    model: SYNTH_MODEL.to_string(),
                    prompt,
                    max_tokens: 2000,
                    temperature: 0.2,
                })
                .await
            {
                Ok(raw) => match extract_json_object(&raw) {
                    Some(value) => value,
                    None => {
                        warn!("Brief synthesis returned unparseable JSON for {}", parsed.ticker);
                        fallback_brief(&parsed, &evidence, feasibility_score)
                    }
                },
                Err(e) => {
                    warn!("Brief synthesis failed for {}: {}", parsed.ticker, e);
                    fallback_brief(&parsed, &evidence, feasibility_score)
                }
            }
        }
        None => fallback_brief(&parsed, &evidence, feasibility_score),
    };

    ResearchBrief {
        parsed,
        market,
        evidence,
        bull_case,
        bear_case,
        feasibility_score,
        brief,
    }
}

fn fallback_brief(
    parsed: &ParsedHypothesis,
    evidence: &HistoricalEvidence,
    feasibility_score: u8,
) -> serde_json::Value {
    json!({
        "hypothesis_clean": parsed.raw_text,
        "ticker": parsed.ticker,
        "feasibility_score": feasibility_score,
        "reality_check": evidence.verdict.clone().unwrap_or_else(||
            "No historical base-rate data available for this hypothesis.".to_string()),
        "summary": format!(
            "Feasibility score {}/100 based on historical base rates, technical alignment, and realism.",
            feasibility_score
        ),
        "disclaimer": "This is an educational simulation only. Not financial advice. Model accuracy is ~52%.",
    })
}

fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "n/a".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BaseRates, HypothesisType};
    use std::collections::BTreeMap;

    fn parsed(implied: Option<f64>, unrealistic: bool, z: Option<f64>) -> ParsedHypothesis {
        ParsedHypothesis {
            raw_text: "KO will reach $90 in 3 months".to_string(),
            ticker: "KO".to_string(),
            target_price: Some(90.0),
            timeframe_days: 90,
            current_price: Some(70.0),
            implied_return_pct: implied,
            hypothesis_type: HypothesisType::PriceTarget,
            unrealistic,
            historical_std_pct: None,
            z_score: z,
            warnings: Vec::new(),
        }
    }

    fn market(signals: &[(&str, f64)]) -> MarketContext {
        MarketContext {
            ticker: "KO".to_string(),
            current_price: Some(70.0),
            week52_high: Some(75.0),
            week52_low: Some(55.0),
            distance_to_high_pct: Some(7.1),
            distance_above_low_pct: Some(27.3),
            sector: "Consumer Staples".to_string(),
            signals: signals
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn evidence(rate_for_implied: Option<f64>) -> HistoricalEvidence {
        HistoricalEvidence {
            ticker: "KO".to_string(),
            timeframe_days: 90,
            implied_return_pct: Some(28.6),
            base_rates: Some(BaseRates {
                total_periods: 1000,
                timeframe_days: 90,
                rate_for_implied,
                ..BaseRates::default()
            }),
            similar_setups: Vec::new(),
            verdict: None,
        }
    }

    #[test]
    fn test_feasibility_full_alignment() {
        let market = market(&[
            ("rsi_14", 55.0),
            ("market_regime_enc", 1.0),
            ("ma20_above_ma50", 1.0),
            ("momentum_5d", 1.2),
        ]);
        let score = compute_feasibility_score(
            &parsed(Some(10.0), false, None),
            &market,
            &evidence(Some(45.0)),
        );
        // 40 base rate + 30 technical + 30 realism
        assert_eq!(score, 100);
    }

    #[test]
    fn test_feasibility_unrealistic_move_scores_low() {
        let market = market(&[
            ("rsi_14", 55.0),
            ("market_regime_enc", 0.0),
            ("ma20_above_ma50", 0.0),
            ("momentum_5d", -0.5),
        ]);
        let score = compute_feasibility_score(
            &parsed(Some(300.0), true, Some(12.0)),
            &market,
            &evidence(Some(0.0)),
        );
        // 2 base rate + 0 technical (bullish vs bear tape... rsi neutral adds 5) + 0 realism
        assert!(score <= 10);
    }

    #[test]
    fn test_feasibility_bearish_alignment() {
        let market = market(&[
            ("rsi_14", 75.0),
            ("market_regime_enc", 0.0),
            ("ma20_above_ma50", 0.0),
            ("momentum_5d", -2.0),
        ]);
        let score = compute_feasibility_score(
            &parsed(Some(-8.0), false, None),
            &market,
            &evidence(Some(25.0)),
        );
        // 30 base rate + 30 technical + 30 realism
        assert_eq!(score, 90);
    }

    #[test]
    fn test_synthesis_prompt_includes_evidence() {
        let prompt = build_synthesis_prompt(
            &parsed(Some(28.6), false, Some(1.2)),
            &market(&[("rsi_14", 55.0)]),
            &evidence(Some(3.0)),
            &[CaseItem {
                title: "Margin pressure".to_string(),
                description: "Input costs are rising.".to_string(),
            }],
            &[],
            42,
        );
        assert!(prompt.contains("FEASIBILITY SCORE: 42/100"));
        assert!(prompt.contains("Base rate for implied move: 3%"));
        assert!(prompt.contains("- Margin pressure: Input costs are rising."));
        assert!(prompt.contains("BULL CASE"));
    }
}
