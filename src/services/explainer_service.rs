use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use tracing::warn;

use crate::config;
use crate::models::{AnalogyResult, ConfidenceTier, Explanation};
use crate::services::analogy_service::{self, AnalogyOptions};
use crate::services::llm_service::{
    extract_json_object, CompletionRequest, LlmProvider, EXPLAIN_MODEL,
};
use crate::services::predictor_service::Prediction;

/// Builds the retail-analyst prompt combining current signals, the model
/// prediction, and the formatted historical analogies.
pub fn build_prompt(
    ticker: &str,
    prediction: &Prediction,
    sentiment_score: f64,
    sentiment_label: &str,
    analogies: &[AnalogyResult],
) -> String {
    let company_context = config::ticker_meta(ticker)
        .map(|m| m.context)
        .unwrap_or(ticker);
    let confidence_pct = format!("{:.1}%", prediction.confidence * 100.0);
    let analogy_text = analogy_service::format_analogies(analogies, ticker);

    let signals_text = prediction
        .top_signals
        .iter()
        .map(|s| format!("  - {}: {} ({})", s.name, s.value, s.state))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a financial research analyst explaining a quantitative stock signal to a retail investor.

COMPANY: {ticker} - {company_context}

MODEL PREDICTION: {prediction} with {confidence_pct} confidence
SEC FILING SENTIMENT: {sentiment_label} (score: {sentiment_score:.3})

CURRENT TECHNICAL SIGNALS:
{signals_text}

{analogy_text}

TASK:
Write a concise, factual explanation (4-6 sentences) of why the model is predicting {prediction} for {ticker} tomorrow.

Your explanation must:
1. Reference the specific signals driving the prediction (RSI, sentiment, momentum etc.)
2. Mention the most relevant historical analogy and what actually happened
3. Identify the single biggest risk factor that could invalidate this prediction
4. End with a one-sentence plain-English summary a retail investor can understand

IMPORTANT RULES:
- Never recommend buying or selling. This is educational/simulation only.
- Be specific - reference actual numbers from the signals
- Be honest about uncertainty - 52% accuracy means this is probabilistic, not certain
- Do not use phrases like "as an AI" or "I cannot provide financial advice"
- Write in second person: "The model sees..." or "Current conditions show..."

Respond ONLY with a valid JSON object in this exact format:
{{
  "headline": "one sentence summary (max 15 words)",
  "explanation": "4-6 sentence detailed explanation",
  "key_driver": "the single most important signal driving this prediction",
  "main_risk": "the single biggest risk factor that could invalidate this prediction",
  "historical_note": "one sentence about the most relevant historical analogy",
  "confidence_tier": "Low Signal | Moderate Signal | Strong Signal | High Conviction"
}}"#,
        ticker = ticker,
        company_context = company_context,
        prediction = prediction.direction,
        confidence_pct = confidence_pct,
        sentiment_label = sentiment_label,
        sentiment_score = sentiment_score,
        signals_text = signals_text,
        analogy_text = analogy_text,
    )
}

/// Full explanation pipeline: retrieve analogies, prompt the LLM, parse the
/// structured reply. Never fails the request: LLM trouble degrades along a
/// fallback ladder, and an analogy failure degrades to zero analogies.
pub async fn explain_prediction(
    llm: Option<&dyn LlmProvider>,
    data_root: &Path,
    ticker: &str,
    prediction: &Prediction,
    sentiment_score: f64,
    sentiment_label: &str,
    query: &HashMap<String, f64>,
    as_of: NaiveDate,
) -> Explanation {
    let analogies =
        match analogy_service::find_similar_days(data_root, ticker, query, &AnalogyOptions::new(as_of)) {
            Ok(analogies) => analogies,
            Err(e) => {
                warn!("Similarity search failed for {}: {}", ticker, e);
                Vec::new()
            }
        };

    let prompt = build_prompt(ticker, prediction, sentiment_score, sentiment_label, &analogies);
    let tier = ConfidenceTier::from_confidence(prediction.confidence);

    let raw = match llm {
        Some(provider) => {
            provider
                .complete(CompletionRequest {
                    model: EXPLAIN_MODEL.to_string(),
                    prompt,
                    max_tokens: 600,
                    temperature: 0.3,
                })
                .await
        }
        None => Err(crate::errors::LlmError::ApiError(
            "LLM provider not configured".to_string(),
        )),
    };

    match raw {
        Ok(text) => match parse_reply(&text) {
            Some(mut explanation) => {
                explanation.confidence_tier = tier;
                explanation.analogies = analogies;
                explanation
            }
            None => {
                warn!("LLM returned unparseable explanation for {}", ticker);
                // Keep the raw text as the explanation body
                Explanation {
                    headline: format!("{} model predicts {}", ticker, prediction.direction),
                    explanation: text,
                    key_driver: first_signal_name(prediction),
                    main_risk: "Model uncertainty - ~52% accuracy means prediction is probabilistic"
                        .to_string(),
                    historical_note: analogies
                        .first()
                        .map(|a| a.date.to_string())
                        .unwrap_or_else(|| "No analogies found".to_string()),
                    confidence_tier: tier,
                    analogies,
                }
            }
        },
        Err(e) => {
            warn!("LLM call failed for {}: {}", ticker, e);
            Explanation {
                headline: format!("{} model predicts {}", ticker, prediction.direction),
                explanation: "Explanation unavailable - LLM service error.".to_string(),
                key_driver: first_signal_name(prediction),
                main_risk: "Unable to generate risk analysis".to_string(),
                historical_note: "Unable to retrieve historical context".to_string(),
                confidence_tier: tier,
                analogies,
            }
        }
    }
}

fn parse_reply(raw: &str) -> Option<Explanation> {
    let value = extract_json_object(raw)?;
    let get = |key: &str| value.get(key).and_then(|v| v.as_str()).map(str::to_string);

    Some(Explanation {
        headline: get("headline")?,
        explanation: get("explanation")?,
        key_driver: get("key_driver")?,
        main_risk: get("main_risk")?,
        historical_note: get("historical_note")?,
        // Recomputed from the model confidence; the LLM's tier is advisory
        confidence_tier: ConfidenceTier::LowSignal,
        analogies: Vec::new(),
    })
}

fn first_signal_name(prediction: &Prediction) -> String {
    prediction
        .top_signals
        .first()
        .map(|s| s.name.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, TopSignal};

    fn prediction() -> Prediction {
        Prediction {
            direction: Direction::Up,
            confidence: 0.62,
            prob_up: 0.62,
            prob_down: 0.38,
            top_signals: vec![TopSignal {
                name: "RSI".to_string(),
                value: 27.5,
                state: "Oversold".to_string(),
            }],
            cv_accuracy: 0.52,
            trained_on: "2025-11-30".to_string(),
        }
    }

    #[test]
    fn test_build_prompt_mentions_signals_and_rules() {
        let prompt = build_prompt("KO", &prediction(), 0.12, "Neutral", &[]);
        assert!(prompt.contains("COMPANY: KO"));
        assert!(prompt.contains("UP with 62.0% confidence"));
        assert!(prompt.contains("RSI: 27.5 (Oversold)"));
        assert!(prompt.contains("No historical analogies found."));
        assert!(prompt.contains("Never recommend buying or selling"));
    }

    #[test]
    fn test_parse_reply_happy_path() {
        let raw = r#"{"headline": "h", "explanation": "e", "key_driver": "RSI",
                      "main_risk": "r", "historical_note": "n",
                      "confidence_tier": "Moderate Signal"}"#;
        let parsed = parse_reply(raw).unwrap();
        assert_eq!(parsed.headline, "h");
        assert_eq!(parsed.key_driver, "RSI");
    }

    #[test]
    fn test_parse_reply_rejects_missing_fields() {
        assert!(parse_reply(r#"{"headline": "only"}"#).is_none());
        assert!(parse_reply("not json").is_none());
    }
}
