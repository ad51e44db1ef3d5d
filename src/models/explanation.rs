use serde::{Deserialize, Serialize};

use super::analogy::AnalogyResult;

/// Qualitative confidence bucket surfaced to retail users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceTier {
    #[serde(rename = "Low Signal")]
    LowSignal,
    #[serde(rename = "Moderate Signal")]
    ModerateSignal,
    #[serde(rename = "Strong Signal")]
    StrongSignal,
    #[serde(rename = "High Conviction")]
    HighConviction,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence < 0.55 {
            ConfidenceTier::LowSignal
        } else if confidence < 0.65 {
            ConfidenceTier::ModerateSignal
        } else if confidence < 0.75 {
            ConfidenceTier::StrongSignal
        } else {
            ConfidenceTier::HighConviction
        }
    }
}

/// Structured natural-language explanation of a prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub headline: String,
    pub explanation: String,
    pub key_driver: String,
    pub main_risk: String,
    pub historical_note: String,
    pub confidence_tier: ConfidenceTier,
    pub analogies: Vec<AnalogyResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_tier_thresholds() {
        assert_eq!(
            ConfidenceTier::from_confidence(0.50),
            ConfidenceTier::LowSignal
        );
        assert_eq!(
            ConfidenceTier::from_confidence(0.55),
            ConfidenceTier::ModerateSignal
        );
        assert_eq!(
            ConfidenceTier::from_confidence(0.70),
            ConfidenceTier::StrongSignal
        );
        assert_eq!(
            ConfidenceTier::from_confidence(0.80),
            ConfidenceTier::HighConviction
        );
    }
}
