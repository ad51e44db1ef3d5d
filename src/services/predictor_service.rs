use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;
use tracing::info;

use crate::config;
use crate::errors::AppError;
use crate::models::{Direction, ModelInfo, TopSignal};
use crate::services::feature_service::FeatureRow;

/// Frozen per-ticker classifier artifact: the calibration head exported by
/// the training pipeline, with the standardization statistics it was fit
/// with. The artifact is input-only; nothing here retrains it.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    pub ticker: String,
    pub model_type: String,
    pub feature_cols: Vec<String>,
    pub scaler_mean: Vec<f64>,
    pub scaler_scale: Vec<f64>,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub cv_accuracy: f64,
    pub trained_on: String,
}

impl ModelArtifact {
    fn validate(&self) -> Result<(), AppError> {
        let d = self.feature_cols.len();
        if self.scaler_mean.len() != d || self.scaler_scale.len() != d || self.weights.len() != d {
            return Err(AppError::Validation(format!(
                "model artifact for {} is inconsistent: {} feature columns but {}/{}/{} scaler/weight entries",
                self.ticker,
                d,
                self.scaler_mean.len(),
                self.scaler_scale.len(),
                self.weights.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub direction: Direction,
    pub confidence: f64,
    pub prob_up: f64,
    pub prob_down: f64,
    pub top_signals: Vec<TopSignal>,
    pub cv_accuracy: f64,
    pub trained_on: String,
}

/// Owns the ticker -> loaded-model store. Models load lazily on first use
/// and stay cached for the service's lifetime; tests construct isolated
/// instances instead of sharing process globals.
pub struct PredictorService {
    model_root: PathBuf,
    cache: DashMap<String, Arc<ModelArtifact>>,
}

impl PredictorService {
    pub fn new(model_root: PathBuf) -> Self {
        Self {
            model_root,
            cache: DashMap::new(),
        }
    }

    fn load_model(&self, ticker: &str) -> Result<Arc<ModelArtifact>, AppError> {
        if let Some(model) = self.cache.get(ticker) {
            return Ok(model.clone());
        }

        let path = self.model_root.join(format!("{}.json", ticker));
        if !path.exists() {
            return Err(AppError::ModelNotFound(ticker.to_string()));
        }

        let raw = fs::read_to_string(&path).map_err(|e| {
            AppError::Validation(format!("failed to read {}: {}", path.display(), e))
        })?;
        let artifact: ModelArtifact = serde_json::from_str(&raw).map_err(|e| {
            AppError::Validation(format!("invalid model artifact {}: {}", path.display(), e))
        })?;
        artifact.validate()?;

        info!(
            "Loaded model for {} (cv accuracy {:.4}, trained {})",
            ticker, artifact.cv_accuracy, artifact.trained_on
        );

        let artifact = Arc::new(artifact);
        self.cache.insert(ticker.to_string(), artifact.clone());
        Ok(artifact)
    }

    /// Predicts next-day direction from the latest engineered row.
    pub fn predict(&self, ticker: &str, frame: &[FeatureRow]) -> Result<Prediction, AppError> {
        let model = self.load_model(ticker)?;
        let latest = frame
            .last()
            .ok_or_else(|| AppError::Validation(format!("empty feature frame for {}", ticker)))?;

        Ok(predict_with_model(&model, latest))
    }

    pub fn model_info(&self, ticker: &str) -> Result<ModelInfo, AppError> {
        let model = self.load_model(ticker)?;
        let meta = config::ticker_meta(ticker);

        Ok(ModelInfo {
            ticker: ticker.to_string(),
            name: meta.map(|m| m.name).unwrap_or(ticker).to_string(),
            sector: meta.map(|m| m.sector).unwrap_or("").to_string(),
            cv_accuracy: model.cv_accuracy,
            trained_on: model.trained_on.clone(),
            input_features: model.feature_cols.len(),
            model_type: model.model_type.clone(),
        })
    }
}

/// Scores one engineered row against an artifact: standardize with the
/// artifact's own statistics, apply the logistic head. A feature missing
/// from the row contributes its training mean (standardized zero).
pub fn predict_with_model(model: &ModelArtifact, row: &FeatureRow) -> Prediction {
    let mut z = model.bias;
    for (j, col) in model.feature_cols.iter().enumerate() {
        let value = row
            .values
            .get(col)
            .copied()
            .filter(|v| !v.is_nan())
            .unwrap_or(model.scaler_mean[j]);
        let scale = if model.scaler_scale[j] == 0.0 {
            1.0
        } else {
            model.scaler_scale[j]
        };
        z += model.weights[j] * ((value - model.scaler_mean[j]) / scale);
    }

    let prob_up = 1.0 / (1.0 + (-z).exp());
    let prob_down = 1.0 - prob_up;
    let direction = if prob_up >= 0.5 {
        Direction::Up
    } else {
        Direction::Down
    };

    Prediction {
        direction,
        confidence: round4(prob_up.max(prob_down)),
        prob_up: round4(prob_up),
        prob_down: round4(prob_down),
        top_signals: interpret_signals(row),
        cv_accuracy: model.cv_accuracy,
        trained_on: model.trained_on.clone(),
    }
}

/// Plain-English states for the most interpretable signals, at most six.
pub fn interpret_signals(row: &FeatureRow) -> Vec<TopSignal> {
    type Interpreter = fn(f64) -> &'static str;
    let signal_map: [(&str, &str, Interpreter); 10] = [
        ("rsi_14", "RSI", |v| {
            if v < 30.0 {
                "Oversold"
            } else if v > 70.0 {
                "Overbought"
            } else {
                "Neutral"
            }
        }),
        ("lm_sentiment_score", "SEC Sentiment", |v| {
            if v > 0.5 {
                "Positive"
            } else if v < -0.5 {
                "Negative"
            } else {
                "Neutral"
            }
        }),
        ("lm_uncertain_pct", "Uncertainty", |v| {
            if v > 1.5 {
                "High"
            } else {
                "Normal"
            }
        }),
        ("lm_neg_pct", "Negative Language", |v| {
            if v > 1.5 {
                "Elevated"
            } else {
                "Normal"
            }
        }),
        ("distance_from_ma20", "Price vs MA20", |v| {
            if v > 0.0 {
                "Above"
            } else {
                "Below"
            }
        }),
        ("ma20_above_ma50", "Trend", |v| {
            if v == 1.0 {
                "Bullish"
            } else {
                "Bearish"
            }
        }),
        ("volatility_20", "Volatility", |v| {
            if v > 1.5 {
                "High"
            } else {
                "Low"
            }
        }),
        ("volume_surge", "Volume", |v| {
            if v == 1.0 {
                "Surge"
            } else {
                "Normal"
            }
        }),
        ("lm_litigation_spike", "Litigation Risk", |v| {
            if v == 1.0 {
                "Spike"
            } else {
                "Normal"
            }
        }),
        ("momentum_5d", "5D Momentum", |v| {
            if v > 0.0 {
                "Positive"
            } else {
                "Negative"
            }
        }),
    ];

    signal_map
        .iter()
        .filter_map(|(col, label, interpreter)| {
            row.values.get(*col).map(|&value| TopSignal {
                name: (*label).to_string(),
                value: round4(value),
                state: interpreter(value).to_string(),
            })
        })
        .take(6)
        .collect()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn artifact() -> ModelArtifact {
        ModelArtifact {
            ticker: "KO".to_string(),
            model_type: "transformer-exported logistic head".to_string(),
            feature_cols: vec!["rsi_14".to_string(), "momentum_5d".to_string()],
            scaler_mean: vec![50.0, 0.0],
            scaler_scale: vec![10.0, 2.0],
            weights: vec![-0.8, 1.2],
            bias: 0.1,
            cv_accuracy: 0.52,
            trained_on: "2025-11-30".to_string(),
        }
    }

    fn row(rsi: f64, momentum: f64) -> FeatureRow {
        FeatureRow {
            date: "2026-08-06".parse().unwrap(),
            values: HashMap::from([
                ("rsi_14".to_string(), rsi),
                ("momentum_5d".to_string(), momentum),
            ]),
        }
    }

    #[test]
    fn test_predict_probabilities_sum_to_one() {
        let p = predict_with_model(&artifact(), &row(45.0, 1.0));
        assert!((p.prob_up + p.prob_down - 1.0).abs() < 1e-3);
        assert!(p.confidence >= 0.5);
    }

    #[test]
    fn test_oversold_momentum_up_leans_up() {
        // Negative RSI weight: oversold plus positive momentum pushes UP
        let p = predict_with_model(&artifact(), &row(20.0, 3.0));
        assert_eq!(p.direction, Direction::Up);
        assert!(p.prob_up > 0.8);
    }

    #[test]
    fn test_missing_feature_contributes_training_mean() {
        let partial = FeatureRow {
            date: "2026-08-06".parse().unwrap(),
            values: HashMap::from([("momentum_5d".to_string(), 0.0)]),
        };
        let neutral = predict_with_model(&artifact(), &partial);
        // rsi missing -> standardized zero; momentum zero -> only bias left
        let expected = 1.0 / (1.0 + (-0.1f64).exp());
        assert!((neutral.prob_up - expected).abs() < 1e-3);
    }

    #[test]
    fn test_interpret_signals_caps_at_six() {
        let mut values = HashMap::new();
        for col in [
            "rsi_14",
            "lm_sentiment_score",
            "lm_uncertain_pct",
            "lm_neg_pct",
            "distance_from_ma20",
            "ma20_above_ma50",
            "volatility_20",
            "volume_surge",
        ] {
            values.insert(col.to_string(), 1.0);
        }
        let signals = interpret_signals(&FeatureRow {
            date: "2026-08-06".parse().unwrap(),
            values,
        });
        assert_eq!(signals.len(), 6);
    }

    #[test]
    fn test_interpret_signals_states() {
        let signals = interpret_signals(&row(25.0, -2.0));
        let rsi = signals.iter().find(|s| s.name == "RSI").unwrap();
        assert_eq!(rsi.state, "Oversold");
        let momentum = signals.iter().find(|s| s.name == "5D Momentum").unwrap();
        assert_eq!(momentum.state, "Negative");
    }

    #[test]
    fn test_artifact_validation_rejects_mismatched_lengths() {
        let mut bad = artifact();
        bad.weights.pop();
        assert!(bad.validate().is_err());
    }
}
