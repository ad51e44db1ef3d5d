use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::models::PredictionResponse;

#[derive(Debug, Clone)]
struct CachedPrediction {
    response: PredictionResponse,
    cached_at: DateTime<Utc>,
}

/// Keyed ticker -> prediction cache with a fixed TTL, owned by the app
/// state rather than living as a process global. Serving a cached
/// prediction avoids refetching prices and re-running the model on every
/// request.
pub struct PredictionCache {
    ttl_minutes: i64,
    cache: DashMap<String, CachedPrediction>,
}

impl PredictionCache {
    pub fn new(ttl_minutes: i64) -> Self {
        Self {
            ttl_minutes,
            cache: DashMap::new(),
        }
    }

    pub fn get(&self, ticker: &str) -> Option<PredictionResponse> {
        if let Some(entry) = self.cache.get(ticker) {
            let age = Utc::now() - entry.cached_at;
            if age < Duration::minutes(self.ttl_minutes) {
                return Some(entry.response.clone());
            }
            drop(entry);
            self.cache.remove(ticker);
        }
        None
    }

    pub fn insert(&self, ticker: &str, response: PredictionResponse) {
        self.cache.insert(
            ticker.to_string(),
            CachedPrediction {
                response,
                cached_at: Utc::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;

    fn response(ticker: &str) -> PredictionResponse {
        PredictionResponse {
            ticker: ticker.to_string(),
            name: "Coca-Cola".to_string(),
            prediction: Direction::Up,
            confidence: 0.6,
            prob_up: 0.6,
            prob_down: 0.4,
            predicted_date: "2026-08-08".parse().unwrap(),
            as_of_date: "2026-08-07".parse().unwrap(),
            top_signals: Vec::new(),
            sentiment_score: 0.1,
            sentiment_label: "Neutral".to_string(),
            model_accuracy: 0.52,
        }
    }

    #[test]
    fn test_cache_round_trip() {
        let cache = PredictionCache::new(30);
        assert!(cache.get("KO").is_none());

        cache.insert("KO", response("KO"));
        let cached = cache.get("KO").unwrap();
        assert_eq!(cached.ticker, "KO");
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache = PredictionCache::new(0);
        cache.insert("KO", response("KO"));
        assert!(cache.get("KO").is_none());
    }

    #[test]
    fn test_clear_empties_cache() {
        let cache = PredictionCache::new(30);
        cache.insert("KO", response("KO"));
        cache.clear();
        assert!(cache.get("KO").is_none());
    }
}
