use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Settings;
use crate::external::price_provider::PriceProvider;
use crate::external::telegram::TelegramNotifier;
use crate::services::llm_service::LlmProvider;
use crate::services::prediction_cache::PredictionCache;
use crate::services::predictor_service::PredictorService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Arc<Settings>,
    pub price_provider: Arc<dyn PriceProvider>,
    pub predictor: Arc<PredictorService>,
    /// None when GROQ_API_KEY is not configured; explanation endpoints
    /// degrade to deterministic fallbacks.
    pub llm: Option<Arc<dyn LlmProvider>>,
    pub notifier: Arc<TelegramNotifier>,
    pub prediction_cache: Arc<PredictionCache>,
}
