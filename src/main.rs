mod app;
mod config;
mod db;
mod errors;
mod external;
mod jobs;
mod logging;
mod models;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use crate::config::Settings;
use crate::external::multi_provider::MultiProvider;
use crate::external::price_provider::PriceProvider;
use crate::external::stooq::StooqProvider;
use crate::external::telegram::TelegramNotifier;
use crate::external::yahoo::YahooProvider;
use crate::services::job_scheduler_service::{JobContext, JobSchedulerService};
use crate::services::llm_service::{GroqProvider, LlmProvider};
use crate::services::prediction_cache::PredictionCache;
use crate::services::predictor_service::PredictorService;
use crate::services::watcher_service::WatcherState;
use crate::state::AppState;

const PREDICTION_CACHE_TTL_MINUTES: i64 = 30;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    logging::init_logging(logging::LoggingConfig::from_env())?;

    let settings = Arc::new(Settings::from_env()?);
    let database_url = std::env::var("DATABASE_URL")?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    // Select price provider based on PRICE_PROVIDER env var (defaults to multi)
    let provider_name =
        std::env::var("PRICE_PROVIDER").unwrap_or_else(|_| "multi".to_string());

    let provider: Arc<dyn PriceProvider> = match provider_name.to_lowercase().as_str() {
        "yahoo" => {
            tracing::info!("📊 Using price provider: Yahoo Finance only");
            Arc::new(YahooProvider::new())
        }
        "stooq" => {
            tracing::info!("📊 Using price provider: Stooq only");
            Arc::new(StooqProvider::new())
        }
        "multi" => {
            tracing::info!("📊 Using price provider: Multi-provider (Yahoo + Stooq fallback)");
            Arc::new(MultiProvider::new(
                Box::new(YahooProvider::new()),
                Box::new(StooqProvider::new()),
            ))
        }
        _ => {
            anyhow::bail!(
                "Invalid PRICE_PROVIDER: {}. Must be 'yahoo', 'stooq', or 'multi'",
                provider_name
            );
        }
    };

    let predictor = Arc::new(PredictorService::new(settings.model_root.clone()));
    let notifier = Arc::new(TelegramNotifier::from_env());
    let llm: Option<Arc<dyn LlmProvider>> = match GroqProvider::from_env() {
        Some(provider) => {
            tracing::info!("🧠 LLM explanations enabled (Groq)");
            Some(Arc::new(provider))
        }
        None => {
            tracing::warn!("GROQ_API_KEY not set; explanations will use fallbacks");
            None
        }
    };

    let state = AppState {
        pool: pool.clone(),
        settings: settings.clone(),
        price_provider: provider.clone(),
        predictor: predictor.clone(),
        llm,
        notifier: notifier.clone(),
        prediction_cache: Arc::new(PredictionCache::new(PREDICTION_CACHE_TTL_MINUTES)),
    };

    let mut scheduler = JobSchedulerService::new(JobContext {
        pool,
        settings: settings.clone(),
        price_provider: provider,
        predictor,
        notifier: notifier.clone(),
        watcher: Arc::new(WatcherState::new()),
    })
    .await?;
    scheduler.start().await?;

    if notifier.is_enabled() {
        if let Err(e) = notifier
            .send("🤖 <b>TradeBrief</b> - Telegram alerts online.\nBackend connected successfully.")
            .await
        {
            tracing::warn!("Startup Telegram ping failed: {}", e);
        }
    }

    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 TradeBrief backend running at http://{}/", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
