use crate::external::price_provider::{ExternalPricePoint, PriceProvider, PriceProviderError};
use async_trait::async_trait;
use tracing::{info, warn};

/// Primary provider with automatic fallback: Yahoo first (free, rich OHLCV),
/// Stooq when Yahoo fails or rate-limits.
pub struct MultiProvider {
    primary: Box<dyn PriceProvider>,
    fallback: Box<dyn PriceProvider>,
}

impl MultiProvider {
    pub fn new(primary: Box<dyn PriceProvider>, fallback: Box<dyn PriceProvider>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl PriceProvider for MultiProvider {
    async fn fetch_daily_history(
        &self,
        ticker: &str,
        days: u32,
    ) -> Result<Vec<ExternalPricePoint>, PriceProviderError> {
        match self.primary.fetch_daily_history(ticker, days).await {
            Ok(data) => {
                info!("Fetched {} from primary provider ({} bars)", ticker, data.len());
                return Ok(data);
            }
            Err(PriceProviderError::RateLimited) => {
                info!("Primary provider rate limited for {}, trying fallback", ticker);
            }
            Err(e) => {
                warn!("Primary provider error for {}: {}. Trying fallback.", ticker, e);
            }
        }

        match self.fallback.fetch_daily_history(ticker, days).await {
            Ok(data) => {
                info!("Fetched {} from fallback provider ({} bars)", ticker, data.len());
                Ok(data)
            }
            Err(e) => {
                warn!("Fallback provider failed for {}: {}", ticker, e);
                Err(PriceProviderError::BadResponse(format!(
                    "Failed to fetch {} from all providers. The ticker may not exist, \
                     or all providers are rate limited.",
                    ticker
                )))
            }
        }
    }
}
