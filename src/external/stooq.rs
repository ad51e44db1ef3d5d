use crate::external::price_provider::{ExternalPricePoint, PriceProvider, PriceProviderError};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

/// Stooq daily-history CSV endpoint. Free, no API key; used as the fallback
/// provider behind Yahoo.
pub struct StooqProvider {
    client: reqwest::Client,
}

impl StooqProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[async_trait]
impl PriceProvider for StooqProvider {
    async fn fetch_daily_history(
        &self,
        ticker: &str,
        days: u32,
    ) -> Result<Vec<ExternalPricePoint>, PriceProviderError> {
        // US listings use a .us suffix: "ko" -> "ko.us"
        let symbol = format!("{}.us", ticker.to_lowercase());
        let url = format!("https://stooq.com/q/d/l/?s={symbol}&i=d");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PriceProviderError::RateLimited);
        }
        if !resp.status().is_success() {
            return Err(PriceProviderError::BadResponse(format!(
                "status {}",
                resp.status()
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| PriceProviderError::Network(e.to_string()))?;

        // CSV columns: Date,Open,High,Low,Close,Volume
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(body.as_bytes());

        let cutoff = Utc::now().date_naive() - chrono::Duration::days(days as i64);
        let mut out = Vec::new();

        for record in rdr.records() {
            let record = record.map_err(|e| PriceProviderError::Parse(e.to_string()))?;

            let date = record
                .get(0)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                .ok_or_else(|| PriceProviderError::Parse("bad date".into()))?;

            if date < cutoff {
                continue;
            }

            let field = |i: usize| -> Option<f64> {
                record.get(i).and_then(|v| v.trim().parse::<f64>().ok())
            };

            let (Some(open), Some(high), Some(low), Some(close)) =
                (field(1), field(2), field(3), field(4))
            else {
                continue;
            };
            let volume = field(5).unwrap_or(0.0);

            out.push(ExternalPricePoint {
                date,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        if out.is_empty() {
            return Err(PriceProviderError::BadResponse(format!(
                "no data for {}",
                ticker
            )));
        }

        out.sort_by_key(|p| p.date);
        Ok(out)
    }
}
