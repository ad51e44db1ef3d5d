use std::path::PathBuf;

/// Static metadata for the fixed set of tracked equities.
#[derive(Debug, Clone, Copy)]
pub struct TickerMeta {
    pub symbol: &'static str,
    pub name: &'static str,
    pub sector: &'static str,
    /// One-line company context injected into LLM prompts.
    pub context: &'static str,
    /// Lowercase aliases matched by the hypothesis parser.
    pub aliases: &'static [&'static str],
}

pub const TICKERS: [TickerMeta; 6] = [
    TickerMeta {
        symbol: "KO",
        name: "Coca-Cola",
        sector: "Consumer Staples",
        context: "Coca-Cola Company, a global beverage giant known for defensive, non-cyclical revenue and consistent dividends.",
        aliases: &["ko", "coca-cola", "coca cola", "coke"],
    },
    TickerMeta {
        symbol: "JNJ",
        name: "Johnson & Johnson",
        sector: "Healthcare",
        context: "Johnson & Johnson, a diversified healthcare company with pharmaceuticals, medical devices, and consumer health segments.",
        aliases: &["jnj", "johnson & johnson", "johnson and johnson", "j&j"],
    },
    TickerMeta {
        symbol: "PG",
        name: "Procter & Gamble",
        sector: "Consumer Staples",
        context: "Procter & Gamble, a consumer staples leader with iconic household brands like Tide, Pampers, and Gillette.",
        aliases: &["pg", "procter & gamble", "procter and gamble", "p&g"],
    },
    TickerMeta {
        symbol: "WMT",
        name: "Walmart",
        sector: "Retail",
        context: "Walmart Inc., the world's largest retailer known for recession-resistant revenue and dominant supply chain.",
        aliases: &["wmt", "walmart", "wal-mart", "wal mart"],
    },
    TickerMeta {
        symbol: "AAPL",
        name: "Apple",
        sector: "Technology",
        context: "Apple Inc., a technology giant with high-margin hardware, software, and services ecosystem.",
        aliases: &["aapl", "apple"],
    },
    TickerMeta {
        symbol: "GOOGL",
        name: "Alphabet",
        sector: "Technology",
        context: "Alphabet Inc., Google's parent company with dominant search advertising and growing cloud business.",
        aliases: &["googl", "google", "alphabet"],
    },
];

pub fn supported_symbols() -> Vec<&'static str> {
    TICKERS.iter().map(|t| t.symbol).collect()
}

pub fn ticker_meta(symbol: &str) -> Option<&'static TickerMeta> {
    TICKERS.iter().find(|t| t.symbol == symbol)
}

pub fn is_supported(symbol: &str) -> bool {
    ticker_meta(symbol).is_some()
}

pub fn display_name(symbol: &str) -> &str {
    ticker_meta(symbol).map(|t| t.name).unwrap_or(symbol)
}

/// Runtime settings read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the per-ticker processed datasets
    /// (`<data_root>/<TICKER>/merged_dataset.csv`).
    pub data_root: PathBuf,
    /// Root of the per-ticker frozen model artifacts
    /// (`<model_root>/<TICKER>.json`).
    pub model_root: PathBuf,
    pub jwt_secret: String,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let data_root = std::env::var("DATA_ROOT").unwrap_or_else(|_| "data/processed".to_string());
        let model_root = std::env::var("MODEL_ROOT").unwrap_or_else(|_| "model".to_string());
        let jwt_secret = std::env::var("AUTH_JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("AUTH_JWT_SECRET not set"))?;
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("Invalid PORT: {}", e))?;

        Ok(Self {
            data_root: PathBuf::from(data_root),
            model_root: PathBuf::from(model_root),
            jwt_secret,
            port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_symbols_fixed_set() {
        let symbols = supported_symbols();
        assert_eq!(symbols, vec!["KO", "JNJ", "PG", "WMT", "AAPL", "GOOGL"]);
    }

    #[test]
    fn test_ticker_meta_lookup() {
        let meta = ticker_meta("KO").unwrap();
        assert_eq!(meta.name, "Coca-Cola");
        assert_eq!(meta.sector, "Consumer Staples");
        assert!(ticker_meta("TSLA").is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_symbol() {
        assert_eq!(display_name("WMT"), "Walmart");
        assert_eq!(display_name("ZZZ"), "ZZZ");
    }
}
