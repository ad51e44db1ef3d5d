pub(crate) mod analogies;
pub(crate) mod auth;
pub(crate) mod health;
pub(crate) mod hypothesis;
pub(crate) mod predictions;
pub(crate) mod prices;
pub(crate) mod sentiment;
pub(crate) mod subscribers;

use crate::config;
use crate::errors::AppError;

/// Uppercases and checks a ticker path parameter against the fixed
/// supported set.
pub(crate) fn validate_ticker(raw: &str) -> Result<String, AppError> {
    let ticker = raw.trim().to_uppercase();
    if !config::is_supported(&ticker) {
        return Err(AppError::Validation(format!(
            "Unsupported ticker {:?}. Supported: {}",
            raw,
            config::supported_symbols().join(", ")
        )));
    }
    Ok(ticker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ticker_normalizes_case() {
        assert_eq!(validate_ticker("ko").unwrap(), "KO");
        assert_eq!(validate_ticker(" aapl ").unwrap(), "AAPL");
    }

    #[test]
    fn test_validate_ticker_rejects_unknown() {
        assert!(validate_ticker("TSLA").is_err());
    }
}
