use axum::http::{HeaderMap, HeaderValue};
use axum::response::IntoResponse;
use reqwest::StatusCode;
use sqlx::Error;
use thiserror::Error;

use crate::external::price_provider::PriceProviderError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Db(sqlx::Error),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found")]
    NotFound,
    #[error("no historical dataset for {0}")]
    DatasetNotFound(String),
    #[error("no model artifact for {0}")]
    ModelNotFound(String),
    #[error("insufficient history for {ticker}: need {needed} eligible rows, got {got}")]
    InsufficientHistory {
        ticker: String,
        needed: usize,
        got: usize,
    },
    #[error("no comparable features between query vector and dataset")]
    NoComparableFeatures,
    #[error("Rate limited by external provider")]
    RateLimited,
    #[error("External error: {0}")]
    External(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Admin access required")]
    Forbidden,
}

/// Errors produced by the LLM layer. Kept separate from AppError so the
/// explainer can apply its fallback ladder before anything reaches HTTP.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request timed out")]
    Timeout,
    #[error("network error: {0}")]
    NetworkError(String),
    #[error("rate limited")]
    RateLimited,
    #[error("api error: {0}")]
    ApiError(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            AppError::DatasetNotFound(ticker) => (
                StatusCode::NOT_FOUND,
                format!("No historical dataset for {}", ticker),
            )
                .into_response(),
            AppError::ModelNotFound(ticker) => (
                StatusCode::NOT_FOUND,
                format!("No model artifact for {}", ticker),
            )
                .into_response(),
            AppError::InsufficientHistory { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()).into_response()
            }
            AppError::NoComparableFeatures => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Admin access required").into_response(),
            AppError::RateLimited => {
                let mut headers = HeaderMap::new();
                headers.insert("Retry-After", HeaderValue::from_static("60"));
                (StatusCode::TOO_MANY_REQUESTS, headers, "Rate limited").into_response()
            }
            AppError::External(msg) => (StatusCode::BAD_GATEWAY, msg).into_response(),
            AppError::Db(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(value: Error) -> Self {
        AppError::Db(value)
    }
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        AppError::Validation(value)
    }
}

impl From<PriceProviderError> for AppError {
    fn from(value: PriceProviderError) -> Self {
        match value {
            PriceProviderError::RateLimited => AppError::RateLimited,
            other => AppError::External(other.to_string()),
        }
    }
}

impl From<LlmError> for AppError {
    fn from(value: LlmError) -> Self {
        match value {
            LlmError::RateLimited => AppError::RateLimited,
            other => AppError::External(other.to_string()),
        }
    }
}
