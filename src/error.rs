// ⚠️ Error Taxonomy
// One error type for every service operation; HTTP mapping lives in api.rs

use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid request fields (user-correctable)
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Storage read/write failure, surfaced verbatim and never retried
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Model artifact missing or corrupt (fatal at startup)
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// Detector input contained a non-numeric value
    #[error("invalid detector input: {0}")]
    InvalidInput(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::NotFound(_))
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::StoreUnavailable(format!("malformed document: {}", err))
    }
}
