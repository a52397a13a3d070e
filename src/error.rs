//! Common error type and result alias.
use thiserror::Error;

use crate::orchestration::queue::QueueError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Server error: {0}")]
    Server(#[from] hyper::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Operation aborted before completing")]
    Aborted,
}

impl AppError {
    /// Whether the failure is worth retrying: transport hiccups, rate limiting
    /// and server-side errors. Client errors and validation never are.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::HttpClient(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            AppError::Backend { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<QueueError<AppError>> for AppError {
    fn from(err: QueueError<AppError>) -> Self {
        match err {
            QueueError::Operation(e) => e,
            QueueError::Aborted => AppError::Aborted,
        }
    }
}
