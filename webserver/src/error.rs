//! WebServer-specific error types
//!
//! `WebServerError` covers startup and collaborator failures. `ApiError` is
//! what a request handler reports to the client: a status code plus a Polish
//! message, with internal detail only outside production.

use axum::http::StatusCode;
use pool::{FallbackError, PoolError};
use shared::SharedError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebServerError {
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidConfig { field: String, value: String },

    #[error("HTTP server startup failed on {addr}: {message}")]
    ServerStartup { addr: String, message: String },

    #[error("Usage ledger error: {message}")]
    Ledger { message: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type WebServerResult<T> = Result<T, WebServerError>;

pub const MSG_MISSING_FIELDS: &str = "CV i email są wymagane";
pub const MSG_INVALID_EMAIL: &str = "Nieprawidłowy format email";
pub const MSG_CV_TOO_SHORT: &str = "CV jest za krótkie (minimum 10 znaków)";
pub const MSG_INVALID_BODY: &str = "Nieprawidłowe dane żądania";
pub const MSG_TIMEOUT: &str = "Przetwarzanie przekroczyło limit czasu. Spróbuj z krótszym CV.";
pub const MSG_UNAVAILABLE: &str = "System przetwarzania jest tymczasowo niedostępny. Spróbuj ponownie.";
pub const MSG_INTERNAL: &str = "Wystąpił błąd podczas przetwarzania CV";
pub const MSG_METHOD_NOT_ALLOWED: &str = "Method not allowed";

/// A request failure as reported to the client
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Processing timed out: {detail}")]
    Timeout { detail: String },

    #[error("Processing unavailable: {detail}")]
    Unavailable { detail: String },

    #[error("Processing failed: {detail}")]
    Internal { detail: String },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
            ApiError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message
    pub fn message(&self) -> &str {
        match self {
            ApiError::Validation(message) => message,
            ApiError::Timeout { .. } => MSG_TIMEOUT,
            ApiError::Unavailable { .. } => MSG_UNAVAILABLE,
            ApiError::Internal { .. } => MSG_INTERNAL,
        }
    }

    /// Internal diagnostic text, if any
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Validation(_) => None,
            ApiError::Timeout { detail } | ApiError::Unavailable { detail } | ApiError::Internal { detail } => {
                Some(detail)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "ValidationError",
            ApiError::Timeout { .. } => "TimeoutError",
            ApiError::Unavailable { .. } => "UnavailableError",
            ApiError::Internal { .. } => "FallbackExhaustedError",
        }
    }
}

impl From<FallbackError> for ApiError {
    fn from(err: FallbackError) -> Self {
        let detail = err.to_string();
        match err {
            FallbackError::Exhausted { .. } if err.timed_out() => ApiError::Timeout { detail },
            FallbackError::Exhausted { .. } => ApiError::Internal { detail },
            FallbackError::RemoteUnavailable(_) => ApiError::Unavailable { detail },
        }
    }
}
