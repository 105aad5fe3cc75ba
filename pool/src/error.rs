//! Pool and fallback error types

use shared::{ProcessingLayer, SharedError, Tier};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Unknown tier: {input}")]
    UnknownTier { input: String },

    #[error("Python worker timeout after {}s ({tier}): {}", timeout.as_secs(), or_none(stderr))]
    WorkerTimeout { tier: Tier, timeout: Duration, stderr: String },

    #[error("Request timeout while queued for a {tier} worker ({}s)", waited.as_secs())]
    QueueTimeout { tier: Tier, waited: Duration },

    #[error("Python worker failure ({tier}): {message}")]
    WorkerProcess { tier: Tier, message: String },

    #[error("Python worker reported an error ({tier}): {message}")]
    WorkerReported { tier: Tier, message: String },

    #[error("Failed to spawn Python worker for {tier}: {message}")]
    SpawnFailed { tier: Tier, message: String },

    #[error("Python worker pool is shut down")]
    ShutDown,

    #[error("Python fallback process timeout after {}s", timeout.as_secs())]
    DirectTimeout { timeout: Duration },

    #[error("Python fallback process exited with code {}: {stderr}", code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    DirectExit { code: Option<i32>, stderr: String },

    #[error("Python fallback setup failed: {message}")]
    DirectRun { message: String },

    #[error("Remote provider failed: {message}")]
    Remote { status: Option<u16>, message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() {
        "No error details"
    } else {
        text.trim()
    }
}

impl PoolError {
    /// Whether the failure was caused by a deadline rather than a crash
    pub fn is_timeout(&self) -> bool {
        match self {
            PoolError::WorkerTimeout { .. } | PoolError::QueueTimeout { .. } | PoolError::DirectTimeout { .. } => true,
            PoolError::Http(err) => err.is_timeout(),
            _ => false,
        }
    }
}

impl From<SharedError> for PoolError {
    fn from(err: SharedError) -> Self {
        match err {
            SharedError::UnknownTier { input } => PoolError::UnknownTier { input },
            other => PoolError::Protocol {
                message: other.to_string(),
            },
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;

/// One failed attempt in the fallback chain
#[derive(Debug, Clone, PartialEq)]
pub struct LayerFailure {
    pub layer: ProcessingLayer,
    pub message: String,
    pub timed_out: bool,
}

impl LayerFailure {
    pub fn new(layer: ProcessingLayer, error: &PoolError) -> Self {
        Self {
            layer,
            message: error.to_string(),
            timed_out: error.is_timeout(),
        }
    }
}

impl fmt::Display for LayerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.layer, self.message)
    }
}

#[derive(Error, Debug)]
pub enum FallbackError {
    #[error("Both processing methods failed ({})", describe(failures))]
    Exhausted { failures: Vec<LayerFailure> },

    #[error("Remote provider unavailable: {0}")]
    RemoteUnavailable(PoolError),
}

fn describe(failures: &[LayerFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl FallbackError {
    /// Whether any attempted layer ran out of time
    pub fn timed_out(&self) -> bool {
        match self {
            FallbackError::Exhausted { failures } => failures.iter().any(|f| f.timed_out),
            FallbackError::RemoteUnavailable(err) => err.is_timeout(),
        }
    }
}
