//! HTTP client for the remote AI optimization endpoint

use std::time::Duration;

use crate::error::{PoolError, PoolResult};
use crate::traits::{RemoteProvider, RemoteRequest};
use shared::{process_debug, OptimizationResult, ProcessId};

/// Remote calls can take as long as a model needs, within reason
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(120);

/// Posts jobs to a remote optimization endpoint
#[derive(Debug, Clone)]
pub struct HttpRemoteProvider {
    url: String,
    client: reqwest::Client,
}

impl HttpRemoteProvider {
    pub fn new(url: impl Into<String>) -> PoolResult<Self> {
        Self::with_timeout(url, DEFAULT_REMOTE_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> PoolResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url: url.into(), client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl RemoteProvider for HttpRemoteProvider {
    async fn optimize(&self, request: &RemoteRequest) -> PoolResult<OptimizationResult> {
        process_debug!(ProcessId::current(), "🔄 Calling remote provider at {}", self.url);

        let response = self.client.post(&self.url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PoolError::Remote {
                status: Some(status.as_u16()),
                message: format!("remote API failed: {} {}", status.as_u16(), body.trim()),
            });
        }

        let mut result: OptimizationResult = response.json().await?;
        // the envelope flag belongs to the caller's response, not the result
        result.extra.remove("success");
        Ok(result)
    }
}
