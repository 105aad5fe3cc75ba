//! Type definitions for webserver
//!
//! Request and response bodies of the HTTP API plus the account record read
//! from the usage ledger.

use chrono::{DateTime, Utc};
use pool::PoolStats;
use serde::{Deserialize, Serialize};
use shared::OptimizationResult;

/// Body of `POST /api/analyze-python`
///
/// Every field is optional here so that missing values produce the API's own
/// validation messages instead of a deserializer error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(rename = "currentCV", default)]
    pub current_cv: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub job_posting: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
}

/// `{ success: true, ...result }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope {
    pub success: bool,
    #[serde(flatten)]
    pub result: OptimizationResult,
}

impl SuccessEnvelope {
    pub fn new(result: OptimizationResult) -> Self {
        Self { success: true, result }
    }
}

/// `{ success: false, error, details?, metadata }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub metadata: ErrorMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMetadata {
    pub processing_time: u64,
    pub timestamp: DateTime<Utc>,
    pub error_type: String,
}

/// Body of `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub python_enabled: bool,
    pub uptime_seconds: u64,
    pub pool: PoolStats,
}

/// Row of the ledger's `users` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub email: String,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub usage_count: i64,
    #[serde(default)]
    pub usage_limit: Option<i64>,
}

impl UserAccount {
    /// Uses left after the current request has been counted
    pub fn remaining_after_use(&self) -> Option<i64> {
        self.usage_limit.map(|limit| limit - (self.usage_count + 1))
    }
}
