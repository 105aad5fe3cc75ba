//! CV optimization job and result types
//!
//! Field names follow the JSON contract spoken by the HTTP clients, the worker
//! processes and the remote provider (camelCase, `currentCV`, `optimizedCV`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::Tier;

/// Version string stamped into result metadata
pub const API_VERSION: &str = "2.1.0";

/// One caller's CV optimization job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeJob {
    #[serde(rename = "currentCV")]
    pub current_cv: String,
    pub email: String,
    #[serde(default)]
    pub job_posting: String,
    #[serde(default = "default_session_id")]
    pub session_id: String,
    #[serde(default)]
    pub plan: Tier,
    #[serde(default = "default_template")]
    pub template: String,
}

fn default_session_id() -> String {
    "unknown".to_string()
}

fn default_template() -> String {
    "standard".to_string()
}

impl OptimizeJob {
    pub fn new(current_cv: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            current_cv: current_cv.into(),
            email: email.into(),
            job_posting: String::new(),
            session_id: default_session_id(),
            plan: Tier::default(),
            template: default_template(),
        }
    }

    pub fn with_job_posting(mut self, job_posting: impl Into<String>) -> Self {
        self.job_posting = job_posting.into();
        self
    }

    pub fn with_plan(mut self, plan: Tier) -> Self {
        self.plan = plan;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn has_job_posting(&self) -> bool {
        !self.job_posting.trim().is_empty()
    }
}

/// Which layer of the fallback chain produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingLayer {
    Pool,
    DirectSpawn,
    Remote,
}

impl fmt::Display for ProcessingLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingLayer::Pool => write!(f, "pool"),
            ProcessingLayer::DirectSpawn => write!(f, "direct_spawn"),
            ProcessingLayer::Remote => write!(f, "remote"),
        }
    }
}

/// Optimized CV plus everything the UI renders around it
///
/// Every field is optional on the wire so that results from any layer
/// (pooled worker, CLI artifacts, remote provider) deserialize; unknown
/// fields are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    #[serde(rename = "optimizedCV", default)]
    pub optimized_cv: String,
    #[serde(default)]
    pub improvements: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ats_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_match: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscores: Option<Value>,
    #[serde(default)]
    pub cover_letter: String,
    #[serde(default)]
    pub suggestions: Vec<Value>,
    #[serde(default)]
    pub metadata: ResultMetadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Provenance and timing information attached to a result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<ProcessingLayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pooled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_used: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_failed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_uses: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_processing_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python_enabled: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultMetadata {
    /// Stamp the fields every processing layer sets
    pub fn stamp(
        &mut self,
        provider: &str,
        layer: ProcessingLayer,
        processing_time_ms: u64,
        plan: Tier,
        template: &str,
    ) {
        self.provider = Some(provider.to_string());
        self.layer = Some(layer);
        self.processing_time = Some(processing_time_ms);
        self.version = Some(API_VERSION.to_string());
        self.plan = Some(plan.to_string());
        self.template = Some(template.to_string());
    }
}
