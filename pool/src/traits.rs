//! Service seams of the pool crate
//!
//! The fallback chain and the HTTP host only see these traits, so tests can
//! swap real processes and network calls for mocks.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{OptimizationResult, OptimizeJob, Tier};

use crate::error::PoolResult;

/// Snapshot of one tier's workers and queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStats {
    pub tier: Tier,
    pub workers: usize,
    pub busy: usize,
    pub idle: usize,
    pub queued: usize,
    pub max_workers: usize,
}

impl TierStats {
    pub fn empty(tier: Tier) -> Self {
        Self {
            tier,
            workers: 0,
            busy: 0,
            idle: 0,
            queued: 0,
            max_workers: tier.max_workers(),
        }
    }
}

/// Snapshot of the whole pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub initialized: bool,
    pub tiers: Vec<TierStats>,
}

impl PoolStats {
    pub fn tier(&self, tier: Tier) -> Option<&TierStats> {
        self.tiers.iter().find(|stats| stats.tier == tier)
    }

    pub fn total_workers(&self) -> usize {
        self.tiers.iter().map(|stats| stats.workers).sum()
    }
}

/// Body sent to the remote optimization endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRequest {
    #[serde(rename = "currentCV")]
    pub current_cv: String,
    pub job_posting: String,
    pub email: String,
}

impl From<&OptimizeJob> for RemoteRequest {
    fn from(job: &OptimizeJob) -> Self {
        Self {
            current_cv: job.current_cv.clone(),
            job_posting: job.job_posting.clone(),
            email: job.email.clone(),
        }
    }
}

/// Bounded per-tier pool of long-lived worker processes
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProcessPool: Send + Sync {
    /// Pre-warm the highest tier; later calls are no-ops
    fn initialize(&self);

    /// Run one job on a worker of `tier` and return the worker's raw result
    async fn submit(&self, job: OptimizeJob, tier: Tier) -> PoolResult<Value>;

    fn stats(&self) -> PoolStats;

    /// Terminate every worker and reject everything still queued
    async fn shutdown(&self);
}

/// One-shot, non-pooled invocation of the worker CLI
#[mockall::automock]
#[async_trait::async_trait]
pub trait DirectRunner: Send + Sync {
    async fn run(&self, job: &OptimizeJob, tier: Tier, template: &str) -> PoolResult<OptimizationResult>;
}

/// Remote AI provider used when local processing is unavailable
#[mockall::automock]
#[async_trait::async_trait]
pub trait RemoteProvider: Send + Sync {
    async fn optimize(&self, request: &RemoteRequest) -> PoolResult<OptimizationResult>;
}
