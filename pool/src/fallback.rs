//! Fallback chain: pooled worker, then a direct CLI run, then the remote provider
//!
//! Layers are tried in order and the first success wins. Every failure is
//! logged with its layer and kept, so a fully exhausted chain reports what
//! went wrong at each step.

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{FallbackError, LayerFailure, PoolError, PoolResult};
use crate::traits::{DirectRunner, ProcessPool, RemoteProvider, RemoteRequest};
use shared::{
    process_error, process_info, process_warn, OptimizationResult, OptimizeJob, ProcessId, ProcessingLayer, Tier,
};

pub const POOL_PROVIDER: &str = "CVPerfect Python Pool v2.0";
pub const DIRECT_PROVIDER: &str = "CVPerfect Python CLI (Fallback)";
pub const REMOTE_PROVIDER: &str = "Remote AI (Fallback)";

/// Single entry point over the three processing layers
#[derive(Clone)]
pub struct FallbackOrchestrator {
    pool: Arc<dyn ProcessPool>,
    direct: Arc<dyn DirectRunner>,
    remote: Arc<dyn RemoteProvider>,
}

impl FallbackOrchestrator {
    pub fn new(pool: Arc<dyn ProcessPool>, direct: Arc<dyn DirectRunner>, remote: Arc<dyn RemoteProvider>) -> Self {
        Self { pool, direct, remote }
    }

    pub fn pool(&self) -> &Arc<dyn ProcessPool> {
        &self.pool
    }

    /// Run the full chain for one job
    pub async fn optimize(
        &self,
        job: &OptimizeJob,
        tier: Tier,
        template: &str,
    ) -> Result<OptimizationResult, FallbackError> {
        let process = ProcessId::current();
        let mut failures = Vec::new();

        let started = Instant::now();
        let submitted = job.clone().with_plan(tier).with_template(template);
        match self.pool.submit(submitted, tier).await.and_then(parse_worker_result) {
            Ok(mut result) => {
                let metadata = &mut result.metadata;
                metadata.stamp(POOL_PROVIDER, ProcessingLayer::Pool, elapsed_ms(started), tier, template);
                metadata.pooled = Some(true);
                process_info!(process, "✅ Python pool processing successful ({} plan)", tier);
                return Ok(result);
            }
            Err(err) => record(&mut failures, ProcessingLayer::Pool, err),
        }

        let started = Instant::now();
        match self.direct.run(job, tier, template).await {
            Ok(mut result) => {
                let metadata = &mut result.metadata;
                metadata.stamp(DIRECT_PROVIDER, ProcessingLayer::DirectSpawn, elapsed_ms(started), tier, template);
                metadata.fallback = Some(true);
                process_info!(process, "✅ Direct CLI fallback successful ({} plan)", tier);
                return Ok(result);
            }
            Err(err) => record(&mut failures, ProcessingLayer::DirectSpawn, err),
        }

        match self.call_remote(job, tier, template, true).await {
            Ok(result) => Ok(result),
            Err(err) => {
                record(&mut failures, ProcessingLayer::Remote, err);
                let err = FallbackError::Exhausted { failures };
                process_error!(process, "🚨 {}", err);
                Err(err)
            }
        }
    }

    /// Skip local processing and go straight to the remote provider
    pub async fn optimize_remote(
        &self,
        job: &OptimizeJob,
        tier: Tier,
        template: &str,
    ) -> Result<OptimizationResult, FallbackError> {
        self.call_remote(job, tier, template, false).await.map_err(|err| {
            process_error!(ProcessId::current(), "🚨 Remote processing failed: {}", err);
            FallbackError::RemoteUnavailable(err)
        })
    }

    async fn call_remote(
        &self,
        job: &OptimizeJob,
        tier: Tier,
        template: &str,
        python_attempted: bool,
    ) -> PoolResult<OptimizationResult> {
        let started = Instant::now();
        let mut result = self.remote.optimize(&RemoteRequest::from(job)).await?;

        let metadata = &mut result.metadata;
        metadata.stamp(REMOTE_PROVIDER, ProcessingLayer::Remote, elapsed_ms(started), tier, template);
        metadata.fallback_used = Some(true);
        if python_attempted {
            metadata.python_failed = Some(true);
        }
        process_info!(ProcessId::current(), "✅ Remote provider successful ({} plan)", tier);
        Ok(result)
    }
}

fn record(failures: &mut Vec<LayerFailure>, layer: ProcessingLayer, err: PoolError) {
    process_warn!(ProcessId::current(), "⚠️ {} layer failed: {}", layer, err);
    failures.push(LayerFailure::new(layer, &err));
}

fn parse_worker_result(raw: Value) -> PoolResult<OptimizationResult> {
    serde_json::from_value(raw).map_err(|err| PoolError::Protocol {
        message: format!("worker result has unexpected shape: {err}"),
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_worker_result_must_be_an_object() {
        let parsed = parse_worker_result(json!({"optimizedCV": "<p>ok</p>", "atsScore": 81})).unwrap();
        assert_eq!(parsed.optimized_cv, "<p>ok</p>");

        assert!(matches!(
            parse_worker_result(json!("plain string")),
            Err(PoolError::Protocol { .. })
        ));
    }
}
