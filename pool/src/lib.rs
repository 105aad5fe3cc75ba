//! Process pool library for CV optimization workers
//!
//! Keeps a bounded set of long-lived worker processes per subscription tier,
//! multiplexes requests over their stdio by correlation id, and wraps the
//! pool in a fallback chain (pooled worker, direct CLI run, remote provider).

pub mod core;
pub mod error;
pub mod fallback;
pub mod services;
pub mod traits;

// Re-export commonly used types
pub use error::{FallbackError, LayerFailure, PoolError, PoolResult};
pub use fallback::{FallbackOrchestrator, DIRECT_PROVIDER, POOL_PROVIDER, REMOTE_PROVIDER};
pub use services::{CliRunner, HttpRemoteProvider, WorkerCommand, WorkerPool};
pub use traits::{DirectRunner, PoolStats, ProcessPool, RemoteProvider, RemoteRequest, TierStats};
