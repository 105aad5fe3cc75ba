//! Process- and network-backed implementations of the pool traits

pub mod direct_runner;
pub mod remote_provider;
pub mod worker_pool;
pub mod worker_process;

pub use direct_runner::{CliRunner, DEFAULT_DIRECT_TIMEOUT};
pub use remote_provider::{HttpRemoteProvider, DEFAULT_REMOTE_TIMEOUT};
pub use worker_pool::{WorkerPool, PREWARM_WORKERS, RETIRE_AFTER_REQUESTS, SHUTDOWN_GRACE};
pub use worker_process::WorkerCommand;
