//! Test helpers for building pools and runners around script workers

use pool::{CliRunner, WorkerCommand, WorkerPool};
use std::path::Path;
use std::time::Duration;

pub struct TestHelpers;

#[allow(dead_code)]
impl TestHelpers {
    /// Command running an inline `sh` script
    pub fn script(script: &str) -> WorkerCommand {
        WorkerCommand::new("sh", ["-c", script, "worker"])
    }

    pub fn pool(script: &str) -> WorkerPool {
        WorkerPool::new(Self::script(script)).with_shutdown_grace(Duration::from_millis(200))
    }

    pub fn pool_with_delay(script: &str, delay_secs: &str) -> WorkerPool {
        WorkerPool::new(Self::script(script).with_env("WORKER_DELAY", delay_secs))
            .with_shutdown_grace(Duration::from_millis(200))
    }

    pub fn runner(script: &str, temp_root: &Path) -> CliRunner {
        CliRunner::new(Self::script(script), temp_root)
    }

    /// Poll `condition` until it holds or `limit` passes
    pub async fn wait_for(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        condition()
    }

    /// Entries left in a temp root
    pub fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }
}
