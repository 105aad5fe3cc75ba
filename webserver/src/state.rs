//! Shared handler state

use pool::FallbackOrchestrator;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::traits::UsageLedger;

/// State handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: FallbackOrchestrator,
    pub ledger: Option<Arc<dyn UsageLedger>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config, orchestrator: FallbackOrchestrator) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            ledger: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn UsageLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
