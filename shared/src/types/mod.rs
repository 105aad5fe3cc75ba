//! Core domain types shared by the pool and the webserver

mod job;

pub use job::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use crate::errors::SharedError;

/// Global process identity used by the logging macros
static PROCESS_ID: OnceLock<ProcessId> = OnceLock::new();

/// Identity used when the binary never called an `init_*` function (tests, tools)
static UNSET_PROCESS_ID: ProcessId = ProcessId::Pool;

/// Identifies the component emitting a log line
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProcessId {
    /// The HTTP host process
    WebServer,
    /// Pool-level bookkeeping inside the host process
    Pool,
    /// A pooled worker process
    Worker { tier: Tier, worker: u64 },
    /// A one-shot direct-spawn run, keyed by its session id prefix
    DirectRun(String),
}

impl ProcessId {
    /// Initialize the global process ID for the webserver host
    pub fn init_webserver() -> &'static ProcessId {
        PROCESS_ID.get_or_init(|| ProcessId::WebServer)
    }

    /// Get the global process ID, falling back to `pool` when never initialized
    pub fn current() -> &'static ProcessId {
        PROCESS_ID.get().unwrap_or(&UNSET_PROCESS_ID)
    }

    pub fn worker(tier: Tier, worker: u64) -> Self {
        ProcessId::Worker { tier, worker }
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessId::WebServer => write!(f, "webserver"),
            ProcessId::Pool => write!(f, "pool"),
            ProcessId::Worker { tier, worker } => write!(f, "worker_{tier}_{worker}"),
            ProcessId::DirectRun(session) => write!(f, "direct_{session}"),
        }
    }
}

/// Subscription plan deciding pool capacity and per-request timeout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Basic,
    Gold,
    Premium,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Basic, Tier::Gold, Tier::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Gold => "gold",
            Tier::Premium => "premium",
        }
    }

    /// Maximum number of live workers the pool keeps for this tier
    pub fn max_workers(&self) -> usize {
        match self {
            Tier::Basic => 1,
            Tier::Gold => 3,
            Tier::Premium => 5,
        }
    }

    /// How long a request may wait for its worker's response
    pub fn timeout(&self) -> Duration {
        match self {
            Tier::Basic => Duration::from_secs(30),
            Tier::Gold => Duration::from_secs(45),
            Tier::Premium => Duration::from_secs(60),
        }
    }

    /// Only the highest tier keeps pre-warmed workers
    pub fn is_prewarmed(&self) -> bool {
        matches!(self, Tier::Premium)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = SharedError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Tier::Basic),
            "gold" => Ok(Tier::Gold),
            "premium" => Ok(Tier::Premium),
            _ => Err(SharedError::UnknownTier {
                input: input.to_string(),
            }),
        }
    }
}
