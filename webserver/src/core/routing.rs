//! Which processing path a request takes

use shared::{process_debug, ProcessId, Tier};

use crate::config::Config;
use crate::types::UserAccount;

/// Processing path for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Pool, then direct CLI, then remote provider
    FullChain,
    /// Remote provider only
    RemoteOnly,
}

pub fn choose_route(config: &Config, tier: Tier) -> Route {
    if !config.enable_python_processing {
        return Route::RemoteOnly;
    }
    match tier {
        Tier::Gold | Tier::Premium => Route::FullChain,
        Tier::Basic if config.basic_uses_pool => Route::FullChain,
        Tier::Basic => Route::RemoteOnly,
    }
}

/// The plan on the caller's account wins over the plan in the request
pub fn resolve_tier(requested: Tier, account: Option<&UserAccount>) -> Tier {
    let Some(plan) = account.and_then(|account| account.plan.as_deref()) else {
        return requested;
    };
    match plan.parse::<Tier>() {
        Ok(tier) => tier,
        Err(_) => {
            process_debug!(ProcessId::current(), "Ignoring unrecognised billing plan {:?}", plan);
            requested
        }
    }
}
