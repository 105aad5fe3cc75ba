//! HTTP host for the CV optimization service
//!
//! Validates incoming requests, resolves the caller's tier, and hands the job
//! to the pool crate's fallback chain.

pub mod config;
pub mod core;
pub mod error;
pub mod services;
pub mod state;
pub mod traits;
pub mod types;
pub mod web;
pub mod webserver_impl;

// Re-export main types
pub use config::Config;
pub use error::{ApiError, WebServerError, WebServerResult};
pub use state::AppState;
pub use traits::UsageLedger;
pub use types::*;
pub use webserver_impl::WebServer;

// Re-export service implementations
pub use services::SupabaseLedger;
