//! Shared types for the CV optimization service
//!
//! Contains the domain types passed between the HTTP host, the worker pool
//! and the external worker processes, plus the common logging setup.

pub mod errors;
pub mod logging;
pub mod messages;
pub mod types;

pub use errors::*;
pub use types::*;

pub use messages::{WorkerRequest, WorkerResponse, OPTIMIZE_ACTION};
