//! Core business logic modules
//!
//! Pure request logic with no I/O dependencies

pub mod routing;
pub mod validation;

// Re-export commonly used types
pub use routing::{choose_route, resolve_tier, Route};
pub use validation::{validate, ValidatedRequest};
