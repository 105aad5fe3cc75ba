//! Request handlers

pub mod api;

pub use api::{analyze_cv, health, method_not_allowed, preflight};
