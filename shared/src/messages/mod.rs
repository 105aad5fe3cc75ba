//! Wire messages exchanged with external worker processes

pub mod worker;

pub use worker::{WorkerRequest, WorkerResponse, OPTIMIZE_ACTION};
