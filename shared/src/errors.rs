//! Shared error types for the CV optimization service

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Unknown tier: {input}")]
    UnknownTier { input: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Message protocol error: {message}")]
    ProtocolError { message: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
