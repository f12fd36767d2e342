//! Error types for the feed client.

use crate::types::ConnectionState;
use thiserror::Error;

/// Main error type for feed operations.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid state for {operation}: connection is {state}")]
    InvalidState {
        operation: &'static str,
        state: ConnectionState,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response status: {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::Parse(e.to_string())
    }
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
