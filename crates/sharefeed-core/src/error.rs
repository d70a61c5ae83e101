//! Error types for sharefeed-core

use thiserror::Error;

/// Result type alias using sharefeed-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sharefeed-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A cached alert record could not be rebuilt
    #[error("Cannot decode alert record {record_id}: {reason}")]
    Decode { record_id: u32, reason: String },

    /// `start_provisional` called while a provisional window is open
    #[error("Provisional mode is already active")]
    ProvisionalAlreadyActive,

    /// `eval_provisional` called without a matching `start_provisional`
    #[error("Provisional mode is not active")]
    ProvisionalNotActive,
}
