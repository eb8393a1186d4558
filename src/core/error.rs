//! Error types for the fare engine
//!
//! The core library returns [`FareError`]; CLI handlers wrap it in `anyhow`.

use thiserror::Error;

/// Result type alias using FareError
pub type Result<T> = std::result::Result<T, FareError>;

/// Errors raised by the fare engine and its storage
#[derive(Debug, Error)]
pub enum FareError {
    /// Backing key-value store failed
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Persisted payload could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No trip at the requested position or with the requested id
    #[error("Trip not found: {0}")]
    TripNotFound(String),

    /// Reported fare failed boundary validation
    #[error("Invalid fare: {0}")]
    InvalidFare(String),

    /// Configuration value outside its allowed range
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Store mutex was poisoned by a panicking writer
    #[error("Lock error: {0}")]
    Lock(String),
}
