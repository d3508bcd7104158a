//! Error types for the redemption tracker.
//!
//! Unknown ids are not errors inside the crate (lookups return `Option`);
//! they only become `ApiError` variants at the HTTP boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Persistence gateway failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the data file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The data file is not a valid ledger document
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Simulated failure (in-memory store)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the HTTP layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Credit card not found: {0}")]
    CardNotFound(String),

    #[error("Redemption {redemption_id} not found on card {card_id}")]
    RedemptionNotFound {
        card_id: String,
        redemption_id: String,
    },

    #[error("No summary for year {year} on card {card_id}")]
    SummaryNotFound { card_id: String, year: i32 },
}

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
