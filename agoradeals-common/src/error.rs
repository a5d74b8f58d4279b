// ================================================================
// File: agoradeals-common/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed request fields.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Caller is not the owner / merchant of record.
    #[error("{0}")]
    Forbidden(String),

    /// Operation is invalid for the entity's current state
    /// (already redeemed, already consumed, deal inactive, ...).
    #[error("{0}")]
    Conflict(String),

    /// The ledger service rejected or failed the operation.
    #[error("{0}")]
    Ledger(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True for errors caused by the request itself rather than by
    /// the store or an upstream service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::NotFound(_) | Error::Forbidden(_) | Error::Conflict(_)
        )
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Error::Validation(format!("Invalid hex value: {}", err))
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Config(e.to_string())
    }
}
