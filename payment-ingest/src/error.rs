//! Error types for payment ingestion

use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ingestion errors
#[derive(Error, Debug)]
pub enum Error {
    /// Core accounting error
    #[error("core error: {0}")]
    Core(#[from] funding_core::Error),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Core(err) => err.code(),
        }
    }
}
