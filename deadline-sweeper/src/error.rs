//! Error types for the sweeper

use thiserror::Error;

/// Result type for sweeper operations
pub type Result<T> = std::result::Result<T, Error>;

/// Sweeper errors
#[derive(Error, Debug)]
pub enum Error {
    /// Core accounting error
    #[error("core error: {0}")]
    Core(#[from] funding_core::Error),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}
