//! FanVault Deadline Sweeper
//!
//! Periodic resolver for campaigns whose deadline has passed: lock
//! funding when the goal was met, refund otherwise. The sweeper is just
//! one more concurrent actor against the store; the per-campaign row
//! locks in the core serialize it with contributors and manual lockers,
//! so it assumes no exclusivity.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod sweeper;

// Re-exports
pub use config::SweepConfig;
pub use error::{Error, Result};
pub use sweeper::Sweeper;
