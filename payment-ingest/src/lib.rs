//! FanVault Payment Ingestion
//!
//! Translates externally delivered payment-provider events into wallet
//! and campaign effects exactly once. Providers may deliver the same
//! event many times, concurrently; the combination of a short-lived TTL
//! lock and a write-once dedup row guarantees each distinct payment id
//! produces side effects at most once.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod error;
pub mod event;
pub mod ingest;
pub mod locks;

// Re-exports
pub use error::{Error, Result};
pub use event::{PaymentEvent, PaymentKind};
pub use ingest::{IngestOutcome, Ingestor};
pub use locks::{InMemoryLockService, LockService};
