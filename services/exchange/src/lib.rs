//! Exchange coordinator
//!
//! The only surface external callers interact with. Owns the per-instrument
//! engines, enforces idempotency, drives persistence and event publication,
//! rebuilds warm books from durable state on startup, and captures periodic
//! book snapshots.
//!
//! # Modules
//! - `config`: tunables with production defaults
//! - `coordinator`: command routing, persistence ordering, publication
//! - `recovery`: cold-start rebuild from the record store
//! - `scheduler`: periodic and on-demand snapshot capture

pub mod config;
pub mod coordinator;
pub mod recovery;
pub mod scheduler;

pub use config::ExchangeConfig;
pub use coordinator::{Exchange, OrderInput, SubmitReceipt};
pub use recovery::RecoveryReport;
pub use scheduler::SnapshotScheduler;
