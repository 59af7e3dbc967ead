//! Matching engine
//!
//! Per-instrument price-time priority matching. One engine owns one book;
//! commands are serialized on a dedicated task so every match is atomic
//! from the outside.
//!
//! **Key invariants:**
//! - Price-time priority strictly enforced
//! - Trades execute at the resting order's price
//! - No crossed book at rest
//! - No empty price levels

pub mod book;
pub mod engine;
pub mod handle;

pub use book::OrderBook;
pub use engine::{Engine, Fill, MatchOutcome};
pub use handle::{EngineClosed, EngineHandle};
