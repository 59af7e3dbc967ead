//! Aggregated order book depth views
//!
//! A snapshot is a top-N view of one book: per price level the summed
//! resting quantity, a running cumulative, and the order count. Snapshots
//! are advisory; the order and trade records stay authoritative.

use crate::ids::InstrumentId;
use crate::numeric::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One aggregated price level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotLevel {
    pub price: Price,
    /// Sum of remaining quantity across all orders at this price.
    pub quantity: Decimal,
    /// Running total from the best level outward.
    pub cumulative: Decimal,
    /// Number of resting orders at this price.
    pub order_count: u32,
}

/// Top-N aggregated view of one instrument's book.
///
/// Bids are ordered best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub instrument: InstrumentId,
    pub bids: Vec<SnapshotLevel>,
    pub asks: Vec<SnapshotLevel>,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    /// Wall-clock capture time, Unix nanoseconds.
    pub timestamp: i64,
}

impl BookSnapshot {
    /// An empty snapshot for an instrument with no book yet.
    pub fn empty(instrument: InstrumentId, timestamp: i64) -> Self {
        Self {
            instrument,
            bids: Vec::new(),
            asks: Vec::new(),
            best_bid: None,
            best_ask: None,
            timestamp,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

/// A snapshot as persisted, sealed with an integrity checksum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub snapshot: BookSnapshot,
    /// SHA-256 over the level data, hex-encoded.
    pub checksum: String,
}

impl SnapshotRecord {
    pub fn new(snapshot: BookSnapshot, checksum: String) -> Self {
        Self { snapshot, checksum }
    }
}
