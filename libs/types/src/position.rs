//! Per-client position accumulation
//!
//! Positions are derived purely from the trade stream: a buy adds quantity
//! to the net and cost, a sell subtracts both. Signed decimals throughout.

use crate::ids::{ClientId, InstrumentId};
use crate::numeric::{Price, Quantity};
use crate::order::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Net position of one client on one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub client_id: ClientId,
    pub instrument: InstrumentId,
    /// Signed net quantity (positive long, negative short).
    pub net_quantity: Decimal,
    /// Signed accumulated cost (Σ ±price·quantity).
    pub total_cost: Decimal,
    pub last_updated: i64,
}

impl Position {
    /// A flat (zero) position.
    pub fn flat(client_id: ClientId, instrument: InstrumentId) -> Self {
        Self {
            client_id,
            instrument,
            net_quantity: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            last_updated: 0,
        }
    }

    /// Apply one trade leg.
    pub fn apply(&mut self, side: Side, price: Price, quantity: Quantity, timestamp: i64) {
        let qty = quantity.as_decimal();
        let cost = price.as_decimal() * qty;
        match side {
            Side::Buy => {
                self.net_quantity += qty;
                self.total_cost += cost;
            }
            Side::Sell => {
                self.net_quantity -= qty;
                self.total_cost -= cost;
            }
        }
        self.last_updated = timestamp;
    }

    pub fn is_flat(&self) -> bool {
        self.net_quantity == Decimal::ZERO
    }
}
