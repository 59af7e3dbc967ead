//! Order lifecycle types
//!
//! An order is created `open`, mutated only by the owning engine (fills) or
//! the coordinator (cancel, reject), and never destroyed. Terminal states
//! are absorbing.

use crate::ids::{ClientId, InstrumentId, OrderId};
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type
///
/// Limit orders rest when unmatched; market orders never rest and the
/// unfilled remainder is rejected for lack of liquidity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Accepted, no fills yet
    Open,
    /// Some quantity filled, remainder outstanding
    PartiallyFilled,
    /// Completely filled (terminal)
    Filled,
    /// Cancelled by the client or the system (terminal)
    Cancelled,
    /// Rejected, e.g. a market order out of liquidity (terminal)
    Rejected,
}

impl OrderStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    /// Active orders are the only ones eligible to rest in a book.
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::PartiallyFilled)
    }
}

/// Complete order record
///
/// `price` is present iff `order_type` is `Limit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub client_id: ClientId,
    pub instrument: InstrumentId,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    pub status: OrderStatus,
    pub idempotency_key: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Create a new open limit order.
    pub fn new_limit(
        order_id: OrderId,
        client_id: ClientId,
        instrument: InstrumentId,
        side: Side,
        price: Price,
        quantity: Quantity,
        timestamp: i64,
    ) -> Self {
        Self {
            order_id,
            client_id,
            instrument,
            side,
            order_type: OrderType::Limit,
            price: Some(price),
            quantity,
            filled_quantity: Quantity::zero(),
            status: OrderStatus::Open,
            idempotency_key: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Create a new open market order.
    pub fn new_market(
        order_id: OrderId,
        client_id: ClientId,
        instrument: InstrumentId,
        side: Side,
        quantity: Quantity,
        timestamp: i64,
    ) -> Self {
        Self {
            order_id,
            client_id,
            instrument,
            side,
            order_type: OrderType::Market,
            price: None,
            quantity,
            filled_quantity: Quantity::zero(),
            status: OrderStatus::Open,
            idempotency_key: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Quantity still outstanding.
    pub fn remaining(&self) -> Quantity {
        self.quantity - self.filled_quantity
    }

    pub fn is_filled(&self) -> bool {
        self.filled_quantity == self.quantity
    }

    pub fn has_fills(&self) -> bool {
        !self.filled_quantity.is_zero()
    }

    /// Check the quantity/status relationship.
    pub fn check_invariant(&self) -> bool {
        if self.filled_quantity > self.quantity {
            return false;
        }
        match self.status {
            OrderStatus::Filled => self.is_filled(),
            OrderStatus::PartiallyFilled => self.has_fills() && !self.is_filled(),
            OrderStatus::Open => !self.has_fills(),
            // Terminal by cancel/reject may carry any partial fill
            OrderStatus::Cancelled | OrderStatus::Rejected => !self.is_filled(),
        }
    }

    /// The price of a limit order.
    ///
    /// # Panics
    /// Panics on a market order; resting orders are always limit.
    pub fn limit_price(&self) -> Price {
        self.price.expect("limit order carries a price")
    }

    /// Apply a fill and advance the status.
    ///
    /// # Panics
    /// Panics if the fill exceeds the outstanding quantity or the order is
    /// not active.
    pub fn apply_fill(&mut self, fill: Quantity, timestamp: i64) {
        assert!(self.status.is_active(), "fill on non-active order");
        assert!(
            fill.is_positive() && fill <= self.remaining(),
            "fill exceeds outstanding quantity"
        );

        self.filled_quantity = self.filled_quantity + fill;
        self.status = if self.is_filled() {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = timestamp;
    }

    /// Cancel the order.
    ///
    /// # Panics
    /// Panics if the order is already terminal.
    pub fn cancel(&mut self, timestamp: i64) {
        assert!(!self.status.is_terminal(), "cancel on terminal order");
        self.status = OrderStatus::Cancelled;
        self.updated_at = timestamp;
    }

    /// Reject the order (market residual out of liquidity). Partial fills
    /// already applied are retained.
    ///
    /// # Panics
    /// Panics if the order is already terminal.
    pub fn reject(&mut self, timestamp: i64) {
        assert!(!self.status.is_terminal(), "reject on terminal order");
        self.status = OrderStatus::Rejected;
        self.updated_at = timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit_order(side: Side, price: u64, qty: &str) -> Order {
        Order::new_limit(
            OrderId::new(),
            ClientId::new(),
            InstrumentId::new("BTC/USD"),
            side,
            Price::from_u64(price),
            Quantity::from_str(qty).unwrap(),
            1_708_123_456_789_000_000,
        )
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_new_order_is_open() {
        let order = limit_order(Side::Buy, 70000, "1.0");
        assert_eq!(order.status, OrderStatus::Open);
        assert!(order.check_invariant());
        assert!(!order.has_fills());
        assert_eq!(order.remaining(), Quantity::from_str("1.0").unwrap());
    }

    #[test]
    fn test_market_order_has_no_price() {
        let order = Order::new_market(
            OrderId::new(),
            ClientId::new(),
            InstrumentId::new("BTC/USD"),
            Side::Sell,
            Quantity::from_str("0.5").unwrap(),
            1_708_123_456_789_000_000,
        );
        assert_eq!(order.order_type, OrderType::Market);
        assert!(order.price.is_none());
    }

    #[test]
    fn test_fill_transitions() {
        let mut order = limit_order(Side::Buy, 70000, "1.0");

        order.apply_fill(Quantity::from_str("0.3").unwrap(), 1);
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.remaining(), Quantity::from_str("0.7").unwrap());
        assert!(order.check_invariant());

        order.apply_fill(Quantity::from_str("0.7").unwrap(), 2);
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.is_filled());
        assert!(order.check_invariant());
    }

    #[test]
    #[should_panic(expected = "fill exceeds outstanding quantity")]
    fn test_overfill_panics() {
        let mut order = limit_order(Side::Buy, 70000, "1.0");
        order.apply_fill(Quantity::from_str("1.5").unwrap(), 1);
    }

    #[test]
    #[should_panic(expected = "fill on non-active order")]
    fn test_fill_after_cancel_panics() {
        let mut order = limit_order(Side::Buy, 70000, "1.0");
        order.cancel(1);
        order.apply_fill(Quantity::from_str("0.5").unwrap(), 2);
    }

    #[test]
    fn test_cancel_retains_fills() {
        let mut order = limit_order(Side::Sell, 70000, "1.0");
        order.apply_fill(Quantity::from_str("0.4").unwrap(), 1);
        order.cancel(2);

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.filled_quantity, Quantity::from_str("0.4").unwrap());
        assert!(order.status.is_terminal());
        assert!(order.check_invariant());
    }

    #[test]
    #[should_panic(expected = "cancel on terminal order")]
    fn test_cancel_terminal_panics() {
        let mut order = limit_order(Side::Buy, 70000, "1.0");
        order.apply_fill(Quantity::from_str("1.0").unwrap(), 1);
        order.cancel(2);
    }

    #[test]
    fn test_reject_market_residual() {
        let mut order = Order::new_market(
            OrderId::new(),
            ClientId::new(),
            InstrumentId::new("BTC/USD"),
            Side::Buy,
            Quantity::from_str("1.0").unwrap(),
            0,
        );
        order.apply_fill(Quantity::from_str("0.5").unwrap(), 1);
        order.reject(2);

        assert_eq!(order.status, OrderStatus::Rejected);
        assert_eq!(order.filled_quantity, Quantity::from_str("0.5").unwrap());
        assert!(order.check_invariant());
    }

    #[test]
    fn test_status_predicates() {
        assert!(OrderStatus::Open.is_active());
        assert!(OrderStatus::PartiallyFilled.is_active());
        assert!(!OrderStatus::Filled.is_active());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::Open.is_terminal());
    }

    #[test]
    fn test_order_serialization() {
        let order = limit_order(Side::Sell, 70000, "2.5");
        let json = serde_json::to_string(&order).unwrap();
        assert!(json.contains("\"sell\""));
        assert!(json.contains("\"open\""));

        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order, deserialized);
    }
}
