//! Order book infrastructure
//!
//! Two half-books plus an `order_id → (side, price)` index for O(1)
//! removal, and a registry holding the full state of every resting order.
//! The index and registry are owned exclusively by the book; nothing else
//! holds back-references into the ladders.

pub mod ask_book;
pub mod bid_book;
pub mod price_level;

pub use ask_book::AskBook;
pub use bid_book::BidBook;
pub use price_level::PriceLevel;

use std::collections::HashMap;

use types::ids::{InstrumentId, OrderId};
use types::numeric::{Price, Quantity};
use types::order::{Order, Side};
use types::snapshot::{BookSnapshot, SnapshotLevel};

/// The resting state of one instrument.
///
/// Every order in the book is active (`open` or `partially_filled`) with
/// positive remaining quantity; levels never exist empty.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    bids: BidBook,
    asks: AskBook,
    /// Side and price of each resting order, for O(1) removal.
    index: HashMap<OrderId, (Side, Price)>,
    /// Full order state, keyed by id.
    orders: HashMap<OrderId, Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resting order into its ladder, creating the level if
    /// needed. Appends at the tail of the level (time priority).
    ///
    /// # Panics
    /// Panics if the order is not an active limit order or the id is
    /// already resting.
    pub fn insert(&mut self, order: Order) {
        assert!(order.status.is_active(), "only active orders may rest");
        assert!(
            order.remaining().is_positive(),
            "resting order must have remaining quantity"
        );
        let price = order.limit_price();
        let prior = self
            .index
            .insert(order.order_id, (order.side, price));
        assert!(prior.is_none(), "order already resting");

        match order.side {
            Side::Buy => self.bids.insert(price, order.order_id, order.remaining()),
            Side::Sell => self.asks.insert(price, order.order_id, order.remaining()),
        }
        self.orders.insert(order.order_id, order);
    }

    /// Remove an order by id in O(1) ladder lookups. Drops the level if it
    /// becomes empty. Returns the removed order.
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Order> {
        let (side, price) = self.index.remove(order_id)?;
        match side {
            Side::Buy => self.bids.remove(order_id, price),
            Side::Sell => self.asks.remove(order_id, price),
        };
        self.orders.remove(order_id)
    }

    /// The head order of the best level on the given side, or None.
    pub fn peek_best(&self, side: Side) -> Option<&Order> {
        let (_, order_id, _) = match side {
            Side::Buy => self.bids.best_front()?,
            Side::Sell => self.asks.best_front()?,
        };
        self.orders.get(&order_id)
    }

    /// Apply a fill to the head order of the best level on `side`,
    /// returning its post-fill snapshot. Fully filled orders leave the
    /// book; exhausted levels are dropped.
    ///
    /// # Panics
    /// Panics if that side is empty or the fill exceeds the head order's
    /// remaining quantity.
    pub fn fill_best(&mut self, side: Side, fill: Quantity, timestamp: i64) -> Order {
        let (_, order_id, _) = match side {
            Side::Buy => self.bids.best_front(),
            Side::Sell => self.asks.best_front(),
        }
        .expect("fill on empty half-book");

        let order = self
            .orders
            .get_mut(&order_id)
            .expect("ladder entry without registry order");
        order.apply_fill(fill, timestamp);
        let snapshot = order.clone();

        match side {
            Side::Buy => self.bids.fill_best(fill),
            Side::Sell => self.asks.fill_best(fill),
        }
        if snapshot.is_filled() {
            self.orders.remove(&order_id);
            self.index.remove(&order_id);
        }
        snapshot
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best_price()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best_price()
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.index.contains_key(order_id)
    }

    pub fn get(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    /// Number of resting orders.
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Aggregated top-N view with running cumulative depth per side.
    pub fn snapshot(
        &self,
        instrument: InstrumentId,
        levels: usize,
        timestamp: i64,
    ) -> BookSnapshot {
        BookSnapshot {
            instrument,
            bids: aggregate(self.bids.depth(levels)),
            asks: aggregate(self.asks.depth(levels)),
            best_bid: self.bids.best_price(),
            best_ask: self.asks.best_price(),
            timestamp,
        }
    }
}

fn aggregate(depth: Vec<(Price, Quantity, u32)>) -> Vec<SnapshotLevel> {
    let mut cumulative = rust_decimal::Decimal::ZERO;
    depth
        .into_iter()
        .map(|(price, quantity, order_count)| {
            cumulative += quantity.as_decimal();
            SnapshotLevel {
                price,
                quantity: quantity.as_decimal(),
                cumulative,
                order_count,
            }
        })
        .collect()
}
