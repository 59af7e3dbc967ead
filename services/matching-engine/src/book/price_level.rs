//! Price level with FIFO queue
//!
//! A level holds every resting order at one price, in arrival order. Time
//! priority is the queue order; the head is always the next to match.

use std::collections::VecDeque;
use types::ids::OrderId;
use types::numeric::Quantity;

/// Entry in the price level queue.
#[derive(Debug, Clone)]
struct LevelEntry {
    order_id: OrderId,
    remaining: Quantity,
}

/// All orders resting at a single price, FIFO.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    orders: VecDeque<LevelEntry>,
    /// Cached sum of `remaining` across the queue.
    total_quantity: Quantity,
}

impl PriceLevel {
    pub fn new() -> Self {
        Self {
            orders: VecDeque::new(),
            total_quantity: Quantity::zero(),
        }
    }

    /// Append an order at the back of the queue.
    pub fn push_back(&mut self, order_id: OrderId, remaining: Quantity) {
        self.orders.push_back(LevelEntry {
            order_id,
            remaining,
        });
        self.total_quantity = self.total_quantity + remaining;
    }

    /// Remove an order by id, returning its remaining quantity.
    pub fn remove(&mut self, order_id: &OrderId) -> Option<Quantity> {
        let position = self
            .orders
            .iter()
            .position(|entry| &entry.order_id == order_id)?;
        let entry = self.orders.remove(position)?;
        self.total_quantity = self.total_quantity - entry.remaining;
        Some(entry.remaining)
    }

    /// The head of the queue: next order to match at this price.
    pub fn front(&self) -> Option<(OrderId, Quantity)> {
        self.orders
            .front()
            .map(|entry| (entry.order_id, entry.remaining))
    }

    /// Reduce the head order's remaining quantity by a fill. The entry is
    /// dropped once fully consumed.
    ///
    /// # Panics
    /// Panics if the level is empty or the fill exceeds the head's
    /// remaining quantity.
    pub fn fill_front(&mut self, fill: Quantity) {
        let entry = self.orders.front_mut().expect("fill on empty level");
        entry.remaining = entry.remaining - fill;
        self.total_quantity = self.total_quantity - fill;
        if entry.remaining.is_zero() {
            self.orders.pop_front();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn total_quantity(&self) -> Quantity {
        self.total_quantity
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}

impl Default for PriceLevel {
    fn default() -> Self {
        Self::new()
    }
}
