//! Single-instrument matching core
//!
//! Processes one command at a time against the book: match an incoming
//! order under price-time priority, cancel a resting order, or capture an
//! aggregated snapshot. The taker always trades at the maker's price.

use types::ids::{InstrumentId, OrderId};
use types::numeric::Price;
use types::order::{Order, OrderType, Side};
use types::snapshot::BookSnapshot;
use types::trade::Trade;

use crate::book::OrderBook;

/// One fill produced during matching: the trade plus post-fill snapshots
/// of both sides.
#[derive(Debug, Clone)]
pub struct Fill {
    pub trade: Trade,
    /// Resting order state after this fill.
    pub maker: Order,
    /// Incoming order state after this fill.
    pub taker: Order,
}

/// Result of submitting one order.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Final state of the submitted order.
    pub order: Order,
    /// Fills in execution order; empty when the order rested untouched.
    pub fills: Vec<Fill>,
}

impl MatchOutcome {
    /// The trades alone, in execution order.
    pub fn trades(&self) -> Vec<Trade> {
        self.fills.iter().map(|f| f.trade.clone()).collect()
    }
}

/// Whether an incoming order's price crosses a resting order's price.
/// Market orders cross anything.
fn crosses(side: Side, taker_limit: Option<Price>, maker_price: Price) -> bool {
    match taker_limit {
        None => true,
        Some(limit) => match side {
            Side::Buy => limit >= maker_price,
            Side::Sell => limit <= maker_price,
        },
    }
}

/// The matching core for one instrument.
///
/// Not thread-safe by itself; ownership by a single task is enforced by
/// [`crate::handle::EngineHandle`].
#[derive(Debug)]
pub struct Engine {
    instrument: InstrumentId,
    book: OrderBook,
}

impl Engine {
    pub fn new(instrument: InstrumentId) -> Self {
        Self {
            instrument,
            book: OrderBook::new(),
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Match an incoming order against the book.
    ///
    /// Fills execute at the resting price until the order is exhausted,
    /// prices no longer cross, or the opposite side empties. A limit
    /// remainder rests; a market remainder is rejected for lack of
    /// liquidity, keeping any fills already made.
    pub fn submit(&mut self, mut order: Order, timestamp: i64) -> MatchOutcome {
        debug_assert_eq!(&order.instrument, &self.instrument);
        let opposite = order.side.opposite();
        let mut fills = Vec::new();

        while order.remaining().is_positive() {
            let Some(maker) = self.book.peek_best(opposite) else {
                break;
            };
            let maker_price = maker.limit_price();
            if !crosses(order.side, order.price, maker_price) {
                break;
            }

            let fill_qty = order.remaining().min(maker.remaining());
            let maker = self.book.fill_best(opposite, fill_qty, timestamp);
            order.apply_fill(fill_qty, timestamp);

            let trade = Trade::from_match(&order, &maker, maker_price, fill_qty, timestamp);
            fills.push(Fill {
                trade,
                maker,
                taker: order.clone(),
            });
        }

        if order.remaining().is_positive() {
            match order.order_type {
                OrderType::Limit => self.book.insert(order.clone()),
                // The unfilled portion of a market order never rests.
                OrderType::Market => order.reject(timestamp),
            }
        }

        MatchOutcome { order, fills }
    }

    /// Cancel a resting order. Returns the cancelled order, or None when
    /// the id is not in the book (already filled, cancelled, rejected, or
    /// never seen here).
    pub fn cancel(&mut self, order_id: &OrderId, timestamp: i64) -> Option<Order> {
        let mut order = self.book.remove(order_id)?;
        order.cancel(timestamp);
        Some(order)
    }

    /// Seed a resting order directly, bypassing matching. Used only during
    /// recovery, where insertion order equals original arrival order.
    pub fn restore(&mut self, order: Order) {
        self.book.insert(order);
    }

    /// Aggregated top-N view of the book.
    pub fn snapshot(&self, levels: usize, timestamp: i64) -> BookSnapshot {
        self.book
            .snapshot(self.instrument.clone(), levels, timestamp)
    }

    /// Whether an order currently rests in the book.
    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.book.contains(order_id)
    }
}
