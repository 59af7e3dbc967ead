//! Immutable trade records
//!
//! A trade references the buy and sell orders it crossed, on the same
//! instrument, and executes at the resting order's price.

use crate::ids::{ClientId, InstrumentId, OrderId, TradeId};
use crate::numeric::{Price, Quantity};
use crate::order::{Order, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An executed match between two orders. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub instrument: InstrumentId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub buy_client_id: ClientId,
    pub sell_client_id: ClientId,
    pub price: Price,
    pub quantity: Quantity,
    pub executed_at: i64,
}

impl Trade {
    /// Build the trade for a match between a taker and a resting maker.
    ///
    /// Buy/sell attribution follows the orders' sides, not which of the two
    /// arrived first. `price` is the maker's price.
    ///
    /// # Panics
    /// Panics if the orders share a side or differ in instrument, or if the
    /// match quantity is not positive.
    pub fn from_match(
        taker: &Order,
        maker: &Order,
        price: Price,
        quantity: Quantity,
        executed_at: i64,
    ) -> Self {
        assert_eq!(taker.instrument, maker.instrument, "cross-instrument match");
        assert_eq!(taker.side, maker.side.opposite(), "match requires opposite sides");
        assert!(quantity.is_positive(), "match quantity must be positive");

        let (buy, sell) = match taker.side {
            Side::Buy => (taker, maker),
            Side::Sell => (maker, taker),
        };

        Self {
            trade_id: TradeId::new(),
            instrument: taker.instrument.clone(),
            buy_order_id: buy.order_id,
            sell_order_id: sell.order_id,
            buy_client_id: buy.client_id,
            sell_client_id: sell.client_id,
            price,
            quantity,
            executed_at,
        }
    }

    /// Notional value (price × quantity).
    pub fn value(&self) -> Decimal {
        self.price.as_decimal() * self.quantity.as_decimal()
    }
}
