//! Durable event log contract
//!
//! Topic-partitioned append-only stream. Producers fire and forget with
//! at-least-once delivery; consumers are expected to tolerate duplicates.

use async_trait::async_trait;

use crate::store::StoreError;

/// Topics the coordinator publishes to.
pub mod topics {
    pub const ORDERS: &str = "orders";
    pub const TRADES: &str = "trades";
    pub const ORDERBOOK_UPDATES: &str = "orderbook-updates";
    pub const ORDER_EVENTS: &str = "order-events";
}

/// Append-only topic log.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append a JSON payload to a topic. Keys partition the topic; records
    /// with the same key preserve relative order.
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), StoreError>;
}
