//! Durable record store contract
//!
//! The only authoritative state after a crash: orders, trades, and client
//! positions. Events and snapshots are advisory. The store must provide
//! atomic single-row upserts, an atomic execution transaction (trade
//! insert + both order updates + both position deltas), and
//! read-after-write consistency on the listed keys.

use async_trait::async_trait;
use thiserror::Error;
use types::events::OrderEvent;
use types::ids::{ClientId, InstrumentId, OrderId};
use types::order::Order;
use types::position::Position;
use types::snapshot::SnapshotRecord;
use types::trade::Trade;

/// Failures surfaced by storage adapters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Retriable: connection loss, timeout, lock contention.
    #[error("transient storage failure: {0}")]
    Transient(String),

    /// The unique constraint on `idempotency_key` fired.
    #[error("idempotency key already mapped to an order")]
    DuplicateIdempotencyKey,

    /// An order id collided with an existing row.
    #[error("order id already exists")]
    DuplicateOrderId,
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Relational record store: orders, trades, order events, snapshots, and
/// client positions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Verify the store is reachable. Called once at startup.
    async fn ready(&self) -> Result<(), StoreError>;

    /// Insert a new order row. Fails on id or idempotency-key collision.
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Upsert an order's mutable columns (`filled_quantity`, `status`,
    /// `updated_at`).
    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Resolve an order by its idempotency key.
    async fn get_order_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Order>, StoreError>;

    /// All active orders (`open` or `partially_filled`), ordered by
    /// `created_at` ascending. Recovery relies on this ordering to rebuild
    /// time priority.
    async fn open_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Atomically persist one execution: the trade row, both orders'
    /// post-fill states, and both clients' position deltas. Idempotent per
    /// `trade_id`: a replay of an already-persisted trade is a no-op.
    async fn record_execution(
        &self,
        trade: &Trade,
        buy_order: &Order,
        sell_order: &Order,
    ) -> Result<(), StoreError>;

    /// Most recent trades for an instrument, newest first.
    async fn recent_trades(
        &self,
        instrument: &InstrumentId,
        limit: usize,
    ) -> Result<Vec<Trade>, StoreError>;

    /// All positions held by a client.
    async fn positions(&self, client_id: ClientId) -> Result<Vec<Position>, StoreError>;

    /// Append an order event. The caller assigns the sequence.
    async fn append_event(&self, event: &OrderEvent) -> Result<(), StoreError>;

    /// Highest event sequence persisted so far (0 when none). Used to seed
    /// the sequence counter on recovery.
    async fn max_event_sequence(&self) -> Result<u64, StoreError>;

    /// Append a sealed book snapshot, keyed by (instrument, timestamp).
    async fn insert_snapshot(&self, record: &SnapshotRecord) -> Result<(), StoreError>;
}
