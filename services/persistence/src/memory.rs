//! In-memory reference implementations
//!
//! Back the contract traits with process-local state for tests and local
//! runs. Semantics mirror what a relational/KV/log deployment must
//! provide: unique constraints, the atomic execution transaction,
//! idempotent trade application, and TTL expiry on cache entries.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use types::events::OrderEvent;
use types::ids::{ClientId, InstrumentId, OrderId, TradeId};
use types::order::{Order, Side};
use types::position::Position;
use types::snapshot::SnapshotRecord;
use types::trade::Trade;

use crate::event_log::EventLog;
use crate::kv::KvStore;
use crate::store::{RecordStore, StoreError};

#[derive(Default)]
struct RecordStoreInner {
    orders: HashMap<OrderId, Order>,
    /// Insertion order, for stable created_at ordering of scans.
    arrival: Vec<OrderId>,
    idempotency_index: HashMap<String, OrderId>,
    trades: Vec<Trade>,
    applied_trades: HashSet<TradeId>,
    events: Vec<OrderEvent>,
    positions: HashMap<(ClientId, InstrumentId), Position>,
    snapshots: Vec<SnapshotRecord>,
}

/// In-memory record store with relational semantics.
#[derive(Default)]
pub struct MemoryRecordStore {
    inner: Mutex<RecordStoreInner>,
    /// Number of upcoming calls that fail transiently (retry testing).
    fail_transient: AtomicU32,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` store calls fail with a transient error.
    pub fn inject_transient_failures(&self, n: u32) {
        self.fail_transient.store(n, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        let remaining = self.fail_transient.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_transient.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Transient("injected failure".to_string()));
        }
        Ok(())
    }

    /// Total persisted trades (test inspection).
    pub fn trade_count(&self) -> usize {
        self.inner.lock().unwrap().trades.len()
    }

    /// Total persisted events (test inspection).
    pub fn event_count(&self) -> usize {
        self.inner.lock().unwrap().events.len()
    }

    /// Events for one order, in sequence order (test inspection).
    pub fn events_for(&self, order_id: OrderId) -> Vec<OrderEvent> {
        let inner = self.inner.lock().unwrap();
        let mut events: Vec<OrderEvent> = inner
            .events
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect();
        events.sort();
        events
    }

    /// Persisted snapshots, in append order (test inspection).
    pub fn snapshot_count(&self) -> usize {
        self.inner.lock().unwrap().snapshots.len()
    }

    /// Sum of net quantity across all clients for one instrument
    /// (conservation checks).
    pub fn net_quantity_sum(&self, instrument: &InstrumentId) -> rust_decimal::Decimal {
        let inner = self.inner.lock().unwrap();
        inner
            .positions
            .iter()
            .filter(|((_, i), _)| i == instrument)
            .map(|(_, p)| p.net_quantity)
            .sum()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn ready(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.check_failure()?;
        let mut inner = self.inner.lock().unwrap();
        if inner.orders.contains_key(&order.order_id) {
            return Err(StoreError::DuplicateOrderId);
        }
        if let Some(key) = &order.idempotency_key {
            if inner.idempotency_index.contains_key(key) {
                return Err(StoreError::DuplicateIdempotencyKey);
            }
            inner
                .idempotency_index
                .insert(key.clone(), order.order_id);
        }
        inner.arrival.push(order.order_id);
        inner.orders.insert(order.order_id, order.clone());
        Ok(())
    }

    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.check_failure()?;
        let mut inner = self.inner.lock().unwrap();
        if !inner.orders.contains_key(&order.order_id) {
            inner.arrival.push(order.order_id);
        }
        inner.orders.insert(order.order_id, order.clone());
        Ok(())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        self.check_failure()?;
        Ok(self.inner.lock().unwrap().orders.get(&order_id).cloned())
    }

    async fn get_order_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<Order>, StoreError> {
        self.check_failure()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .idempotency_index
            .get(key)
            .and_then(|id| inner.orders.get(id))
            .cloned())
    }

    async fn open_orders(&self) -> Result<Vec<Order>, StoreError> {
        self.check_failure()?;
        let inner = self.inner.lock().unwrap();
        let mut open: Vec<Order> = inner
            .arrival
            .iter()
            .filter_map(|id| inner.orders.get(id))
            .filter(|o| o.status.is_active())
            .cloned()
            .collect();
        // Stable: arrival order breaks created_at ties.
        open.sort_by_key(|o| o.created_at);
        Ok(open)
    }

    async fn record_execution(
        &self,
        trade: &Trade,
        buy_order: &Order,
        sell_order: &Order,
    ) -> Result<(), StoreError> {
        self.check_failure()?;
        let mut inner = self.inner.lock().unwrap();
        if inner.applied_trades.contains(&trade.trade_id) {
            return Ok(());
        }

        inner.trades.push(trade.clone());
        inner.applied_trades.insert(trade.trade_id);
        for order in [buy_order, sell_order] {
            if !inner.orders.contains_key(&order.order_id) {
                inner.arrival.push(order.order_id);
            }
            inner.orders.insert(order.order_id, order.clone());
        }

        let instrument = trade.instrument.clone();
        for (client_id, side) in [
            (trade.buy_client_id, Side::Buy),
            (trade.sell_client_id, Side::Sell),
        ] {
            inner
                .positions
                .entry((client_id, instrument.clone()))
                .or_insert_with(|| Position::flat(client_id, instrument.clone()))
                .apply(side, trade.price, trade.quantity, trade.executed_at);
        }
        Ok(())
    }

    async fn recent_trades(
        &self,
        instrument: &InstrumentId,
        limit: usize,
    ) -> Result<Vec<Trade>, StoreError> {
        self.check_failure()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .trades
            .iter()
            .rev()
            .filter(|t| &t.instrument == instrument)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn positions(&self, client_id: ClientId) -> Result<Vec<Position>, StoreError> {
        self.check_failure()?;
        let inner = self.inner.lock().unwrap();
        let mut positions: Vec<Position> = inner
            .positions
            .iter()
            .filter(|((c, _), _)| *c == client_id)
            .map(|(_, p)| p.clone())
            .collect();
        positions.sort_by(|a, b| a.instrument.cmp(&b.instrument));
        Ok(positions)
    }

    async fn append_event(&self, event: &OrderEvent) -> Result<(), StoreError> {
        self.check_failure()?;
        self.inner.lock().unwrap().events.push(event.clone());
        Ok(())
    }

    async fn max_event_sequence(&self) -> Result<u64, StoreError> {
        self.check_failure()?;
        let inner = self.inner.lock().unwrap();
        Ok(inner.events.iter().map(|e| e.sequence).max().unwrap_or(0))
    }

    async fn insert_snapshot(&self, record: &SnapshotRecord) -> Result<(), StoreError> {
        self.check_failure()?;
        self.inner.lock().unwrap().snapshots.push(record.clone());
        Ok(())
    }
}

/// In-memory KV cache with lazy TTL expiry.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn ready(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        let live = entries
            .get(key)
            .is_some_and(|(_, expires)| *expires > now);
        if live {
            return Ok(false);
        }
        entries.insert(key.to_string(), (value.to_string(), now + ttl));
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .get(key)
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(value, _)| value.clone()))
    }
}

/// One record appended to the in-memory log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub topic: String,
    pub key: String,
    pub payload: String,
}

/// In-memory event log; appends are kept for test inspection.
#[derive(Default)]
pub struct MemoryEventLog {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records appended to one topic, in order (test inspection).
    pub fn records(&self, topic: &str) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.topic == topic)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), StoreError> {
        self.records.lock().unwrap().push(LogRecord {
            topic: topic.to_string(),
            key: key.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::events::OrderEventKind;
    use types::numeric::{Price, Quantity};

    fn instrument() -> InstrumentId {
        InstrumentId::new("BTC/USD")
    }

    fn limit(side: Side, price: u64, qty: &str, created_at: i64) -> Order {
        Order::new_limit(
            OrderId::new(),
            ClientId::new(),
            instrument(),
            side,
            Price::from_u64(price),
            Quantity::from_str(qty).unwrap(),
            created_at,
        )
    }

    #[tokio::test]
    async fn test_insert_and_get_order() {
        let store = MemoryRecordStore::new();
        let order = limit(Side::Buy, 70000, "1.0", 1);

        store.insert_order(&order).await.unwrap();
        let loaded = store.get_order(order.order_id).await.unwrap().unwrap();
        assert_eq!(loaded, order);
    }

    #[tokio::test]
    async fn test_duplicate_order_id_rejected() {
        let store = MemoryRecordStore::new();
        let order = limit(Side::Buy, 70000, "1.0", 1);

        store.insert_order(&order).await.unwrap();
        assert_eq!(
            store.insert_order(&order).await,
            Err(StoreError::DuplicateOrderId)
        );
    }

    #[tokio::test]
    async fn test_idempotency_key_unique_constraint() {
        let store = MemoryRecordStore::new();
        let mut first = limit(Side::Buy, 70000, "1.0", 1);
        first.idempotency_key = Some("K".to_string());
        let mut second = limit(Side::Buy, 70000, "1.0", 2);
        second.idempotency_key = Some("K".to_string());

        store.insert_order(&first).await.unwrap();
        assert_eq!(
            store.insert_order(&second).await,
            Err(StoreError::DuplicateIdempotencyKey)
        );

        let found = store
            .get_order_by_idempotency_key("K")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.order_id, first.order_id);
    }

    #[tokio::test]
    async fn test_open_orders_ordered_by_created_at() {
        let store = MemoryRecordStore::new();
        let late = limit(Side::Buy, 70000, "1.0", 20);
        let early = limit(Side::Sell, 71000, "1.0", 10);
        let mut done = limit(Side::Buy, 69000, "1.0", 5);
        done.cancel(6);

        store.insert_order(&late).await.unwrap();
        store.insert_order(&early).await.unwrap();
        store.upsert_order(&done).await.unwrap();

        let open = store.open_orders().await.unwrap();
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].order_id, early.order_id);
        assert_eq!(open[1].order_id, late.order_id);
    }

    #[tokio::test]
    async fn test_record_execution_atomic_and_idempotent() {
        let store = MemoryRecordStore::new();
        let mut buy = limit(Side::Buy, 70000, "1.0", 1);
        let mut sell = limit(Side::Sell, 70000, "1.0", 2);
        store.insert_order(&buy).await.unwrap();
        store.insert_order(&sell).await.unwrap();

        buy.apply_fill(Quantity::from_str("1.0").unwrap(), 3);
        sell.apply_fill(Quantity::from_str("1.0").unwrap(), 3);
        let trade = Trade::from_match(
            &buy,
            &sell,
            Price::from_u64(70000),
            Quantity::from_str("1.0").unwrap(),
            3,
        );

        store.record_execution(&trade, &buy, &sell).await.unwrap();
        // Replay must not double-count.
        store.record_execution(&trade, &buy, &sell).await.unwrap();

        assert_eq!(store.trade_count(), 1);
        let buyer_positions = store.positions(buy.client_id).await.unwrap();
        assert_eq!(buyer_positions.len(), 1);
        assert_eq!(
            buyer_positions[0].net_quantity,
            rust_decimal::Decimal::from(1)
        );
        // Conservation: buyer +1, seller -1.
        assert_eq!(
            store.net_quantity_sum(&instrument()),
            rust_decimal::Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn test_recent_trades_newest_first() {
        let store = MemoryRecordStore::new();
        for i in 1..=5i64 {
            let mut buy = limit(Side::Buy, 70000, "0.1", i);
            let mut sell = limit(Side::Sell, 70000, "0.1", i);
            let qty = Quantity::from_str("0.1").unwrap();
            buy.apply_fill(qty, i);
            sell.apply_fill(qty, i);
            let trade = Trade::from_match(&buy, &sell, Price::from_u64(70000), qty, i);
            store.record_execution(&trade, &buy, &sell).await.unwrap();
        }

        let trades = store.recent_trades(&instrument(), 3).await.unwrap();
        assert_eq!(trades.len(), 3);
        assert_eq!(trades[0].executed_at, 5);
        assert_eq!(trades[2].executed_at, 3);
    }

    #[tokio::test]
    async fn test_event_sequence_tracking() {
        let store = MemoryRecordStore::new();
        assert_eq!(store.max_event_sequence().await.unwrap(), 0);

        let order = limit(Side::Buy, 70000, "1.0", 1);
        store
            .append_event(&OrderEvent::new(3, OrderEventKind::Created, order.clone(), 1))
            .await
            .unwrap();
        store
            .append_event(&OrderEvent::new(7, OrderEventKind::Cancelled, order, 2))
            .await
            .unwrap();

        assert_eq!(store.max_event_sequence().await.unwrap(), 7);
        assert_eq!(store.event_count(), 2);
    }

    #[tokio::test]
    async fn test_transient_failure_injection() {
        let store = MemoryRecordStore::new();
        store.inject_transient_failures(1);

        let order = limit(Side::Buy, 70000, "1.0", 1);
        assert!(matches!(
            store.insert_order(&order).await,
            Err(StoreError::Transient(_))
        ));
        store.insert_order(&order).await.unwrap();
    }

    #[tokio::test]
    async fn test_kv_set_if_absent_first_writer_wins() {
        let kv = MemoryKv::new();
        let ttl = Duration::from_secs(60);

        assert!(kv.set_if_absent("k", "a", ttl).await.unwrap());
        assert!(!kv.set_if_absent("k", "b", ttl).await.unwrap());
        assert_eq!(kv.get("k").await.unwrap(), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_kv_ttl_expiry() {
        let kv = MemoryKv::new();
        assert!(kv
            .set_if_absent("k", "v", Duration::from_millis(0))
            .await
            .unwrap());

        // Expired entries read as absent and may be overwritten.
        assert_eq!(kv.get("k").await.unwrap(), None);
        assert!(kv
            .set_if_absent("k", "w", Duration::from_secs(60))
            .await
            .unwrap());
        assert_eq!(kv.get("k").await.unwrap(), Some("w".to_string()));
    }

    #[tokio::test]
    async fn test_event_log_keeps_topic_order() {
        let log = MemoryEventLog::new();
        log.publish("trades", "BTC/USD", "t1").await.unwrap();
        log.publish("orders", "BTC/USD", "o1").await.unwrap();
        log.publish("trades", "BTC/USD", "t2").await.unwrap();

        let trades = log.records("trades");
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].payload, "t1");
        assert_eq!(trades[1].payload, "t2");
    }
}
