//! Exchange coordinator
//!
//! Routes client commands to per-instrument engines and drives the
//! transactional envelope around matching: validation, idempotency, order
//! persistence, the atomic execution transaction, position updates, and
//! event publication.
//!
//! Per instrument, the whole write path is serialized: a submit or cancel
//! holds the instrument's pipeline lock from dispatch through publication,
//! so acceptance, match execution, persistence, and publication all happen
//! in the same order. Reads bypass the lock; book queries execute as
//! commands on the engine queue and therefore only ever observe atomic
//! post-match states.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use matching_engine::{Engine, EngineHandle, Fill};
use persistence::fanout::{orderbook_channel, orders_channel, trades_channel};
use persistence::{topics, with_retry, EventLog, Fanout, KvStore, RecordStore, StoreError};
use types::errors::{ExchangeError, ValidationError};
use types::events::{OrderEvent, OrderEventKind};
use types::ids::{ClientId, InstrumentId, OrderId};
use types::numeric::{within_precision, Price, Quantity};
use types::order::{Order, OrderStatus, OrderType, Side};
use types::position::Position;
use types::snapshot::{BookSnapshot, SnapshotRecord};
use types::time::now_nanos;
use types::trade::Trade;

use crate::config::ExchangeConfig;
use crate::recovery::{self, RecoveryReport};
use crate::scheduler::{self, SnapshotScheduler};

/// Raw submission payload as received from the front-end.
///
/// Decimals arrive untyped so validation can reject them without panicking
/// newtype constructors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderInput {
    /// Caller-assigned id; generated when absent.
    pub order_id: Option<OrderId>,
    pub client_id: ClientId,
    pub instrument: InstrumentId,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Decimal>,
    pub quantity: Decimal,
}

/// What a submission returns: the final order state, the trades it
/// produced, and the current top-of-book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub order: Order,
    pub trades: Vec<Trade>,
    pub book: BookSnapshot,
}

/// The exchange coordinator. One per process; engines per instrument.
pub struct Exchange {
    config: ExchangeConfig,
    store: Arc<dyn RecordStore>,
    kv: Arc<dyn KvStore>,
    event_log: Arc<dyn EventLog>,
    fanout: Arc<Fanout>,
    engines: DashMap<InstrumentId, EngineHandle>,
    /// Serializes the write path per instrument, dispatch through publish.
    pipelines: DashMap<InstrumentId, Arc<Mutex<()>>>,
    recent_trades: DashMap<InstrumentId, VecDeque<Trade>>,
    /// Monotonic order event sequence, seeded past persisted events.
    event_sequence: AtomicU64,
    /// Periodic snapshot task, attached at startup.
    scheduler: OnceLock<SnapshotScheduler>,
}

impl Exchange {
    /// Start the coordinator: verify storage readiness, rebuild warm books
    /// from durable state, seed the event sequence, and attach the
    /// snapshot scheduler.
    pub async fn start(
        config: ExchangeConfig,
        store: Arc<dyn RecordStore>,
        kv: Arc<dyn KvStore>,
        event_log: Arc<dyn EventLog>,
    ) -> Result<(Arc<Self>, RecoveryReport), ExchangeError> {
        store.ready().await.map_err(storage_error)?;
        kv.ready().await.map_err(storage_error)?;

        let (engines, report) = recovery::rebuild(
            store.as_ref(),
            &config.retry,
            config.engine_queue_capacity,
        )
        .await?;

        let exchange = Arc::new(Self {
            event_sequence: AtomicU64::new(report.next_event_sequence.saturating_sub(1)),
            config,
            store,
            kv,
            event_log,
            fanout: Arc::new(Fanout::new()),
            engines: engines.into_iter().collect(),
            pipelines: DashMap::new(),
            recent_trades: DashMap::new(),
            scheduler: OnceLock::new(),
        });

        let scheduler =
            SnapshotScheduler::spawn(&exchange, exchange.config.snapshot_interval);
        let _ = exchange.scheduler.set(scheduler);

        info!(
            instruments = report.instruments,
            orders_restored = report.orders_restored,
            elapsed_ms = report.elapsed_ms,
            "exchange started"
        );
        Ok((exchange, report))
    }

    /// The subscriber fan-out hub for this venue.
    pub fn fanout(&self) -> Arc<Fanout> {
        Arc::clone(&self.fanout)
    }

    /// Instruments with a live engine.
    pub fn active_instruments(&self) -> Vec<InstrumentId> {
        self.engines.iter().map(|e| e.key().clone()).collect()
    }

    /// Submit an order.
    ///
    /// Validates, resolves idempotency, persists the order `open`, appends
    /// and publishes the `created` event, dispatches to the instrument's
    /// engine, persists every resulting execution atomically, and publishes
    /// trade, order, and book updates in that order.
    pub async fn submit_order(
        &self,
        input: OrderInput,
        idempotency_key: Option<String>,
    ) -> Result<SubmitReceipt, ExchangeError> {
        validate(&input)?;
        let instrument = input.instrument.clone();

        let pipeline = self.pipeline(&instrument);
        let _guard = pipeline.lock().await;

        // Idempotency: a cached key resolves to the prior order, untouched.
        if let Some(key) = &idempotency_key {
            if let Some(prior) = self.resolve_idempotent(key).await? {
                info!(order_id = %prior.order_id, key = %key, "idempotency hit");
                let book = self.capture_book(&instrument, self.config.snapshot_depth).await?;
                return Ok(SubmitReceipt {
                    order: prior,
                    trades: Vec::new(),
                    book,
                });
            }
        }

        let now = now_nanos();
        let mut order = build_order(&input, now);
        order.idempotency_key = idempotency_key.clone();

        // The order must be durable before the idempotency mapping exists:
        // a crash in between only loses idempotency, never orphans a key.
        match with_retry(&self.config.retry, "insert_order", || {
            self.store.insert_order(&order)
        })
        .await
        {
            Ok(()) => {}
            // Unique-constraint races resolve to the winner's order.
            Err(StoreError::DuplicateIdempotencyKey) => {
                let key = idempotency_key.as_deref().unwrap_or_default();
                let prior = with_retry(&self.config.retry, "get_order_by_idempotency_key", || {
                    self.store.get_order_by_idempotency_key(key)
                })
                .await
                .map_err(storage_error)?
                .ok_or_else(|| {
                    ExchangeError::Internal("idempotency key mapped to no order".to_string())
                })?;
                let book = self.capture_book(&instrument, self.config.snapshot_depth).await?;
                return Ok(SubmitReceipt {
                    order: prior,
                    trades: Vec::new(),
                    book,
                });
            }
            Err(StoreError::DuplicateOrderId) => {
                let prior = with_retry(&self.config.retry, "get_order", || {
                    self.store.get_order(order.order_id)
                })
                .await
                .map_err(storage_error)?
                .ok_or_else(|| {
                    ExchangeError::Internal("duplicate order id not readable".to_string())
                })?;
                let book = self.capture_book(&instrument, self.config.snapshot_depth).await?;
                return Ok(SubmitReceipt {
                    order: prior,
                    trades: Vec::new(),
                    book,
                });
            }
            Err(err) => return Err(storage_error(err)),
        }

        if let Some(key) = &idempotency_key {
            match self
                .kv
                .set_if_absent(&idem_key(key), &order.order_id.to_string(), self.config.idempotency_ttl)
                .await
            {
                Ok(true) => {}
                Ok(false) => warn!(key = %key, "idempotency key already cached"),
                Err(err) => warn!(key = %key, error = %err, "idempotency cache write failed"),
            }
        }

        self.emit_order_event(OrderEventKind::Created, &order, now).await;

        let engine = self.engine(&instrument);
        let outcome = engine
            .submit(order)
            .await
            .map_err(|e| ExchangeError::Internal(e.to_string()))?;

        let mut persist_failure: Option<StoreError> = None;
        for fill in &outcome.fills {
            if let Err(err) = self.persist_fill(fill).await {
                // The match is authoritative; the durable record catches up
                // on reconnect. Surface the failure after the loop.
                error!(
                    trade_id = %fill.trade.trade_id,
                    error = %err,
                    "execution persistence failed after retries"
                );
                persist_failure = Some(err);
            }
            self.push_recent_trade(fill.trade.clone());
        }

        // A market order's unfilled remainder is rejected; fills stand.
        if outcome.order.status == OrderStatus::Rejected {
            let now = now_nanos();
            info!(
                order_id = %outcome.order.order_id,
                filled = %outcome.order.filled_quantity,
                reason = "insufficient liquidity",
                "market order residual rejected"
            );
            if let Err(err) = with_retry(&self.config.retry, "upsert_order", || {
                self.store.upsert_order(&outcome.order)
            })
            .await
            {
                error!(order_id = %outcome.order.order_id, error = %err, "reject persistence failed");
                persist_failure = Some(err);
            }
            self.emit_order_event(OrderEventKind::Rejected, &outcome.order, now).await;
        }

        if let Some(err) = persist_failure {
            return Err(storage_error(err));
        }

        let book = self.capture_book(&instrument, self.config.snapshot_depth).await?;
        self.publish_topic(topics::ORDERBOOK_UPDATES, instrument.as_str(), &book).await;
        self.publish_fanout(&orderbook_channel(&instrument), &book);

        Ok(SubmitReceipt {
            order: outcome.order.clone(),
            trades: outcome.trades(),
            book,
        })
    }

    /// Cancel an order. Idempotent: cancelling a terminal order returns it
    /// unchanged and emits nothing.
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        instrument: Option<InstrumentId>,
    ) -> Result<Order, ExchangeError> {
        let instrument = match instrument {
            Some(instrument) => instrument,
            None => {
                let stored = with_retry(&self.config.retry, "get_order", || {
                    self.store.get_order(order_id)
                })
                .await
                .map_err(storage_error)?;
                stored
                    .map(|o| o.instrument)
                    .ok_or(ExchangeError::NotFoundOrTerminal { order_id })?
            }
        };

        let pipeline = self.pipeline(&instrument);
        let _guard = pipeline.lock().await;

        if let Some(engine) = self.engines.get(&instrument).map(|e| e.value().clone()) {
            if let Some(cancelled) = engine
                .cancel(order_id)
                .await
                .map_err(|e| ExchangeError::Internal(e.to_string()))?
            {
                let now = now_nanos();
                with_retry(&self.config.retry, "upsert_order", || {
                    self.store.upsert_order(&cancelled)
                })
                .await
                .map_err(storage_error)?;
                self.emit_order_event(OrderEventKind::Cancelled, &cancelled, now).await;

                let book = self.capture_book(&instrument, self.config.snapshot_depth).await?;
                self.publish_topic(topics::ORDERBOOK_UPDATES, instrument.as_str(), &book).await;
                self.publish_fanout(&orderbook_channel(&instrument), &book);
                return Ok(cancelled);
            }
        }

        // Not in the warm book: either terminal, unknown, or an active
        // order that was recovered but never re-dispatched.
        let stored = with_retry(&self.config.retry, "get_order", || {
            self.store.get_order(order_id)
        })
        .await
        .map_err(storage_error)?;

        match stored {
            None => Err(ExchangeError::NotFoundOrTerminal { order_id }),
            Some(order) if order.status.is_terminal() => Ok(order),
            Some(mut order) => {
                let now = now_nanos();
                order.cancel(now);
                with_retry(&self.config.retry, "upsert_order", || {
                    self.store.upsert_order(&order)
                })
                .await
                .map_err(storage_error)?;
                self.emit_order_event(OrderEventKind::Cancelled, &order, now).await;
                Ok(order)
            }
        }
    }

    /// Current state of an order.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, ExchangeError> {
        with_retry(&self.config.retry, "get_order", || {
            self.store.get_order(order_id)
        })
        .await
        .map_err(storage_error)?
        .ok_or(ExchangeError::NotFoundOrTerminal { order_id })
    }

    /// Aggregated book depth; `levels` is clamped to the configured limit.
    pub async fn get_book(
        &self,
        instrument: &InstrumentId,
        levels: usize,
    ) -> Result<BookSnapshot, ExchangeError> {
        let levels = levels.min(self.config.book_depth_limit);
        self.capture_book(instrument, levels).await
    }

    /// Most recent trades, newest first, served from memory with fallback
    /// to the record store. `limit` is clamped to the configured maximum.
    pub async fn get_recent_trades(
        &self,
        instrument: &InstrumentId,
        limit: usize,
    ) -> Result<Vec<Trade>, ExchangeError> {
        let limit = limit.min(self.config.recent_trades_limit);
        if let Some(ring) = self.recent_trades.get(instrument) {
            if !ring.is_empty() {
                return Ok(ring.iter().rev().take(limit).cloned().collect());
            }
        }
        with_retry(&self.config.retry, "recent_trades", || {
            self.store.recent_trades(instrument, limit)
        })
        .await
        .map_err(storage_error)
    }

    /// All of a client's positions.
    pub async fn get_positions(&self, client_id: ClientId) -> Result<Vec<Position>, ExchangeError> {
        with_retry(&self.config.retry, "positions", || {
            self.store.positions(client_id)
        })
        .await
        .map_err(storage_error)
    }

    /// Capture, persist, and publish a sealed snapshot of one book.
    ///
    /// Persistence is advisory: failures log and the snapshot is still
    /// returned.
    pub async fn request_snapshot(
        &self,
        instrument: &InstrumentId,
    ) -> Result<SnapshotRecord, ExchangeError> {
        let snapshot = self.capture_book(instrument, self.config.snapshot_depth).await?;
        let record = scheduler::seal_snapshot(snapshot);

        if let Err(err) = with_retry(&self.config.retry, "insert_snapshot", || {
            self.store.insert_snapshot(&record)
        })
        .await
        {
            warn!(instrument = %instrument, error = %err, "snapshot persistence failed");
        }
        self.publish_topic(topics::ORDERBOOK_UPDATES, instrument.as_str(), &record.snapshot)
            .await;
        self.publish_fanout(&orderbook_channel(instrument), &record.snapshot);
        Ok(record)
    }

    // ── internal ────────────────────────────────────────────────────────

    fn engine(&self, instrument: &InstrumentId) -> EngineHandle {
        self.engines
            .entry(instrument.clone())
            .or_insert_with(|| {
                EngineHandle::spawn(
                    Engine::new(instrument.clone()),
                    self.config.engine_queue_capacity,
                )
            })
            .clone()
    }

    fn pipeline(&self, instrument: &InstrumentId) -> Arc<Mutex<()>> {
        self.pipelines
            .entry(instrument.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn next_sequence(&self) -> u64 {
        self.event_sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn capture_book(
        &self,
        instrument: &InstrumentId,
        levels: usize,
    ) -> Result<BookSnapshot, ExchangeError> {
        match self.engines.get(instrument).map(|e| e.value().clone()) {
            Some(engine) => engine
                .snapshot(levels)
                .await
                .map_err(|e| ExchangeError::Internal(e.to_string())),
            None => Ok(BookSnapshot::empty(instrument.clone(), now_nanos())),
        }
    }

    async fn resolve_idempotent(&self, key: &str) -> Result<Option<Order>, ExchangeError> {
        let cached = match self.kv.get(&idem_key(key)).await {
            Ok(cached) => cached,
            Err(err) => {
                // Cache loss is safe; the store's unique constraint backs it up.
                warn!(key, error = %err, "idempotency cache read failed");
                None
            }
        };
        let Some(id_str) = cached else {
            return Ok(None);
        };
        let Ok(uuid) = Uuid::parse_str(&id_str) else {
            warn!(key, value = %id_str, "malformed idempotency cache entry");
            return Ok(None);
        };
        with_retry(&self.config.retry, "get_order", || {
            self.store.get_order(OrderId::from_uuid(uuid))
        })
        .await
        .map_err(storage_error)
    }

    /// Persist one execution atomically, then publish the trade and both
    /// sides' order events. Publication happens only after both sides'
    /// updates are durable.
    async fn persist_fill(&self, fill: &Fill) -> Result<(), StoreError> {
        let (buy, sell) = match fill.taker.side {
            Side::Buy => (&fill.taker, &fill.maker),
            Side::Sell => (&fill.maker, &fill.taker),
        };
        with_retry(&self.config.retry, "record_execution", || {
            self.store.record_execution(&fill.trade, buy, sell)
        })
        .await?;

        let instrument = &fill.trade.instrument;
        self.publish_topic(topics::TRADES, instrument.as_str(), &fill.trade).await;
        self.publish_fanout(&trades_channel(instrument), &fill.trade);

        let now = fill.trade.executed_at;
        self.emit_order_event(
            OrderEventKind::from_status(fill.maker.status),
            &fill.maker,
            now,
        )
        .await;
        self.emit_order_event(
            OrderEventKind::from_status(fill.taker.status),
            &fill.taker,
            now,
        )
        .await;
        Ok(())
    }

    /// Append an order event (advisory, log-and-continue) and publish it to
    /// the event log and the order fan-out channel.
    async fn emit_order_event(&self, kind: OrderEventKind, order: &Order, timestamp: i64) {
        let event = OrderEvent::new(self.next_sequence(), kind, order.clone(), timestamp);
        if let Err(err) = with_retry(&self.config.retry, "append_event", || {
            self.store.append_event(&event)
        })
        .await
        {
            warn!(
                order_id = %order.order_id,
                kind = kind.label(),
                error = %err,
                "order event append failed"
            );
        }
        self.publish_topic(topics::ORDER_EVENTS, order.instrument.as_str(), &event).await;
        self.publish_topic(topics::ORDERS, order.instrument.as_str(), order).await;
        self.publish_fanout(&orders_channel(&order.instrument), order);
    }

    async fn publish_topic<T: Serialize>(&self, topic: &str, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(payload) => {
                if let Err(err) = self.event_log.publish(topic, key, &payload).await {
                    warn!(topic, error = %err, "event log publish failed");
                }
            }
            Err(err) => error!(topic, error = %err, "payload serialization failed"),
        }
    }

    fn publish_fanout<T: Serialize>(&self, channel: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(payload) => self.fanout.publish(channel, payload),
            Err(err) => error!(channel, error = %err, "payload serialization failed"),
        }
    }

    fn push_recent_trade(&self, trade: Trade) {
        let mut ring = self
            .recent_trades
            .entry(trade.instrument.clone())
            .or_default();
        ring.push_back(trade);
        while ring.len() > self.config.recent_trades_capacity {
            ring.pop_front();
        }
    }
}

fn idem_key(key: &str) -> String {
    format!("idempotency:{key}")
}

fn storage_error(err: StoreError) -> ExchangeError {
    ExchangeError::Storage(err.to_string())
}

fn validate(input: &OrderInput) -> Result<(), ValidationError> {
    if input.quantity <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveQuantity);
    }
    if !within_precision(input.quantity) {
        return Err(ValidationError::PrecisionExceeded { field: "quantity" });
    }
    match input.order_type {
        OrderType::Limit => {
            let price = input.price.ok_or(ValidationError::MissingPrice)?;
            if price <= Decimal::ZERO {
                return Err(ValidationError::NonPositivePrice);
            }
            if !within_precision(price) {
                return Err(ValidationError::PrecisionExceeded { field: "price" });
            }
        }
        OrderType::Market => {
            if input.price.is_some() {
                return Err(ValidationError::UnexpectedPrice);
            }
        }
    }
    Ok(())
}

/// Build the open order from validated input.
fn build_order(input: &OrderInput, timestamp: i64) -> Order {
    let order_id = input.order_id.unwrap_or_default();
    match input.order_type {
        OrderType::Limit => Order::new_limit(
            order_id,
            input.client_id,
            input.instrument.clone(),
            input.side,
            Price::new(input.price.expect("validated limit price")),
            Quantity::new(input.quantity),
            timestamp,
        ),
        OrderType::Market => Order::new_market(
            order_id,
            input.client_id,
            input.instrument.clone(),
            input.side,
            Quantity::new(input.quantity),
            timestamp,
        ),
    }
}
