//! Cold-start recovery
//!
//! Rebuilds warm books from the durable record store alone. Trades were
//! persisted atomically with the orders' filled quantities, so no trade
//! replay is needed: inserting every active order, in created_at order,
//! with its recorded fill state reproduces the pre-shutdown books exactly,
//! including time priority within each price level.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, info};

use matching_engine::{Engine, EngineHandle};
use persistence::{with_retry, RecordStore, RetryPolicy};
use types::errors::ExchangeError;
use types::ids::InstrumentId;

/// What recovery found and rebuilt.
#[derive(Debug, Clone)]
pub struct RecoveryReport {
    /// Instruments with at least one active order.
    pub instruments: usize,
    /// Active orders re-inserted into warm books.
    pub orders_restored: usize,
    /// First free order event sequence (highest persisted + 1).
    pub next_event_sequence: u64,
    pub elapsed_ms: u64,
}

/// Scan the record store and spawn a seeded engine per instrument.
pub(crate) async fn rebuild(
    store: &dyn RecordStore,
    retry: &RetryPolicy,
    queue_capacity: usize,
) -> Result<(Vec<(InstrumentId, EngineHandle)>, RecoveryReport), ExchangeError> {
    let started = Instant::now();
    info!("recovery: scanning active orders");

    let open_orders = with_retry(retry, "open_orders", || store.open_orders())
        .await
        .map_err(|e| ExchangeError::Storage(e.to_string()))?;
    let orders_restored = open_orders.len();

    // created_at order in, arrival order out: time priority survives.
    let mut engines: BTreeMap<InstrumentId, Engine> = BTreeMap::new();
    for order in open_orders {
        debug!(
            order_id = %order.order_id,
            instrument = %order.instrument,
            filled = %order.filled_quantity,
            "recovery: restoring order"
        );
        engines
            .entry(order.instrument.clone())
            .or_insert_with(|| Engine::new(order.instrument.clone()))
            .restore(order);
    }

    let max_sequence = with_retry(retry, "max_event_sequence", || store.max_event_sequence())
        .await
        .map_err(|e| ExchangeError::Storage(e.to_string()))?;

    let report = RecoveryReport {
        instruments: engines.len(),
        orders_restored,
        next_event_sequence: max_sequence + 1,
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    info!(
        instruments = report.instruments,
        orders_restored = report.orders_restored,
        next_event_sequence = report.next_event_sequence,
        elapsed_ms = report.elapsed_ms,
        "recovery: complete"
    );

    let handles = engines
        .into_iter()
        .map(|(instrument, engine)| (instrument, EngineHandle::spawn(engine, queue_capacity)))
        .collect();
    Ok((handles, report))
}
