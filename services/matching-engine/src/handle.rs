//! Serialized engine handle
//!
//! Each instrument's engine is owned by a dedicated task draining a
//! bounded command queue. At most one command executes against the book at
//! any instant; callers await replies on oneshot channels. Dropping every
//! handle closes the queue and the task drains and exits.

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use thiserror::Error;
use types::ids::{InstrumentId, OrderId};
use types::order::Order;
use types::snapshot::BookSnapshot;
use types::time::now_nanos;

use crate::engine::{Engine, MatchOutcome};

/// The engine task has stopped and can take no more commands.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("engine for {instrument} is closed")]
pub struct EngineClosed {
    pub instrument: InstrumentId,
}

enum EngineCommand {
    Submit {
        order: Order,
        reply: oneshot::Sender<MatchOutcome>,
    },
    Cancel {
        order_id: OrderId,
        reply: oneshot::Sender<Option<Order>>,
    },
    Snapshot {
        levels: usize,
        reply: oneshot::Sender<BookSnapshot>,
    },
}

/// Cloneable handle to one instrument's serialized engine task.
#[derive(Clone)]
pub struct EngineHandle {
    instrument: InstrumentId,
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Spawn the engine's owning task with a bounded command queue.
    pub fn spawn(engine: Engine, queue_capacity: usize) -> Self {
        let instrument = engine.instrument().clone();
        let (tx, rx) = mpsc::channel(queue_capacity);
        tokio::spawn(run(engine, rx));
        Self { instrument, tx }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Submit an order for matching. Resolves once the match completed.
    pub async fn submit(&self, order: Order) -> Result<MatchOutcome, EngineClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Submit { order, reply }).await?;
        rx.await.map_err(|_| self.closed())
    }

    /// Cancel a resting order. None when the order is not in the book.
    ///
    /// Ordered with respect to submissions: the cancel observes all prior
    /// matches and blocks later ones until done.
    pub async fn cancel(&self, order_id: OrderId) -> Result<Option<Order>, EngineClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Cancel { order_id, reply }).await?;
        rx.await.map_err(|_| self.closed())
    }

    /// Capture an aggregated snapshot. Runs on the engine queue, so it
    /// never observes a mid-match state.
    pub async fn snapshot(&self, levels: usize) -> Result<BookSnapshot, EngineClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineCommand::Snapshot { levels, reply }).await?;
        rx.await.map_err(|_| self.closed())
    }

    async fn send(&self, command: EngineCommand) -> Result<(), EngineClosed> {
        self.tx.send(command).await.map_err(|_| self.closed())
    }

    fn closed(&self) -> EngineClosed {
        EngineClosed {
            instrument: self.instrument.clone(),
        }
    }
}

async fn run(mut engine: Engine, mut rx: mpsc::Receiver<EngineCommand>) {
    debug!(instrument = %engine.instrument(), "engine task started");
    while let Some(command) = rx.recv().await {
        match command {
            EngineCommand::Submit { order, reply } => {
                let outcome = engine.submit(order, now_nanos());
                let _ = reply.send(outcome);
            }
            EngineCommand::Cancel { order_id, reply } => {
                let cancelled = engine.cancel(&order_id, now_nanos());
                let _ = reply.send(cancelled);
            }
            EngineCommand::Snapshot { levels, reply } => {
                let snapshot = engine.snapshot(levels, now_nanos());
                let _ = reply.send(snapshot);
            }
        }
    }
    debug!(instrument = %engine.instrument(), "engine task stopped");
}
