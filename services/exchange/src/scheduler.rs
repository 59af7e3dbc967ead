//! Snapshot scheduler
//!
//! Captures every active instrument's book on a fixed interval, sealing
//! each capture with a SHA-256 checksum before persistence. Captures run
//! as commands on the owning engine's queue, so a snapshot never observes
//! a mid-match state. On-demand captures share the same path via
//! [`Exchange::request_snapshot`].

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use types::snapshot::{BookSnapshot, SnapshotLevel, SnapshotRecord};

use crate::coordinator::Exchange;

/// Seal a captured snapshot with its integrity checksum.
pub fn seal_snapshot(snapshot: BookSnapshot) -> SnapshotRecord {
    let checksum = compute_checksum(&snapshot);
    SnapshotRecord::new(snapshot, checksum)
}

/// Verify a persisted snapshot against its checksum.
pub fn verify_snapshot_integrity(record: &SnapshotRecord) -> bool {
    record.checksum == compute_checksum(&record.snapshot)
}

fn hash_levels(hasher: &mut Sha256, levels: &[SnapshotLevel]) {
    for level in levels {
        hasher.update(level.price.to_string().as_bytes());
        hasher.update(b":");
        hasher.update(level.quantity.to_string().as_bytes());
        hasher.update(b"|");
    }
    hasher.update(b"---");
}

fn compute_checksum(snapshot: &BookSnapshot) -> String {
    let mut hasher = Sha256::new();
    hasher.update(snapshot.instrument.as_str().as_bytes());
    hasher.update(b"---");
    hash_levels(&mut hasher, &snapshot.bids);
    hash_levels(&mut hasher, &snapshot.asks);
    hasher.update(snapshot.timestamp.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Periodic snapshot task over all active instruments.
pub struct SnapshotScheduler {
    handle: JoinHandle<()>,
}

impl SnapshotScheduler {
    /// Spawn the scheduler loop. Holds the coordinator weakly so the task
    /// winds down once the exchange is dropped.
    pub fn spawn(exchange: &Arc<Exchange>, interval: Duration) -> Self {
        let exchange = Arc::downgrade(exchange);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The immediate first tick; cycles start one interval in.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(exchange) = exchange.upgrade() else {
                    break;
                };
                for instrument in exchange.active_instruments() {
                    match exchange.request_snapshot(&instrument).await {
                        Ok(record) => debug!(
                            instrument = %instrument,
                            checksum = %record.checksum,
                            "scheduled snapshot captured"
                        ),
                        Err(err) => warn!(
                            instrument = %instrument,
                            error = %err,
                            "scheduled snapshot failed"
                        ),
                    }
                }
            }
        });
        Self { handle }
    }

    /// Stop the scheduler. In-flight captures are abandoned.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for SnapshotScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
