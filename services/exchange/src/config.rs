//! Coordinator configuration
//!
//! Plain struct with production defaults; no file loading here.

use std::time::Duration;

use persistence::RetryPolicy;

/// Tunables for the exchange coordinator.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Interval between scheduled book snapshots.
    pub snapshot_interval: Duration,
    /// Levels per side captured in scheduled snapshots and submit acks.
    pub snapshot_depth: usize,
    /// Upper bound on levels a book query may request.
    pub book_depth_limit: usize,
    /// Upper bound on trades a recent-trades query may request.
    pub recent_trades_limit: usize,
    /// Trades kept per instrument in the in-memory ring.
    pub recent_trades_capacity: usize,
    /// TTL on idempotency cache entries.
    pub idempotency_ttl: Duration,
    /// Bound on each engine's command queue.
    pub engine_queue_capacity: usize,
    /// Backoff for durable-store operations.
    pub retry: RetryPolicy,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: Duration::from_secs(60),
            snapshot_depth: 20,
            book_depth_limit: 100,
            recent_trades_limit: 1000,
            recent_trades_capacity: 1000,
            idempotency_ttl: Duration::from_secs(3600),
            engine_queue_capacity: 1024,
            retry: RetryPolicy::default(),
        }
    }
}
