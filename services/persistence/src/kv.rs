//! Fast KV store contract
//!
//! Backs the idempotency cache. Entries are single-writer (first writer
//! wins) and may be lost without compromising correctness: the order row
//! is durable before the mapping is written, so an expired or lost entry
//! only costs a duplicate-submission lookup against the record store.

use async_trait::async_trait;
use std::time::Duration;

use crate::store::StoreError;

/// Volatile key-value cache with TTL semantics.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Verify the cache is reachable. Called once at startup.
    async fn ready(&self) -> Result<(), StoreError>;

    /// Set `key` to `value` only if absent. Returns whether this call won
    /// the write. The entry expires after `ttl`.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Read a key; None when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
}
