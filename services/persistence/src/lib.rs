//! Persistence contracts and reference implementations
//!
//! The coordinator talks to durable storage only through the traits
//! defined here: the relational record store, the fast KV cache, the
//! append-only event log, and the best-effort subscriber fan-out. The
//! in-memory implementations back tests and local runs; production
//! deployments swap in real adapters behind the same contracts.

pub mod event_log;
pub mod fanout;
pub mod kv;
pub mod memory;
pub mod retry;
pub mod store;

pub use event_log::{topics, EventLog};
pub use fanout::Fanout;
pub use kv::KvStore;
pub use memory::{MemoryEventLog, MemoryKv, MemoryRecordStore};
pub use retry::{with_retry, RetryPolicy};
pub use store::{RecordStore, StoreError};
