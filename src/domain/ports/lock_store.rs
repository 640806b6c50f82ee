//! In-memory store port: named locks with TTL and atomic counters.
//!
//! The health service uses the named lock to gate probe stampedes; the
//! agent monitor publishes its liveness through a keyed value. Implemented
//! by Redis in deployment and an in-process map for tests.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::DomainResult;

/// A keyed value store with set-if-not-exists semantics.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Set `key` if absent, with a TTL. Returns true when this caller won
    /// the lock.
    async fn acquire(&self, key: &str, ttl: Duration) -> DomainResult<bool>;

    /// Release a held lock. Releasing an expired or absent key is a no-op.
    async fn release(&self, key: &str) -> DomainResult<()>;

    /// Set a plain keyed value with a TTL.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> DomainResult<()>;

    /// Read a keyed value, None when absent or expired.
    async fn fetch(&self, key: &str) -> DomainResult<Option<String>>;

    /// Atomically increment a counter, returning the new value.
    async fn increment(&self, key: &str) -> DomainResult<i64>;

    /// Liveness probe of the store itself.
    async fn ping(&self) -> DomainResult<()>;
}
