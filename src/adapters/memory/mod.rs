//! In-process implementation of the LockStore.
//!
//! Suitable for tests and single-node deployments; the Redis adapter
//! replaces it when the fleet spans processes.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::domain::errors::DomainResult;
use crate::domain::ports::LockStore;

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// A Mutex'd map with lazy TTL expiry.
#[derive(Clone, Default)]
pub struct InProcessLockStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    counters: Arc<Mutex<HashMap<String, i64>>>,
}

impl InProcessLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockStore for InProcessLockStore {
    async fn acquire(&self, key: &str, ttl: Duration) -> DomainResult<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(false),
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: now + ttl,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str) -> DomainResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> DomainResult<()> {
        self.entries.lock().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn fetch(&self, key: &str) -> DomainResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn increment(&self, key: &str) -> DomainResult<i64> {
        let mut counters = self.counters.lock().await;
        let counter = counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn ping(&self) -> DomainResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_is_exclusive_until_released() {
        let store = InProcessLockStore::new();
        let ttl = Duration::from_secs(60);

        assert!(store.acquire("lock", ttl).await.unwrap());
        assert!(!store.acquire("lock", ttl).await.unwrap());

        store.release("lock").await.unwrap();
        assert!(store.acquire("lock", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_acquire_after_ttl_expiry() {
        let store = InProcessLockStore::new();

        assert!(store.acquire("lock", Duration::from_millis(10)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(store.acquire("lock", Duration::from_secs(60)).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_fetch_round_trip() {
        let store = InProcessLockStore::new();
        store.put("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.fetch("k").await.unwrap().as_deref(), Some("v"));
        assert!(store.fetch("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_increment_counts_up() {
        let store = InProcessLockStore::new();
        assert_eq!(store.increment("n").await.unwrap(), 1);
        assert_eq!(store.increment("n").await.unwrap(), 2);
        assert_eq!(store.increment("other").await.unwrap(), 1);
    }
}
