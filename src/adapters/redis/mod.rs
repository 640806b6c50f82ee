//! Redis implementation of the LockStore.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::LockStore;

#[derive(Clone)]
pub struct RedisLockStore {
    manager: ConnectionManager,
}

impl RedisLockStore {
    /// Connect to Redis and build a reconnecting connection manager.
    pub async fn connect(redis_url: &str) -> DomainResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| DomainError::StoreUnavailable(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::StoreUnavailable(e.to_string()))?;
        Ok(Self { manager })
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn acquire(&self, key: &str, ttl: Duration) -> DomainResult<bool> {
        let mut conn = self.manager.clone();
        // SET key 1 NX EX <ttl>: returns OK when this caller won.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::StoreUnavailable(e.to_string()))?;
        Ok(reply.is_some())
    }

    async fn release(&self, key: &str) -> DomainResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .del(key)
            .await
            .map_err(|e| DomainError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> DomainResult<()> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .set_ex(key, value, ttl_secs(ttl))
            .await
            .map_err(|e| DomainError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn fetch(&self, key: &str) -> DomainResult<Option<String>> {
        let mut conn = self.manager.clone();
        conn.get(key)
            .await
            .map_err(|e| DomainError::StoreUnavailable(e.to_string()))
    }

    async fn increment(&self, key: &str) -> DomainResult<i64> {
        let mut conn = self.manager.clone();
        conn.incr(key, 1)
            .await
            .map_err(|e| DomainError::StoreUnavailable(e.to_string()))
    }

    async fn ping(&self) -> DomainResult<()> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::StoreUnavailable(e.to_string()))?;
        Ok(())
    }
}
