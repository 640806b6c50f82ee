//! Health service integration tests: lock gating, caching, degradation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use cipherswarm::adapters::memory::InProcessLockStore;
use cipherswarm::adapters::object_store::LocalObjectStore;
use cipherswarm::adapters::sqlite::create_migrated_test_pool;
use cipherswarm::domain::errors::{DomainError, DomainResult};
use cipherswarm::domain::ports::LockStore;
use cipherswarm::services::health_service::MONITOR_HEARTBEAT_KEY;
use cipherswarm::services::{HealthService, ProbeStatus};

fn object_store(dir: &tempfile::TempDir) -> Arc<LocalObjectStore> {
    Arc::new(LocalObjectStore::new(dir.path(), "http://localhost:8080"))
}

async fn publish_heartbeat(store: &InProcessLockStore) {
    store
        .put(MONITOR_HEARTBEAT_KEY, &Utc::now().to_rfc3339(), Duration::from_secs(120))
        .await
        .unwrap();
}

#[tokio::test]
async fn all_dependencies_healthy() {
    let pool = create_migrated_test_pool().await.unwrap();
    let locks = Arc::new(InProcessLockStore::new());
    let dir = tempfile::tempdir().unwrap();
    publish_heartbeat(&locks).await;

    let service = HealthService::new(pool, locks, object_store(&dir));
    let snapshot = service.snapshot().await;

    assert_eq!(snapshot.database.status, ProbeStatus::Healthy);
    assert_eq!(snapshot.memory_store.status, ProbeStatus::Healthy);
    assert_eq!(snapshot.object_storage.status, ProbeStatus::Healthy);
    assert_eq!(snapshot.background_jobs.status, ProbeStatus::Healthy);
    assert!(snapshot.application.starts_with("cipherswarm"));
}

#[tokio::test]
async fn missing_heartbeat_marks_background_jobs_unhealthy() {
    let pool = create_migrated_test_pool().await.unwrap();
    let locks = Arc::new(InProcessLockStore::new());
    let dir = tempfile::tempdir().unwrap();

    let service = HealthService::new(pool, locks, object_store(&dir));
    let snapshot = service.snapshot().await;

    assert_eq!(snapshot.background_jobs.status, ProbeStatus::Unhealthy);
    assert_eq!(snapshot.database.status, ProbeStatus::Healthy);
}

#[tokio::test]
async fn concurrent_caller_sees_checking() {
    let pool = create_migrated_test_pool().await.unwrap();
    let locks = Arc::new(InProcessLockStore::new());
    let dir = tempfile::tempdir().unwrap();
    publish_heartbeat(&locks).await;

    // Another caller holds the probe lock.
    assert!(locks
        .acquire("health:check:lock", Duration::from_secs(60))
        .await
        .unwrap());

    let service = HealthService::new(pool, locks, object_store(&dir));
    let snapshot = service.snapshot().await;

    // "Checking" is "no information", not "degraded".
    assert_eq!(snapshot.database.status, ProbeStatus::Checking);
    assert_eq!(snapshot.memory_store.status, ProbeStatus::Checking);
    assert_eq!(snapshot.object_storage.status, ProbeStatus::Checking);
    assert_eq!(snapshot.background_jobs.status, ProbeStatus::Checking);
}

#[tokio::test]
async fn snapshot_is_cached_between_calls() {
    let pool = create_migrated_test_pool().await.unwrap();
    let locks = Arc::new(InProcessLockStore::new());
    let dir = tempfile::tempdir().unwrap();
    publish_heartbeat(&locks).await;

    let service = HealthService::new(pool, locks.clone(), object_store(&dir));
    let first = service.snapshot().await;
    let second = service.snapshot().await;

    // The second call is served from cache: same probe timestamp.
    assert_eq!(first.checked_at, second.checked_at);
}

/// A lock store that is down entirely.
struct DeadLockStore;

#[async_trait]
impl LockStore for DeadLockStore {
    async fn acquire(&self, _key: &str, _ttl: Duration) -> DomainResult<bool> {
        Err(DomainError::StoreUnavailable("connection refused".to_string()))
    }
    async fn release(&self, _key: &str) -> DomainResult<()> {
        Err(DomainError::StoreUnavailable("connection refused".to_string()))
    }
    async fn put(&self, _key: &str, _value: &str, _ttl: Duration) -> DomainResult<()> {
        Err(DomainError::StoreUnavailable("connection refused".to_string()))
    }
    async fn fetch(&self, _key: &str) -> DomainResult<Option<String>> {
        Err(DomainError::StoreUnavailable("connection refused".to_string()))
    }
    async fn increment(&self, _key: &str) -> DomainResult<i64> {
        Err(DomainError::StoreUnavailable("connection refused".to_string()))
    }
    async fn ping(&self) -> DomainResult<()> {
        Err(DomainError::StoreUnavailable("connection refused".to_string()))
    }
}

#[tokio::test]
async fn degrades_when_lock_store_is_down() {
    let pool = create_migrated_test_pool().await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let service = HealthService::new(pool, Arc::new(DeadLockStore), object_store(&dir));
    let snapshot = service.snapshot().await;

    // The other checks still run; the store itself reports unhealthy.
    assert_eq!(snapshot.memory_store.status, ProbeStatus::Unhealthy);
    assert!(snapshot.memory_store.error.is_some());
    assert_eq!(snapshot.database.status, ProbeStatus::Healthy);
    assert_eq!(snapshot.object_storage.status, ProbeStatus::Healthy);
}
