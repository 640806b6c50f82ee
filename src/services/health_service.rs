//! System health check service.
//!
//! Probes the four external dependencies (relational store, in-memory
//! store, object storage, background jobs) behind a named lock with a TTL
//! so a burst of callers does not stampede the probes: whoever holds the
//! lock probes, everyone else gets the cached snapshot with each status
//! set to `checking`. "Checking" means "no information", not "degraded".

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;

use crate::domain::ports::{LockStore, ObjectStore};

/// Named lock gating the probes.
const HEALTH_LOCK_KEY: &str = "health:check:lock";

/// Key the agent monitor heartbeats through, read as the background-job
/// liveness signal.
pub const MONITOR_HEARTBEAT_KEY: &str = "health:monitor:heartbeat";

/// A heartbeat older than this marks the background-job subsystem
/// unhealthy.
const MONITOR_HEARTBEAT_MAX_AGE_SECS: i64 = 120;

/// Status of one probed dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Healthy,
    Unhealthy,
    /// Another caller holds the probe lock; treat as "no information".
    Checking,
}

/// Health of one dependency.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: ProbeStatus,
    /// Best-effort secondary metrics; absent values are null, never errors
    pub metrics: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ComponentHealth {
    fn healthy(metrics: Value) -> Self {
        Self {
            status: ProbeStatus::Healthy,
            metrics,
            error: None,
        }
    }

    fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Unhealthy,
            metrics: Value::Null,
            error: Some(error.into()),
        }
    }

    fn checking(&self) -> Self {
        Self {
            status: ProbeStatus::Checking,
            metrics: self.metrics.clone(),
            error: None,
        }
    }
}

/// One full health report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub database: ComponentHealth,
    pub memory_store: ComponentHealth,
    pub object_storage: ComponentHealth,
    pub background_jobs: ComponentHealth,
    pub checked_at: DateTime<Utc>,
    pub application: String,
}

impl HealthSnapshot {
    /// The snapshot other callers see while a probe is in flight.
    fn as_checking(&self) -> Self {
        Self {
            database: self.database.checking(),
            memory_store: self.memory_store.checking(),
            object_storage: self.object_storage.checking(),
            background_jobs: self.background_jobs.checking(),
            checked_at: self.checked_at,
            application: self.application.clone(),
        }
    }

    fn all_checking() -> Self {
        let checking = ComponentHealth {
            status: ProbeStatus::Checking,
            metrics: Value::Null,
            error: None,
        };
        Self {
            database: checking.clone(),
            memory_store: checking.clone(),
            object_storage: checking.clone(),
            background_jobs: checking,
            checked_at: Utc::now(),
            application: application_id(),
        }
    }
}

fn application_id() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Service probing external dependencies.
pub struct HealthService {
    pool: SqlitePool,
    lock_store: Arc<dyn LockStore>,
    object_store: Arc<dyn ObjectStore>,
    probe_timeout: Duration,
    lock_ttl: Duration,
    cache_ttl: Duration,
    cache: RwLock<Option<(Instant, HealthSnapshot)>>,
}

impl HealthService {
    pub fn new(
        pool: SqlitePool,
        lock_store: Arc<dyn LockStore>,
        object_store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            pool,
            lock_store,
            object_store,
            probe_timeout: Duration::from_secs(5),
            lock_ttl: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(30),
            cache: RwLock::new(None),
        }
    }

    /// Override timing knobs (builder form).
    pub fn with_timing(mut self, probe_timeout: Duration, lock_ttl: Duration, cache_ttl: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self.lock_ttl = lock_ttl;
        self.cache_ttl = cache_ttl;
        self
    }

    /// Produce a health report, probing at most once per lock window.
    pub async fn snapshot(&self) -> HealthSnapshot {
        if let Some(snapshot) = self.fresh_cached().await {
            return snapshot;
        }

        match self.lock_store.acquire(HEALTH_LOCK_KEY, self.lock_ttl).await {
            Ok(true) => {
                let snapshot = self.run_probes(true).await;
                *self.cache.write().await = Some((Instant::now(), snapshot.clone()));
                if let Err(e) = self.lock_store.release(HEALTH_LOCK_KEY).await {
                    warn!(error = %e, "failed to release health lock");
                }
                snapshot
            }
            Ok(false) => {
                // Someone else is probing; serve the cache as "checking".
                match self.cache.read().await.as_ref() {
                    Some((_, snapshot)) => snapshot.as_checking(),
                    None => HealthSnapshot::all_checking(),
                }
            }
            Err(e) => {
                // The in-memory store itself is down: run the remaining
                // probes unguarded and report the store unhealthy.
                warn!(error = %e, "in-memory store unreachable; degrading health check");
                let mut snapshot = self.run_probes(false).await;
                snapshot.memory_store = ComponentHealth::unhealthy(e.to_string());
                *self.cache.write().await = Some((Instant::now(), snapshot.clone()));
                snapshot
            }
        }
    }

    async fn fresh_cached(&self) -> Option<HealthSnapshot> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|(at, _)| at.elapsed() < self.cache_ttl)
            .map(|(_, snapshot)| snapshot.clone())
    }

    async fn run_probes(&self, include_memory_store: bool) -> HealthSnapshot {
        let database = self.probe_database().await;
        let memory_store = if include_memory_store {
            self.probe_memory_store().await
        } else {
            ComponentHealth::unhealthy("skipped: store unreachable")
        };
        let object_storage = self.probe_object_storage().await;
        let background_jobs = self.probe_background_jobs().await;

        HealthSnapshot {
            database,
            memory_store,
            object_storage,
            background_jobs,
            checked_at: Utc::now(),
            application: application_id(),
        }
    }

    async fn probe_database(&self) -> ComponentHealth {
        let check = tokio::time::timeout(
            self.probe_timeout,
            sqlx::query("SELECT 1").fetch_one(&self.pool),
        )
        .await;

        match check {
            Ok(Ok(_)) => {
                // Size is a secondary metric; failure degrades to null.
                let size: Option<i64> = sqlx::query_as::<_, (i64,)>(
                    "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
                )
                .fetch_one(&self.pool)
                .await
                .ok()
                .map(|(v,)| v);
                ComponentHealth::healthy(json!({ "database_size_bytes": size }))
            }
            Ok(Err(e)) => ComponentHealth::unhealthy(e.to_string()),
            Err(_) => ComponentHealth::unhealthy("probe timed out"),
        }
    }

    async fn probe_memory_store(&self) -> ComponentHealth {
        let started = Instant::now();
        match tokio::time::timeout(self.probe_timeout, self.lock_store.ping()).await {
            Ok(Ok(())) => ComponentHealth::healthy(json!({
                "ping_ms": u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            })),
            Ok(Err(e)) => ComponentHealth::unhealthy(e.to_string()),
            Err(_) => ComponentHealth::unhealthy("probe timed out"),
        }
    }

    async fn probe_object_storage(&self) -> ComponentHealth {
        match tokio::time::timeout(self.probe_timeout, self.object_store.probe()).await {
            Ok(Ok(())) => ComponentHealth::healthy(Value::Null),
            Ok(Err(e)) => ComponentHealth::unhealthy(e.to_string()),
            Err(_) => ComponentHealth::unhealthy("probe timed out"),
        }
    }

    async fn probe_background_jobs(&self) -> ComponentHealth {
        let heartbeat = tokio::time::timeout(
            self.probe_timeout,
            self.lock_store.fetch(MONITOR_HEARTBEAT_KEY),
        )
        .await;

        match heartbeat {
            Ok(Ok(Some(stamp))) => match chrono::DateTime::parse_from_rfc3339(&stamp) {
                Ok(at) => {
                    let age = (Utc::now() - at.with_timezone(&Utc)).num_seconds();
                    if age <= MONITOR_HEARTBEAT_MAX_AGE_SECS {
                        ComponentHealth::healthy(json!({ "heartbeat_age_secs": age }))
                    } else {
                        ComponentHealth::unhealthy(format!("heartbeat {age}s old"))
                    }
                }
                Err(e) => ComponentHealth::unhealthy(format!("bad heartbeat stamp: {e}")),
            },
            Ok(Ok(None)) => ComponentHealth::unhealthy("no heartbeat recorded"),
            Ok(Err(e)) => ComponentHealth::unhealthy(e.to_string()),
            Err(_) => ComponentHealth::unhealthy("probe timed out"),
        }
    }
}
