//! Campaign ETA calculator.
//!
//! Two independent estimates: `current` is "when does the work in flight
//! finish" (the max over running tasks' own finish estimates), `total` is
//! "how long would the queued work take serialized" (complexity over the
//! fleet's best benchmark). They are intentionally NOT additive; callers
//! must never sum them.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::AttackState;
use crate::domain::ports::{
    AttackRepository, BenchmarkRepository, CampaignRepository, HashListRepository,
    StatusRepository, TaskRepository,
};

/// How long a computed estimate may be served from cache.
pub const DEFAULT_ETA_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    computed_at: Instant,
    value: Option<DateTime<Utc>>,
}

/// Service estimating campaign completion times.
pub struct EtaService {
    tasks: Arc<dyn TaskRepository>,
    statuses: Arc<dyn StatusRepository>,
    attacks: Arc<dyn AttackRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    hash_lists: Arc<dyn HashListRepository>,
    benchmarks: Arc<dyn BenchmarkRepository>,
    cache_ttl: Duration,
    current_cache: RwLock<HashMap<Uuid, CacheEntry>>,
    total_cache: RwLock<HashMap<Uuid, CacheEntry>>,
}

impl EtaService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        statuses: Arc<dyn StatusRepository>,
        attacks: Arc<dyn AttackRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        hash_lists: Arc<dyn HashListRepository>,
        benchmarks: Arc<dyn BenchmarkRepository>,
    ) -> Self {
        Self {
            tasks,
            statuses,
            attacks,
            campaigns,
            hash_lists,
            benchmarks,
            cache_ttl: DEFAULT_ETA_CACHE_TTL,
            current_cache: RwLock::new(HashMap::new()),
            total_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Override the cache TTL (builder form).
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// When the work currently in flight will finish: the latest of the
    /// running tasks' own finish estimates. None when nothing is running
    /// or no running task has reported an estimate yet.
    #[instrument(skip(self), err)]
    pub async fn current(&self, campaign_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        let running = self
            .tasks
            .list_running_by_campaign(campaign_id)
            .await
            .context("Failed to list running tasks")?;

        let frames = try_join_all(
            running
                .iter()
                .map(|task| self.statuses.latest_for_task(task.id)),
        )
        .await
        .context("Failed to fetch latest status frames")?;

        Ok(frames
            .into_iter()
            .filter_map(|frame| frame.and_then(|f| f.estimated_stop))
            .max())
    }

    /// How long the queued (pending or paused) attacks would take run one
    /// after another at the fleet's best benchmarked speed, anchored at
    /// now. Running work is excluded; that is `current`'s job. None when
    /// there is no queued work or the benchmark for the hash type is
    /// missing.
    #[instrument(skip(self), err)]
    pub async fn total(&self, campaign_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        let campaign = self
            .campaigns
            .get(campaign_id)
            .await
            .context("Failed to fetch campaign")?
            .ok_or(DomainError::CampaignNotFound(campaign_id))?;

        let hash_list = self
            .hash_lists
            .get(campaign.hash_list_id)
            .await
            .context("Failed to fetch hash list")?
            .ok_or(DomainError::HashListNotFound(campaign.hash_list_id))?;

        let queued: Vec<_> = self
            .attacks
            .list_by_campaign(campaign_id)
            .await
            .context("Failed to list attacks")?
            .into_iter()
            .filter(|a| matches!(a.state, AttackState::Pending | AttackState::Paused))
            .collect();

        if queued.is_empty() {
            return Ok(None);
        }

        let Some(speed) = self
            .benchmarks
            .best_speed_for_hash_type(hash_list.hash_type)
            .await
            .context("Failed to fetch best benchmark")?
            .filter(|speed| *speed > 0.0)
        else {
            return Ok(None);
        };

        #[allow(clippy::cast_precision_loss)]
        let total_secs: f64 = queued
            .iter()
            .map(|a| a.complexity_value.max(0) as f64 / speed)
            .sum();

        #[allow(clippy::cast_possible_truncation)]
        let total = ChronoDuration::seconds(total_secs.round() as i64);
        Ok(Some(Utc::now() + total))
    }

    /// Cached variant of [`current`](Self::current).
    pub async fn current_cached(&self, campaign_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        if let Some(entry) = self.read_cache(&self.current_cache, campaign_id).await {
            return Ok(entry);
        }
        let value = self.current(campaign_id).await?;
        self.write_cache(&self.current_cache, campaign_id, value).await;
        Ok(value)
    }

    /// Cached variant of [`total`](Self::total).
    pub async fn total_cached(&self, campaign_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        if let Some(entry) = self.read_cache(&self.total_cache, campaign_id).await {
            return Ok(entry);
        }
        let value = self.total(campaign_id).await?;
        self.write_cache(&self.total_cache, campaign_id, value).await;
        Ok(value)
    }

    async fn read_cache(
        &self,
        cache: &RwLock<HashMap<Uuid, CacheEntry>>,
        campaign_id: Uuid,
    ) -> Option<Option<DateTime<Utc>>> {
        let cache = cache.read().await;
        cache
            .get(&campaign_id)
            .filter(|entry| entry.computed_at.elapsed() < self.cache_ttl)
            .map(|entry| entry.value)
    }

    async fn write_cache(
        &self,
        cache: &RwLock<HashMap<Uuid, CacheEntry>>,
        campaign_id: Uuid,
        value: Option<DateTime<Utc>>,
    ) {
        cache.write().await.insert(
            campaign_id,
            CacheEntry {
                computed_at: Instant::now(),
                value,
            },
        );
    }
}
