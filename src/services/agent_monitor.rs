//! Heartbeat-loss monitor.
//!
//! A background sweep that takes silent agents offline (pausing their
//! running tasks for reclaim) and publishes its own liveness through the
//! lock store, where the health service reads it as the background-job
//! probe.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::ports::{AgentRepository, LockStore};
use crate::services::agent_service::AgentService;
use crate::services::health_service::MONITOR_HEARTBEAT_KEY;

/// Background daemon sweeping for lost agents.
pub struct AgentMonitor {
    agents: Arc<dyn AgentRepository>,
    agent_service: Arc<AgentService>,
    lock_store: Arc<dyn LockStore>,
    sweep_interval: Duration,
}

impl AgentMonitor {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        agent_service: Arc<AgentService>,
        lock_store: Arc<dyn LockStore>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            agents,
            agent_service,
            lock_store,
            sweep_interval,
        }
    }

    /// Spawn the sweep loop. The returned handle completes after a
    /// shutdown signal.
    pub fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.sweep_interval);
            info!(
                sweep_interval_secs = self.sweep_interval.as_secs(),
                "agent monitor started"
            );

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.sweep().await {
                            error!(error = %e, "agent monitor sweep failed");
                        }
                        self.publish_heartbeat().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("agent monitor stopping");
                        break;
                    }
                }
            }
        })
    }

    /// One pass: every active agent past its heartbeat deadline goes
    /// offline and has its running tasks paused for reclaim.
    pub async fn sweep(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let active = self.agents.list_active().await?;

        for agent in active {
            if agent.heartbeat_lost(now) {
                warn!(
                    agent_id = %agent.id,
                    host_name = %agent.host_name,
                    last_seen_at = ?agent.last_seen_at,
                    "agent heartbeat lost"
                );
                self.agent_service
                    .take_offline(agent.id, "heartbeat_lost")
                    .await?;
            }
        }
        Ok(())
    }

    async fn publish_heartbeat(&self) {
        let stamp = Utc::now().to_rfc3339();
        // Heartbeat TTL outlives two sweep intervals so one missed write
        // does not trip the health probe.
        let ttl = self.sweep_interval * 3;
        if let Err(e) = self.lock_store.put(MONITOR_HEARTBEAT_KEY, &stamp, ttl).await {
            warn!(error = %e, "failed to publish monitor heartbeat");
        }
    }
}
