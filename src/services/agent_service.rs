//! Agent lifecycle service.
//!
//! Registration, benchmark ingestion (which activates a pending agent),
//! error recording with fatal-error escalation, and the offline/recover
//! cycle. Taking an agent offline never orphans its running tasks: they
//! are paused in place so assignment rule 3 can hand them to another
//! agent.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{
    Agent, AgentError, AgentState, ErrorSeverity, HashcatBenchmark, TaskState,
    FATAL_ERRORS_BEFORE_ERROR_STATE,
};
use crate::domain::ports::{AgentRepository, BenchmarkRepository, TaskRepository};
use crate::services::campaign_service::CampaignService;
use crate::services::lifecycle_logger::{RecordIds, StateChangeLogger};

/// Lookback window for the repeated-fatal-error escalation.
const FATAL_ERROR_WINDOW_HOURS: i64 = 24;

/// Service driving the agent lifecycle.
pub struct AgentService {
    agents: Arc<dyn AgentRepository>,
    benchmarks: Arc<dyn BenchmarkRepository>,
    tasks: Arc<dyn TaskRepository>,
    campaigns: Arc<CampaignService>,
    logger: StateChangeLogger,
}

impl AgentService {
    pub fn new(
        agents: Arc<dyn AgentRepository>,
        benchmarks: Arc<dyn BenchmarkRepository>,
        tasks: Arc<dyn TaskRepository>,
        campaigns: Arc<CampaignService>,
    ) -> Self {
        Self {
            agents,
            benchmarks,
            tasks,
            campaigns,
            logger: StateChangeLogger::new(),
        }
    }

    /// Publish lifecycle records through a shared logger (builder form).
    pub fn with_logger(mut self, logger: StateChangeLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Register a new agent.
    #[instrument(skip(self, agent), fields(agent_id = %agent.id), err)]
    pub async fn register(&self, agent: Agent) -> Result<Uuid> {
        self.agents
            .create(&agent)
            .await
            .context("Failed to register agent")?;
        self.logger.event(
            RecordIds::agent(agent.id),
            "registered",
            &[("host_name", json!(agent.host_name))],
        );
        Ok(agent.id)
    }

    /// Replace the agent's benchmark set. The first successful submission
    /// activates a pending agent.
    #[instrument(skip(self, benchmarks), fields(agent_id = %agent_id), err)]
    pub async fn submit_benchmarks(
        &self,
        agent_id: Uuid,
        benchmarks: Vec<HashcatBenchmark>,
    ) -> Result<()> {
        let mut agent = self.fetch(agent_id).await?;

        self.benchmarks
            .replace_for_agent(agent_id, &benchmarks)
            .await
            .context("Failed to store benchmarks")?;

        if agent.state == AgentState::Pending && !benchmarks.is_empty() {
            agent
                .activate()
                .map_err(DomainError::ValidationFailed)?;
            self.agents
                .update(&agent)
                .await
                .context("Failed to activate agent")?;
            self.logger.transition(
                RecordIds::agent(agent_id),
                "activate",
                Some("pending"),
                Some("active"),
                &[("benchmark_count", json!(benchmarks.len()))],
            );
        }
        Ok(())
    }

    /// Record an incident. A fatal error fails the involved attack and,
    /// past the repeat threshold, disables the agent entirely.
    #[instrument(skip(self, error), fields(agent_id = %error.agent_id), err)]
    pub async fn record_error(&self, error: AgentError) -> Result<()> {
        self.agents
            .record_error(&error)
            .await
            .context("Failed to record agent error")?;

        if error.severity != ErrorSeverity::Fatal {
            return Ok(());
        }

        if let Some(task_id) = error.task_id {
            if let Some(task) = self.tasks.get(task_id).await? {
                self.campaigns
                    .fail_attack(task.attack_id, &error.message)
                    .await
                    .context("Failed to fail attack after fatal error")?;
            }
        }

        let since = Utc::now() - Duration::hours(FATAL_ERROR_WINDOW_HOURS);
        let recent_fatals = self
            .agents
            .count_fatal_errors_since(error.agent_id, since)
            .await
            .context("Failed to count fatal errors")?;

        if recent_fatals >= FATAL_ERRORS_BEFORE_ERROR_STATE {
            let mut agent = self.fetch(error.agent_id).await?;
            if agent.state != AgentState::Error {
                let from = agent.state.as_str();
                agent.mark_errored();
                self.agents
                    .update(&agent)
                    .await
                    .context("Failed to move agent to error state")?;
                self.logger.transition(
                    RecordIds::agent(error.agent_id),
                    "error",
                    Some(from),
                    Some("error"),
                    &[("recent_fatal_errors", json!(recent_fatals))],
                );
            }
        }
        Ok(())
    }

    /// Voluntary shutdown: the agent goes offline and its running tasks
    /// are paused (agent binding kept) so another agent can reclaim them.
    #[instrument(skip(self), err)]
    pub async fn shutdown(&self, agent_id: Uuid) -> Result<()> {
        self.take_offline(agent_id, "shutdown").await
    }

    /// Shared offline path for voluntary shutdown and heartbeat loss.
    pub(crate) async fn take_offline(&self, agent_id: Uuid, event: &str) -> Result<()> {
        let mut agent = self.fetch(agent_id).await?;
        if agent.state != AgentState::Active {
            return Ok(());
        }

        agent
            .go_offline()
            .map_err(DomainError::ValidationFailed)?;
        self.agents
            .update(&agent)
            .await
            .context("Failed to take agent offline")?;
        self.logger.transition(
            RecordIds::agent(agent_id),
            event,
            Some("active"),
            Some("offline"),
            &[],
        );

        let running = self
            .tasks
            .list_by_agent_in_state(agent_id, TaskState::Running)
            .await
            .context("Failed to list running tasks of offline agent")?;

        for mut task in running {
            if task.pause().is_ok() {
                self.tasks
                    .update(&task)
                    .await
                    .context("Failed to pause task of offline agent")?;
                self.logger.transition(
                    RecordIds::task(task.id).with_agent(agent_id),
                    "pause",
                    Some("running"),
                    Some("paused"),
                    &[("cause", json!(event))],
                );
            }
        }
        Ok(())
    }

    /// An offline agent came back: next authenticated pickup recovers it.
    #[instrument(skip(self), err)]
    pub async fn recover(&self, agent_id: Uuid) -> Result<()> {
        let mut agent = self.fetch(agent_id).await?;
        if agent.state != AgentState::Offline {
            return Ok(());
        }

        agent.recover().map_err(DomainError::ValidationFailed)?;
        self.agents
            .update(&agent)
            .await
            .context("Failed to recover agent")?;
        self.logger.transition(
            RecordIds::agent(agent_id),
            "recover",
            Some("offline"),
            Some("active"),
            &[],
        );
        Ok(())
    }

    /// Record an authenticated request: advances `last_seen_at` and
    /// recovers an offline agent.
    #[instrument(skip(self), err)]
    pub async fn seen(&self, agent_id: Uuid, ipaddress: Option<String>) -> Result<()> {
        let mut agent = self.fetch(agent_id).await?;
        agent.touch_seen(Utc::now(), ipaddress);
        self.agents
            .update(&agent)
            .await
            .context("Failed to record agent heartbeat")?;

        if agent.state == AgentState::Offline {
            self.recover(agent_id).await?;
        }
        Ok(())
    }

    async fn fetch(&self, agent_id: Uuid) -> Result<Agent> {
        Ok(self
            .agents
            .get(agent_id)
            .await
            .context("Failed to fetch agent")?
            .ok_or(DomainError::AgentNotFound(agent_id))?)
    }
}
