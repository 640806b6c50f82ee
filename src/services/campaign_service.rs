//! Campaign lifecycle service.
//!
//! Campaigns have no state machine of their own; pausing, resuming, and
//! priority changes compose from the attack and task machines. Every
//! cascade here runs eagerly: a paused campaign has no running tasks by
//! the time the pause returns.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{
    Attack, AttackState, Caller, Campaign, CampaignPriority, Task, TaskState,
};
use crate::domain::ports::{AttackRepository, CampaignRepository, TaskRepository};
use crate::services::lifecycle_logger::{RecordIds, StateChangeLogger};

/// Service driving campaign and attack lifecycles.
pub struct CampaignService {
    campaigns: Arc<dyn CampaignRepository>,
    attacks: Arc<dyn AttackRepository>,
    tasks: Arc<dyn TaskRepository>,
    logger: StateChangeLogger,
}

impl CampaignService {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        attacks: Arc<dyn AttackRepository>,
        tasks: Arc<dyn TaskRepository>,
    ) -> Self {
        Self {
            campaigns,
            attacks,
            tasks,
            logger: StateChangeLogger::new(),
        }
    }

    /// Publish lifecycle records through a shared logger (builder form).
    pub fn with_logger(mut self, logger: StateChangeLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Validate and persist a new campaign.
    #[instrument(skip(self, campaign), fields(campaign_id = %campaign.id), err)]
    pub async fn create_campaign(&self, campaign: Campaign) -> Result<Uuid> {
        campaign
            .validate()
            .map_err(DomainError::ValidationFailed)
            .context("Campaign validation failed")?;
        self.campaigns
            .create(&campaign)
            .await
            .context("Failed to create campaign")?;
        Ok(campaign.id)
    }

    /// Validate and persist a new attack under a campaign.
    #[instrument(skip(self, attack), fields(attack_id = %attack.id), err)]
    pub async fn create_attack(&self, attack: Attack) -> Result<Uuid> {
        attack
            .validate()
            .map_err(DomainError::ValidationFailed)
            .context("Attack validation failed")?;
        self.attacks
            .create(&attack)
            .await
            .context("Failed to create attack")?;
        Ok(attack.id)
    }

    /// Pause a campaign: non-terminal attacks go to `paused`, running
    /// tasks are paused with them (keeping their agent binding).
    #[instrument(skip(self), err)]
    pub async fn pause(&self, campaign_id: Uuid) -> Result<()> {
        let mut campaign = self.fetch(campaign_id).await?;
        if campaign.paused {
            return Ok(());
        }

        campaign.paused = true;
        campaign.updated_at = Utc::now();
        self.campaigns
            .update(&campaign)
            .await
            .context("Failed to pause campaign")?;

        for mut attack in self.attacks.list_by_campaign(campaign_id).await? {
            if attack.is_terminal() {
                continue;
            }
            let from = attack.state.as_str();
            if attack.transition_to(AttackState::Paused).is_ok() {
                self.attacks.update(&attack).await?;
                self.logger.transition(
                    RecordIds::attack(attack.id).with_campaign(campaign_id),
                    "pause",
                    Some(from),
                    Some("paused"),
                    &[],
                );
            }

            for mut task in self.tasks.list_by_attack(attack.id).await? {
                if task.state == TaskState::Running && task.pause().is_ok() {
                    self.tasks.update(&task).await?;
                    self.logger.transition(
                        RecordIds::task(task.id).with_attack(attack.id),
                        "pause",
                        Some("running"),
                        Some("paused"),
                        &[],
                    );
                }
            }
        }

        self.logger.event(RecordIds::campaign(campaign_id), "campaign_paused", &[]);
        Ok(())
    }

    /// Resume a paused campaign: attacks return to running (or pending
    /// when they never had tasks) and paused tasks go back to pending for
    /// their agents to re-pick up.
    #[instrument(skip(self), err)]
    pub async fn resume(&self, campaign_id: Uuid) -> Result<()> {
        let mut campaign = self.fetch(campaign_id).await?;
        if !campaign.paused {
            return Ok(());
        }

        campaign.paused = false;
        campaign.updated_at = Utc::now();
        self.campaigns
            .update(&campaign)
            .await
            .context("Failed to resume campaign")?;

        for mut attack in self.attacks.list_by_campaign(campaign_id).await? {
            if attack.state != AttackState::Paused {
                continue;
            }

            let tasks = self.tasks.list_by_attack(attack.id).await?;
            let target = if tasks.is_empty() {
                AttackState::Pending
            } else {
                AttackState::Running
            };
            if attack.transition_to(target).is_ok() {
                self.attacks.update(&attack).await?;
                self.logger.transition(
                    RecordIds::attack(attack.id).with_campaign(campaign_id),
                    "resume",
                    Some("paused"),
                    Some(target.as_str()),
                    &[],
                );
            }

            for mut task in tasks {
                if task.state == TaskState::Paused && task.resume().is_ok() {
                    self.tasks.update(&task).await?;
                    self.logger.transition(
                        RecordIds::task(task.id).with_attack(attack.id),
                        "resume",
                        Some("paused"),
                        Some("pending"),
                        &[],
                    );
                }
            }
        }

        self.logger.event(RecordIds::campaign(campaign_id), "campaign_resumed", &[]);
        Ok(())
    }

    /// Change a campaign's priority. Raising to high is capability-gated
    /// on the explicit caller record.
    #[instrument(skip(self, caller), err)]
    pub async fn set_priority(
        &self,
        campaign_id: Uuid,
        priority: CampaignPriority,
        caller: &Caller,
    ) -> Result<()> {
        if priority == CampaignPriority::High && !caller.can_set_high_priority {
            bail!("caller {} may not set high priority", caller.user);
        }

        let mut campaign = self.fetch(campaign_id).await?;
        let previous = campaign.priority;
        if previous == priority {
            return Ok(());
        }

        campaign.priority = priority;
        campaign.updated_at = Utc::now();
        self.campaigns
            .update(&campaign)
            .await
            .context("Failed to update campaign priority")?;

        self.logger.event(
            RecordIds::campaign(campaign_id),
            "priority_changed",
            &[
                ("from", json!(previous.as_str())),
                ("to", json!(priority.as_str())),
                ("by", json!(caller.user)),
            ],
        );
        Ok(())
    }

    /// Abandon an attack: the attack goes terminal and its tasks are
    /// destroyed, leaving tombstones for the not-found diagnostic.
    #[instrument(skip(self), err)]
    pub async fn abandon_attack(&self, attack_id: Uuid) -> Result<()> {
        let mut attack = self
            .attacks
            .get(attack_id)
            .await
            .context("Failed to fetch attack")?
            .ok_or(DomainError::AttackNotFound(attack_id))?;

        if attack.is_terminal() {
            bail!("cannot abandon attack in state {}", attack.state.as_str());
        }

        let from = attack.state.as_str();
        attack
            .transition_to(AttackState::Abandoned)
            .map_err(DomainError::ValidationFailed)?;
        self.attacks
            .update(&attack)
            .await
            .context("Failed to abandon attack")?;
        self.logger.transition(
            RecordIds::attack(attack_id).with_campaign(attack.campaign_id),
            "abandon",
            Some(from),
            Some("abandoned"),
            &[],
        );

        let tasks = self.tasks.list_by_attack(attack_id).await?;
        let mut destroyed = 0i64;
        for task in tasks {
            self.tasks
                .delete_with_tombstone(task.id)
                .await
                .context("Failed to destroy task of abandoned attack")?;
            destroyed += 1;
        }
        self.logger.data_cleanup(RecordIds::attack(attack_id), "tasks", destroyed);
        Ok(())
    }

    /// Abandon every non-terminal attack of a campaign.
    #[instrument(skip(self), err)]
    pub async fn abandon_campaign(&self, campaign_id: Uuid) -> Result<()> {
        for attack in self.attacks.list_by_campaign(campaign_id).await? {
            if !attack.is_terminal() {
                self.abandon_attack(attack.id).await?;
            }
        }
        self.logger.event(RecordIds::campaign(campaign_id), "campaign_abandoned", &[]);
        Ok(())
    }

    /// User cancellation of a task: `{pending, running} → failed`.
    #[instrument(skip(self), err)]
    pub async fn cancel_task(&self, task_id: Uuid) -> Result<()> {
        let mut task = self.fetch_task(task_id).await?;
        let from = task.state.as_str();
        task.cancel().map_err(DomainError::ValidationFailed)?;
        self.tasks.update(&task).await.context("Failed to cancel task")?;
        self.logger.transition(
            RecordIds::task(task_id).with_attack(task.attack_id),
            "cancel",
            Some(from),
            Some("failed"),
            &[],
        );
        Ok(())
    }

    /// User retry of a failed task: back to pending with the counter up
    /// and the recorded error cleared.
    #[instrument(skip(self), err)]
    pub async fn retry_task(&self, task_id: Uuid) -> Result<()> {
        let mut task = self.fetch_task(task_id).await?;
        task.retry().map_err(DomainError::ValidationFailed)?;
        self.tasks.update(&task).await.context("Failed to retry task")?;
        self.logger.transition(
            RecordIds::task(task_id).with_attack(task.attack_id),
            "retry",
            Some("failed"),
            Some("pending"),
            &[("retry_count", json!(task.retry_count))],
        );
        Ok(())
    }

    /// Rebind a task to a different agent. A running task passes through
    /// pause/resume so the new agent re-syncs cracks at pickup.
    #[instrument(skip(self), err)]
    pub async fn reassign_task(&self, task_id: Uuid, new_agent: Uuid) -> Result<()> {
        let mut task = self.fetch_task(task_id).await?;
        let from = task.state.as_str();
        task.reassign(new_agent)
            .map_err(DomainError::ValidationFailed)?;
        self.tasks.update(&task).await.context("Failed to reassign task")?;
        self.logger.transition(
            RecordIds::task(task_id).with_attack(task.attack_id).with_agent(new_agent),
            "reassign",
            Some(from),
            Some(task.state.as_str()),
            &[],
        );
        Ok(())
    }

    /// Fail a running attack after a fatal agent error.
    #[instrument(skip(self), err)]
    pub async fn fail_attack(&self, attack_id: Uuid, reason: &str) -> Result<()> {
        let mut attack = self
            .attacks
            .get(attack_id)
            .await
            .context("Failed to fetch attack")?
            .ok_or(DomainError::AttackNotFound(attack_id))?;

        if attack.state != AttackState::Running {
            return Ok(());
        }

        attack
            .transition_to(AttackState::Failed)
            .map_err(DomainError::ValidationFailed)?;
        self.attacks
            .update(&attack)
            .await
            .context("Failed to fail attack")?;
        self.logger.transition(
            RecordIds::attack(attack_id).with_campaign(attack.campaign_id),
            "fail",
            Some("running"),
            Some("failed"),
            &[("reason", json!(reason))],
        );

        for mut task in self.tasks.list_by_attack(attack_id).await? {
            if matches!(task.state, TaskState::Pending | TaskState::Running)
                && task.cancel().is_ok()
            {
                task.last_error = Some(reason.to_string());
                self.tasks.update(&task).await?;
            }
        }
        Ok(())
    }

    async fn fetch(&self, campaign_id: Uuid) -> Result<Campaign> {
        Ok(self
            .campaigns
            .get(campaign_id)
            .await
            .context("Failed to fetch campaign")?
            .ok_or(DomainError::CampaignNotFound(campaign_id))?)
    }

    async fn fetch_task(&self, task_id: Uuid) -> Result<Task> {
        Ok(self
            .tasks
            .get(task_id)
            .await
            .context("Failed to fetch task")?
            .ok_or(DomainError::TaskNotFound(task_id))?)
    }
}
