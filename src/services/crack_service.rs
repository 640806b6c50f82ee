//! Crack submission service.
//!
//! Records a cracked hash for a task, propagates the crack to matching
//! items in other hash lists of the same project, and flags sibling tasks
//! stale so their agents re-pull cracks. When the submitting task's list
//! runs dry the owning attacks are completed.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{AttackState, TaskState};
use crate::domain::ports::{
    AttackRepository, CampaignRepository, CrackRecord, CrackRequest, HashListRepository,
    TaskRepository,
};
use crate::services::lifecycle_logger::{RecordIds, StateChangeLogger};

/// Expected, agent-meaningful failure of a crack submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrackErrorType {
    /// The hash value is not in the task's list
    NotFound,
}

/// Outcome of a crack submission, returned in-band to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrackResult {
    pub success: bool,
    pub error_type: Option<CrackErrorType>,
    /// Uncracked items remaining in the submitting task's list
    pub uncracked_count: Option<i64>,
}

impl CrackResult {
    fn not_found() -> Self {
        Self {
            success: false,
            error_type: Some(CrackErrorType::NotFound),
            uncracked_count: None,
        }
    }

    fn ok(uncracked_count: i64) -> Self {
        Self {
            success: true,
            error_type: None,
            uncracked_count: Some(uncracked_count),
        }
    }
}

/// Service recording cracks with cross-list propagation.
pub struct CrackService {
    tasks: Arc<dyn TaskRepository>,
    attacks: Arc<dyn AttackRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    hash_lists: Arc<dyn HashListRepository>,
    logger: StateChangeLogger,
}

impl CrackService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        attacks: Arc<dyn AttackRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        hash_lists: Arc<dyn HashListRepository>,
    ) -> Self {
        Self {
            tasks,
            attacks,
            campaigns,
            hash_lists,
            logger: StateChangeLogger::new(),
        }
    }

    /// Publish lifecycle records through a shared logger (builder form).
    pub fn with_logger(mut self, logger: StateChangeLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Record one cracked hash submitted by `task_id`.
    ///
    /// The "not found" outcome is expected (agents race each other to the
    /// same hash) and surfaced in-band; storage failures propagate for the
    /// caller to retry.
    #[instrument(skip(self, plain_text), fields(task_id = %task_id), err)]
    pub async fn submit(
        &self,
        task_id: Uuid,
        hash_value: &str,
        plain_text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<CrackResult> {
        let task = self
            .tasks
            .get(task_id)
            .await
            .context("Failed to fetch task")?
            .ok_or(DomainError::TaskNotFound(task_id))?;

        let attack = self
            .attacks
            .get(task.attack_id)
            .await
            .context("Failed to fetch attack")?
            .ok_or(DomainError::AttackNotFound(task.attack_id))?;

        let campaign = self
            .campaigns
            .get(attack.campaign_id)
            .await
            .context("Failed to fetch campaign")?
            .ok_or(DomainError::CampaignNotFound(attack.campaign_id))?;

        let hash_list = self
            .hash_lists
            .get(campaign.hash_list_id)
            .await
            .context("Failed to fetch hash list")?
            .ok_or(DomainError::HashListNotFound(campaign.hash_list_id))?;

        let request = CrackRequest {
            task_id,
            attack_id: attack.id,
            hash_list_id: hash_list.id,
            project_id: campaign.project_id,
            hash_type: hash_list.hash_type,
            hash_value: hash_value.to_string(),
            plain_text: plain_text.to_string(),
            timestamp,
        };

        let record = self
            .hash_lists
            .record_crack(&request)
            .await
            .context("Failed to record crack")?;

        let ids = RecordIds::task(task_id)
            .with_attack(attack.id)
            .with_campaign(campaign.id);

        match record {
            CrackRecord::NotFound => Ok(CrackResult::not_found()),
            CrackRecord::AlreadyCracked { uncracked_remaining } => {
                Ok(CrackResult::ok(uncracked_remaining))
            }
            CrackRecord::Cracked {
                uncracked_remaining,
                propagated,
                staled_tasks,
            } => {
                self.logger.event(
                    ids,
                    "crack_recorded",
                    &[
                        ("uncracked_remaining", json!(uncracked_remaining)),
                        ("propagated", json!(propagated)),
                        ("staled_tasks", json!(staled_tasks)),
                    ],
                );

                if uncracked_remaining == 0 {
                    self.complete_attacks_for_list(hash_list.id).await?;
                }

                Ok(CrackResult::ok(uncracked_remaining))
            }
        }
    }

    /// The list has no uncracked items left: complete its running attacks
    /// and settle their tasks.
    async fn complete_attacks_for_list(&self, hash_list_id: Uuid) -> Result<()> {
        let live = self
            .attacks
            .list_live_by_hash_list(hash_list_id)
            .await
            .context("Failed to list attacks for completed hash list")?;

        for mut attack in live {
            let from = attack.state.as_str();
            if attack.transition_to(AttackState::Completed).is_err() {
                continue;
            }
            self.attacks
                .update(&attack)
                .await
                .context("Failed to complete attack")?;
            self.logger.transition(
                RecordIds::attack(attack.id).with_campaign(attack.campaign_id),
                "complete",
                Some(from),
                Some("completed"),
                &[("reason", json!("hash list exhausted"))],
            );

            for mut task in self.tasks.list_by_attack(attack.id).await? {
                if !task.is_incomplete() {
                    continue;
                }
                let task_from = task.state.as_str();
                let outcome = if task.state == TaskState::Running {
                    task.complete()
                } else {
                    task.abandon()
                };
                if outcome.is_err() {
                    continue;
                }
                self.tasks
                    .update(&task)
                    .await
                    .context("Failed to settle task of completed attack")?;
                self.logger.transition(
                    RecordIds::task(task.id).with_attack(attack.id),
                    "complete",
                    Some(task_from),
                    Some(task.state.as_str()),
                    &[],
                );
            }
        }

        info!(hash_list_id = %hash_list_id, "hash list fully cracked");
        Ok(())
    }
}
