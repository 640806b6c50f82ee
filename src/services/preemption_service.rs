//! Task preemption service.
//!
//! When a high-priority attack is admitted to a saturated fleet, one
//! lower-priority running task in the same project gives up its slot. The
//! victim is the least-complete task of the lowest-priority group, with
//! near-finishers and twice-preempted tasks protected.

use anyhow::{Context, Result};
use serde_json::json;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{Task, PREEMPTION_PROGRESS_CUTOFF};
use crate::domain::ports::{
    AttackRepository, CampaignRepository, PreemptionCandidate, TaskRepository,
};
use crate::services::lifecycle_logger::{RecordIds, StateChangeLogger};

/// Service reclaiming slots for high-priority attacks.
pub struct PreemptionService {
    tasks: Arc<dyn TaskRepository>,
    attacks: Arc<dyn AttackRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    logger: StateChangeLogger,
}

impl PreemptionService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        attacks: Arc<dyn AttackRepository>,
        campaigns: Arc<dyn CampaignRepository>,
    ) -> Self {
        Self {
            tasks,
            attacks,
            campaigns,
            logger: StateChangeLogger::new(),
        }
    }

    /// Publish lifecycle records through a shared logger (builder form).
    pub fn with_logger(mut self, logger: StateChangeLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Free one slot for `incoming_attack` if the fleet is saturated.
    ///
    /// Returns the preempted task, or None when nothing qualified: the
    /// fleet still has idle agents, no lower-priority work runs in the
    /// attack's project, or every candidate is pinned or nearly done.
    #[instrument(skip(self), fields(attack_id = %incoming_attack), err)]
    pub async fn preempt_if_needed(&self, incoming_attack: Uuid) -> Result<Option<Task>> {
        let attack = self
            .attacks
            .get(incoming_attack)
            .await
            .context("Failed to fetch incoming attack")?
            .ok_or(DomainError::AttackNotFound(incoming_attack))?;

        let campaign = self
            .campaigns
            .get(attack.campaign_id)
            .await
            .context("Failed to fetch campaign of incoming attack")?
            .ok_or(DomainError::CampaignNotFound(attack.campaign_id))?;

        // Only a saturated fleet justifies taking work away from anyone.
        if !self
            .tasks
            .all_active_agents_busy()
            .await
            .context("Failed to check fleet saturation")?
        {
            return Ok(None);
        }

        let mut candidates = self
            .tasks
            .preemption_candidates(campaign.project_id, campaign.priority)
            .await
            .context("Failed to enumerate preemption candidates")?;

        // Near-finishers keep their slot.
        candidates.retain(|c| c.progress < PREEMPTION_PROGRESS_CUTOFF);

        // Lowest priority group first; within it, least progress; ties go
        // to the longest-silent task. Tasks with no frames sort as 0%.
        candidates.sort_by(compare_candidates);

        for candidate in candidates {
            if !candidate.task.is_preemptable(candidate.progress) {
                warn!(
                    task_id = %candidate.task.id,
                    progress = candidate.progress,
                    "preemption candidate no longer preemptable"
                );
                continue;
            }

            // The guarded update re-validates state and the pin cap under
            // the row write; a concurrent completion loses cleanly.
            match self.tasks.preempt(candidate.task.id).await {
                Ok(Some(preempted)) => {
                    self.logger.transition(
                        RecordIds::task(preempted.id)
                            .with_attack(preempted.attack_id)
                            .with_campaign(campaign.id),
                        "preempt",
                        Some("running"),
                        Some("pending"),
                        &[
                            ("for_attack", json!(incoming_attack.to_string())),
                            ("preemption_count", json!(preempted.preemption_count)),
                            ("progress", json!(candidate.progress)),
                        ],
                    );
                    return Ok(Some(preempted));
                }
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        task_id = %candidate.task.id,
                        error = %e,
                        "preemption attempt failed; trying next candidate"
                    );
                }
            }
        }

        Ok(None)
    }
}

fn compare_candidates(a: &PreemptionCandidate, b: &PreemptionCandidate) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| a.progress.partial_cmp(&b.progress).unwrap_or(Ordering::Equal))
        .then_with(|| match (a.task.activity_timestamp, b.task.activity_timestamp) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(&y),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::CampaignPriority;
    use chrono::{Duration, Utc};

    fn candidate(
        priority: CampaignPriority,
        progress: f64,
        activity_secs_ago: Option<i64>,
    ) -> PreemptionCandidate {
        let mut task = Task::new(Uuid::new_v4(), Uuid::new_v4());
        task.accept().unwrap();
        task.activity_timestamp = activity_secs_ago.map(|s| Utc::now() - Duration::seconds(s));
        PreemptionCandidate {
            task,
            priority,
            progress,
        }
    }

    #[test]
    fn test_lowest_priority_group_wins() {
        let mut candidates = vec![
            candidate(CampaignPriority::Normal, 0.1, None),
            candidate(CampaignPriority::Deferred, 0.8, None),
            candidate(CampaignPriority::Low, 0.2, None),
        ];
        candidates.sort_by(compare_candidates);
        assert_eq!(candidates[0].priority, CampaignPriority::Deferred);
        assert_eq!(candidates[1].priority, CampaignPriority::Low);
    }

    #[test]
    fn test_least_progress_within_group() {
        let mut candidates = vec![
            candidate(CampaignPriority::Normal, 0.75, None),
            candidate(CampaignPriority::Normal, 0.25, None),
        ];
        candidates.sort_by(compare_candidates);
        assert!((candidates[0].progress - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_activity_breaks_progress_ties() {
        let old = candidate(CampaignPriority::Normal, 0.5, Some(600));
        let recent = candidate(CampaignPriority::Normal, 0.5, Some(5));
        let old_id = old.task.id;

        let mut candidates = vec![recent, old];
        candidates.sort_by(compare_candidates);
        assert_eq!(candidates[0].task.id, old_id);
    }

    #[test]
    fn test_frameless_tasks_sort_first() {
        let silent = candidate(CampaignPriority::Normal, 0.0, None);
        let reporting = candidate(CampaignPriority::Normal, 0.0, Some(5));
        let silent_id = silent.task.id;

        let mut candidates = vec![reporting, silent];
        candidates.sort_by(compare_candidates);
        assert_eq!(candidates[0].task.id, silent_id);
    }
}
