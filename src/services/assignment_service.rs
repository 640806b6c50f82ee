//! Task assignment service.
//!
//! `next_assignment` is the hot path behind every agent pickup. The lookup
//! order is strict and the first rule that yields a task wins:
//!
//! 1. resume the agent's own incomplete work,
//! 2. retry the agent's own pending/failed tasks,
//! 3. reclaim a paused task orphaned by an offline agent,
//! 4. create a task from the cheapest eligible attack,
//! 5. preempt a lower-priority task for waiting high-priority work and
//!    try rule 4 once more.

use anyhow::{Context, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{
    AgentError, AttackState, ErrorSeverity, Task, TaskState, MIN_PERFORMANCE_BENCHMARK,
};
use crate::domain::ports::{AgentRepository, AttackRepository, TaskRepository};
use crate::services::lifecycle_logger::{RecordIds, StateChangeLogger};
use crate::services::preemption_service::PreemptionService;

/// Outcome of one pickup attempt.
#[derive(Debug, Clone)]
pub enum Assignment {
    /// A task was granted.
    Granted(Task),
    /// Nothing was available. `floor_skipped` counts the attacks passed
    /// over only because the agent benchmarks below the performance
    /// floor; when positive, the emptiness is the agent's hardware, not
    /// a lack of work.
    Empty { floor_skipped: usize },
}

impl Assignment {
    /// The granted task, if any.
    pub fn into_task(self) -> Option<Task> {
        match self {
            Self::Granted(task) => Some(task),
            Self::Empty { .. } => None,
        }
    }
}

/// Service handing out work to agents.
pub struct AssignmentService {
    tasks: Arc<dyn TaskRepository>,
    attacks: Arc<dyn AttackRepository>,
    agents: Arc<dyn AgentRepository>,
    preemption: Arc<PreemptionService>,
    logger: StateChangeLogger,
}

impl AssignmentService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        attacks: Arc<dyn AttackRepository>,
        agents: Arc<dyn AgentRepository>,
        preemption: Arc<PreemptionService>,
    ) -> Self {
        Self {
            tasks,
            attacks,
            agents,
            preemption,
            logger: StateChangeLogger::new(),
        }
    }

    /// Publish lifecycle records through a shared logger (builder form).
    pub fn with_logger(mut self, logger: StateChangeLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Return the next task for `agent_id`, or None when nothing is
    /// available. Calling twice with no intervening state change returns
    /// the same task.
    pub async fn find_next_task(&self, agent_id: Uuid) -> Result<Option<Task>> {
        Ok(self.next_assignment(agent_id).await?.into_task())
    }

    /// Full pickup outcome, distinguishing "no work" from "work exists
    /// but the agent benchmarks below the floor for all of it".
    #[instrument(skip(self), fields(agent_id = %agent_id), err)]
    pub async fn next_assignment(&self, agent_id: Uuid) -> Result<Assignment> {
        let agent = self
            .agents
            .get(agent_id)
            .await
            .context("Failed to fetch agent")?
            .ok_or(DomainError::AgentNotFound(agent_id))?;

        if agent.project_ids.is_empty() {
            debug!("agent has no project memberships");
            return Ok(Assignment::Empty { floor_skipped: 0 });
        }

        // Rule 1: the agent's own incomplete work always comes back first,
        // so a crashed or restarted agent resumes instead of forking.
        if let Some(task) = self
            .tasks
            .find_incomplete_for_agent(agent_id)
            .await
            .context("Failed to look up incomplete tasks")?
        {
            return Ok(Assignment::Granted(task));
        }

        // Rule 2: the agent's own pending or failed tasks. A failed task
        // is retried on the way out: counter up, error cleared.
        if let Some(mut task) = self
            .tasks
            .find_resumable_for_agent(agent_id)
            .await
            .context("Failed to look up resumable tasks")?
        {
            if task.state == TaskState::Failed {
                if task.retry().is_ok() {
                    self.tasks
                        .update(&task)
                        .await
                        .context("Failed to persist task retry")?;
                    self.logger.transition(
                        RecordIds::task(task.id).with_agent(agent_id),
                        "retry",
                        Some("failed"),
                        Some("pending"),
                        &[("retry_count", json!(task.retry_count))],
                    );
                }
            }
            return Ok(Assignment::Granted(task));
        }

        // Rule 3: reclaim a paused task an offline agent left behind.
        if let Some(task) = self
            .tasks
            .reclaim_orphaned(agent_id)
            .await
            .context("Failed to reclaim orphaned tasks")?
        {
            self.logger.transition(
                RecordIds::task(task.id).with_agent(agent_id).with_attack(task.attack_id),
                "reclaim",
                Some("paused"),
                Some("pending"),
                &[],
            );
            return Ok(Assignment::Granted(task));
        }

        // Rule 4: create from the cheapest eligible attack.
        let (task, mut floor_skipped) = self.create_from_available_attack(agent_id).await?;
        if let Some(task) = task {
            return Ok(Assignment::Granted(task));
        }

        // Rule 5: make room for waiting high-priority attacks, then try
        // rule 4 once more.
        let waiting = self
            .attacks
            .find_high_priority_needing_slot(agent_id)
            .await
            .context("Failed to enumerate waiting high-priority attacks")?;

        for attack in waiting {
            if self
                .preemption
                .preempt_if_needed(attack.id)
                .await
                .context("Preemption attempt failed")?
                .is_some()
            {
                let (task, retry_skipped) = self.create_from_available_attack(agent_id).await?;
                floor_skipped += retry_skipped;
                return Ok(match task {
                    Some(task) => Assignment::Granted(task),
                    None => Assignment::Empty { floor_skipped },
                });
            }
        }

        Ok(Assignment::Empty { floor_skipped })
    }

    /// Rule 4 proper: walk the eligible attacks cheapest-first and bind a
    /// new task to the first one that clears the performance floor.
    /// Returns the task (if any) and the number of floor-skipped attacks.
    async fn create_from_available_attack(
        &self,
        agent_id: Uuid,
    ) -> Result<(Option<Task>, usize)> {
        let candidates = self
            .attacks
            .find_candidates_for_agent(agent_id)
            .await
            .context("Failed to enumerate candidate attacks")?;

        let mut floor_skipped = 0usize;
        for candidate in candidates {
            if candidate.benchmark_speed < MIN_PERFORMANCE_BENCHMARK {
                self.agents
                    .record_error(
                        &AgentError::new(agent_id, ErrorSeverity::Info, "performance threshold")
                            .with_metadata(json!({
                                "hash_type": candidate.hash_type.0,
                                "benchmark_speed": candidate.benchmark_speed,
                                "required": MIN_PERFORMANCE_BENCHMARK,
                            })),
                    )
                    .await
                    .context("Failed to record performance-threshold error")?;
                floor_skipped += 1;
                continue;
            }

            let mut attack = candidate.attack;
            let task = Task::new(attack.id, agent_id);
            match self.tasks.create(&task).await {
                Ok(()) => {}
                // Another pickup won the slot between our read and insert.
                Err(e) if e.is_unique_violation() => continue,
                Err(e) => return Err(e).context("Failed to create task"),
            }

            if attack.state == AttackState::Pending && attack.transition_to(AttackState::Running).is_ok() {
                self.attacks
                    .update(&attack)
                    .await
                    .context("Failed to start attack")?;
                self.logger.transition(
                    RecordIds::attack(attack.id).with_campaign(attack.campaign_id),
                    "run",
                    Some("pending"),
                    Some("running"),
                    &[],
                );
            }

            info!(
                task_id = %task.id,
                attack_id = %task.attack_id,
                complexity = attack.complexity_value,
                "created task for agent"
            );
            return Ok((Some(task), floor_skipped));
        }

        Ok((None, floor_skipped))
    }
}
