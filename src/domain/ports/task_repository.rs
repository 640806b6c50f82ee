//! Task repository port.
//!
//! Alongside plain persistence this port exposes the guarded atomic
//! operations the schedulers depend on: claims, preemption, and orphan
//! reclaim are single guarded updates so two concurrent schedulers cannot
//! both win the same task.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CampaignPriority, Task, TaskState};

/// A running task considered for preemption, with its derived progress.
#[derive(Debug, Clone)]
pub struct PreemptionCandidate {
    pub task: Task,
    /// Priority ordinal of the owning campaign
    pub priority: CampaignPriority,
    /// Fractional progress from the latest status frame; 0.0 without frames
    pub progress: f64,
}

/// Repository interface for Task persistence and atomic scheduling ops.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Create a new task. Fails with a unique violation if the (attack,
    /// agent) pair already holds an incomplete task.
    async fn create(&self, task: &Task) -> DomainResult<()>;

    /// Get a task by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Persist a mutated task. The write is guarded on the version the
    /// in-memory mutation started from; a concurrent writer surfaces as
    /// `ConcurrencyConflict`.
    async fn update(&self, task: &Task) -> DomainResult<()>;

    /// Tasks of one attack.
    async fn list_by_attack(&self, attack_id: Uuid) -> DomainResult<Vec<Task>>;

    /// Tasks in a given state bound to one agent.
    async fn list_by_agent_in_state(
        &self,
        agent_id: Uuid,
        state: TaskState,
    ) -> DomainResult<Vec<Task>>;

    /// Running tasks of one campaign.
    async fn list_running_by_campaign(&self, campaign_id: Uuid) -> DomainResult<Vec<Task>>;

    /// Assignment rule 1: the agent's own incomplete task, excluding tasks
    /// of abandoned attacks and tasks carrying a fatal error from this
    /// agent. Oldest first.
    async fn find_incomplete_for_agent(&self, agent_id: Uuid) -> DomainResult<Option<Task>>;

    /// Assignment rule 2: the agent's own pending or failed task, same
    /// exclusions as rule 1.
    async fn find_resumable_for_agent(&self, agent_id: Uuid) -> DomainResult<Option<Task>>;

    /// Assignment rule 3: atomically reclaim a paused task left by an
    /// offline agent on a live attack with uncracked items, within the
    /// requesting agent's projects. The winner sees the task rebound to
    /// `agent_id`, resumed to pending, and flagged stale.
    async fn reclaim_orphaned(&self, agent_id: Uuid) -> DomainResult<Option<Task>>;

    /// Guarded accept: `pending → running` for the owning agent only.
    /// Returns the refreshed task, or None if the guard failed.
    async fn accept(&self, task_id: Uuid, agent_id: Uuid) -> DomainResult<Option<Task>>;

    /// Guarded preemption: `running → pending`, increments the preemption
    /// count, flags stale, unbinds the agent. The guard re-validates state
    /// and the pin cap under the row write, so a concurrent completion or a
    /// second preemption loses cleanly (returns None).
    async fn preempt(&self, task_id: Uuid) -> DomainResult<Option<Task>>;

    /// Advance the activity timestamp; never moves it backwards.
    async fn touch_activity(&self, task_id: Uuid, at: DateTime<Utc>) -> DomainResult<()>;

    /// Set or clear the stale flag.
    async fn set_stale(&self, task_id: Uuid, stale: bool) -> DomainResult<()>;

    /// Running tasks on active agents in one project whose campaign
    /// priority is strictly below `ceiling` and whose preemption count is
    /// under the pin cap, joined with latest-frame progress. Selection
    /// ordering (priority, progress, activity age) is the caller's job.
    async fn preemption_candidates(
        &self,
        project_id: Uuid,
        ceiling: CampaignPriority,
    ) -> DomainResult<Vec<PreemptionCandidate>>;

    /// Whether every active agent currently holds an incomplete task.
    /// False when there are no active agents.
    async fn all_active_agents_busy(&self) -> DomainResult<bool>;

    /// Destroy a task, leaving a tombstone for the not-found diagnostic.
    async fn delete_with_tombstone(&self, task_id: Uuid) -> DomainResult<()>;

    /// Whether a tombstone younger than `within` exists for the id.
    async fn tombstoned_within(&self, task_id: Uuid, within: Duration) -> DomainResult<bool>;

    /// Task counts per state, for operator views.
    async fn count_by_state(&self) -> DomainResult<HashMap<TaskState, u64>>;
}
