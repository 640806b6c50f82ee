//! Error taxonomy surfaced to agents and operators.
//!
//! Expected, agent-meaningful outcomes (missing hash, stale, paused, task
//! assigned elsewhere) travel in-band; only storage and transport failures
//! map to `Internal`. The task-not-found diagnostic distinguishes "exists,
//! assigned elsewhere", "recently deleted", and "never existed" via task
//! tombstones.

use chrono::Duration;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::ports::TaskRepository;

/// A tombstone older than this no longer counts as "recently deleted".
const DELETED_RECENTLY_WINDOW_HOURS: i64 = 24;

/// Wire-visible error kinds. Names are contracts to the agent and UI.
/// The benign crack miss is not here: it travels in-band as the
/// `not_found` marker on the crack response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// Frame carried no guess record
    GuessNotFound,
    /// Frame carried no device entries
    DeviceStatusesNotFound,
    /// The task exists but belongs to another agent
    TaskNotAssigned,
    /// The task was destroyed within the last 24 hours
    TaskDeleted,
    /// No task with that id ever existed (as far as we can tell)
    TaskInvalid,
    /// Agent benchmarked below the floor for this hash type
    PerformanceThreshold,
    /// Storage or transport failure; the agent should retry
    Internal,
}

impl ApiErrorKind {
    /// Whether the controller should retry before surfacing this.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Internal)
    }
}

/// An error response handed to the transport layer.
#[derive(Debug, Error, Serialize)]
#[error("{kind:?}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Why a task lookup on behalf of an agent came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskLookupFailure {
    AssignedElsewhere,
    /// The requester owns the task but a state guard rejected the request
    InvalidState,
    DeletedRecently,
    NeverExisted,
}

impl TaskLookupFailure {
    pub fn into_api_error(self, task_id: Uuid) -> ApiError {
        match self {
            Self::AssignedElsewhere => ApiError::new(
                ApiErrorKind::TaskNotAssigned,
                format!("task {task_id} is assigned to another agent"),
            ),
            Self::InvalidState => ApiError::new(
                ApiErrorKind::TaskInvalid,
                format!("task {task_id} is not in a state accepting this request"),
            ),
            Self::DeletedRecently => ApiError::new(
                ApiErrorKind::TaskDeleted,
                format!("task {task_id} was recently deleted"),
            ),
            Self::NeverExisted => ApiError::new(
                ApiErrorKind::TaskInvalid,
                format!("task {task_id} does not exist"),
            ),
        }
    }
}

/// Classify a failed task lookup for the requesting agent.
pub async fn classify_task_lookup(
    tasks: &dyn TaskRepository,
    task_id: Uuid,
    requesting_agent: Uuid,
) -> anyhow::Result<TaskLookupFailure> {
    if let Some(task) = tasks.get(task_id).await? {
        if task.agent_id == Some(requesting_agent) {
            return Ok(TaskLookupFailure::InvalidState);
        }
        return Ok(TaskLookupFailure::AssignedElsewhere);
    }

    let recently = tasks
        .tombstoned_within(task_id, Duration::hours(DELETED_RECENTLY_WINDOW_HOURS))
        .await?;

    if recently {
        Ok(TaskLookupFailure::DeletedRecently)
    } else {
        Ok(TaskLookupFailure::NeverExisted)
    }
}
