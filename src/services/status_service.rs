//! Status submission service.
//!
//! Ingests one telemetry frame from a running agent: validates its shape,
//! persists it with its guess and device children, advances the task's
//! activity timestamp, and reads back the stale/paused flags the agent
//! must react to.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{HashcatStatus, StatusFrame, TaskState};
use crate::domain::ports::{StatusRepository, TaskRepository};

/// Validation failure of a status frame. Nothing is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusErrorType {
    /// The frame carries no guess record
    GuessNotFound,
    /// The frame carries no device entries
    DeviceStatusesNotFound,
}

/// Outcome of a status submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusResult {
    /// Frame accepted; keep cracking
    Ok,
    /// Frame accepted; the agent must re-pull cracks before continuing
    Stale,
    /// Frame accepted; the task is paused and the agent should back off
    Paused,
    /// Frame rejected
    Error(StatusErrorType),
}

/// Service ingesting agent telemetry.
pub struct StatusService {
    tasks: Arc<dyn TaskRepository>,
    statuses: Arc<dyn StatusRepository>,
}

impl StatusService {
    pub fn new(tasks: Arc<dyn TaskRepository>, statuses: Arc<dyn StatusRepository>) -> Self {
        Self { tasks, statuses }
    }

    /// Ingest one frame for `task_id`.
    ///
    /// A malformed frame (missing guess or empty device list) is rejected
    /// without touching the task. The stale/paused readouts never mutate
    /// state; they only tell the agent what to do next.
    #[instrument(skip(self, frame), fields(task_id = %task_id), err)]
    pub async fn submit_status(&self, task_id: Uuid, frame: StatusFrame) -> Result<StatusResult> {
        if frame.hashcat_guess.is_none() {
            return Ok(StatusResult::Error(StatusErrorType::GuessNotFound));
        }
        if frame.device_statuses.is_empty() {
            return Ok(StatusResult::Error(StatusErrorType::DeviceStatusesNotFound));
        }

        let task = self
            .tasks
            .get(task_id)
            .await
            .context("Failed to fetch task")?
            .ok_or(DomainError::TaskNotFound(task_id))?;

        let status = HashcatStatus::from_frame(task_id, frame);
        self.statuses
            .insert(&status)
            .await
            .context("Failed to persist status frame")?;

        self.tasks
            .touch_activity(task_id, Utc::now())
            .await
            .context("Failed to touch task activity")?;

        if task.stale {
            return Ok(StatusResult::Stale);
        }
        if task.state == TaskState::Paused {
            return Ok(StatusResult::Paused);
        }
        Ok(StatusResult::Ok)
    }
}
