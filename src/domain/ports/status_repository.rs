//! Status repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::HashcatStatus;

/// Repository interface for telemetry frames.
#[async_trait]
pub trait StatusRepository: Send + Sync {
    /// Persist a frame with its guess and device entries in one
    /// transaction.
    async fn insert(&self, status: &HashcatStatus) -> DomainResult<()>;

    /// The most recent frame of a task, by receive order.
    async fn latest_for_task(&self, task_id: Uuid) -> DomainResult<Option<HashcatStatus>>;

    /// Recent frames of a task, newest first.
    async fn list_for_task(&self, task_id: Uuid, limit: i64) -> DomainResult<Vec<HashcatStatus>>;
}
