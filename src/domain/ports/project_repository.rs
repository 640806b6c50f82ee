//! Project repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Project;

/// Repository interface for Project persistence.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Create a new project.
    async fn create(&self, project: &Project) -> DomainResult<()>;

    /// Get a project by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Project>>;

    /// List all projects.
    async fn list(&self) -> DomainResult<Vec<Project>>;
}
