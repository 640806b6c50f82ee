//! Resource file repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::ResourceFile;

/// Repository interface for attack resource metadata.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Register a resource file.
    async fn create(&self, resource: &ResourceFile) -> DomainResult<()>;

    /// Get a resource by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<ResourceFile>>;
}
