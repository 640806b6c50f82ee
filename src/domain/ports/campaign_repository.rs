//! Campaign repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::Campaign;

/// Repository interface for Campaign persistence.
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Create a new campaign.
    async fn create(&self, campaign: &Campaign) -> DomainResult<()>;

    /// Get a campaign by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Campaign>>;

    /// Update an existing campaign.
    async fn update(&self, campaign: &Campaign) -> DomainResult<()>;

    /// Campaigns of one project.
    async fn list_by_project(&self, project_id: Uuid) -> DomainResult<Vec<Campaign>>;

    /// All campaigns.
    async fn list(&self) -> DomainResult<Vec<Campaign>>;
}
