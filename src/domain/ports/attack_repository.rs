//! Attack repository port.
//!
//! The assignment hot path lives behind `find_candidates_for_agent`: one
//! query joins project membership, campaign pause state, attack state,
//! benchmark affinity, and remaining work, so the service only applies the
//! performance floor and ordering tie-breaks.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Attack, CampaignPriority, HashType};

/// An attack visible to an agent, with the context assignment needs.
#[derive(Debug, Clone)]
pub struct AttackCandidate {
    pub attack: Attack,
    /// Priority of the owning campaign
    pub priority: CampaignPriority,
    /// Project of the owning campaign
    pub project_id: Uuid,
    /// Hash list the attack targets
    pub hash_list_id: Uuid,
    /// Hash type of that list
    pub hash_type: HashType,
    /// The agent's most recent benchmark speed for the hash type
    pub benchmark_speed: f64,
}

/// Repository interface for Attack persistence and scheduling queries.
#[async_trait]
pub trait AttackRepository: Send + Sync {
    /// Create a new attack.
    async fn create(&self, attack: &Attack) -> DomainResult<()>;

    /// Get an attack by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Attack>>;

    /// Update an existing attack.
    async fn update(&self, attack: &Attack) -> DomainResult<()>;

    /// Attacks of one campaign.
    async fn list_by_campaign(&self, campaign_id: Uuid) -> DomainResult<Vec<Attack>>;

    /// Attacks visible to the agent per the assignment rules: project
    /// membership, campaign not paused, state pending or running, a
    /// benchmark exists for the hash type, and uncracked items remain.
    /// Ordered by `(complexity_value, created_at, id)` ascending. The
    /// performance floor is NOT applied here; candidates below it are
    /// returned so the caller can record the skip.
    async fn find_candidates_for_agent(&self, agent_id: Uuid)
        -> DomainResult<Vec<AttackCandidate>>;

    /// High-priority attacks in the agent's projects that are admissible
    /// (not paused, pending or running, uncracked items remain) but have no
    /// incomplete task holding a slot.
    async fn find_high_priority_needing_slot(
        &self,
        agent_id: Uuid,
    ) -> DomainResult<Vec<Attack>>;

    /// Non-terminal attacks targeting a hash list, for completion sweeps
    /// after the list's last hash cracks.
    async fn list_live_by_hash_list(&self, hash_list_id: Uuid) -> DomainResult<Vec<Attack>>;
}
