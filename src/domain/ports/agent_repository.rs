//! Agent repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Agent, AgentError};

/// Repository interface for agents, memberships, and agent errors.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Create a new agent with its project memberships.
    async fn create(&self, agent: &Agent) -> DomainResult<()>;

    /// Get an agent by ID, memberships included.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Agent>>;

    /// Update an agent; memberships are replaced wholesale.
    async fn update(&self, agent: &Agent) -> DomainResult<()>;

    /// All agents.
    async fn list(&self) -> DomainResult<Vec<Agent>>;

    /// Agents currently in the `active` state.
    async fn list_active(&self) -> DomainResult<Vec<Agent>>;

    /// Record an incident.
    async fn record_error(&self, error: &AgentError) -> DomainResult<()>;

    /// Whether a fatal error ties this agent to this task. Fatal errors
    /// block handing the same task back to the same agent.
    async fn fatal_error_exists(&self, agent_id: Uuid, task_id: Uuid) -> DomainResult<bool>;

    /// Fatal errors recorded for the agent since the given instant.
    async fn count_fatal_errors_since(
        &self,
        agent_id: Uuid,
        since: DateTime<Utc>,
    ) -> DomainResult<i64>;

    /// All errors of an agent, newest first.
    async fn list_errors(&self, agent_id: Uuid) -> DomainResult<Vec<AgentError>>;
}
