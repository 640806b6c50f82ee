//! Domain errors for the CipherSwarm scheduling core.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the CipherSwarm system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Project not found: {0}")]
    ProjectNotFound(Uuid),

    #[error("Campaign not found: {0}")]
    CampaignNotFound(Uuid),

    #[error("Attack not found: {0}")]
    AttackNotFound(Uuid),

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Agent not found: {0}")]
    AgentNotFound(Uuid),

    #[error("Hash list not found: {0}")]
    HashListNotFound(Uuid),

    #[error("Invalid {entity} transition from {from} to {to}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Concurrency conflict: {entity} {id} was modified")]
    ConcurrencyConflict { entity: &'static str, id: String },

    #[error("In-memory store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Object storage error: {0}")]
    ObjectStorage(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl DomainError {
    /// Whether this error is a unique-constraint violation surfaced by the
    /// database. The assignment path uses this to detect a lost insert race.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::DatabaseError(msg) if msg.contains("UNIQUE constraint"))
    }
}
