//! Project domain model.
//!
//! Projects are the isolation boundary: agents, hash lists, and campaigns
//! never interact across projects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An isolation boundary owning hash lists, campaigns, and agent memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier
    pub id: Uuid,
    /// Human-readable name, unique per deployment
    pub name: String,
    /// When created
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Create a new project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }

    /// Validate project fields.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Project name cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_validation() {
        assert!(Project::new("ops").validate().is_ok());
        assert!(Project::new("  ").validate().is_err());
    }
}
