//! Campaign domain model.
//!
//! A campaign groups attacks against one hash list and carries the priority
//! used by the preemption scheduler. Campaigns have no formal state machine;
//! their effective state composes from `paused` and the states of their
//! attacks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scheduling priority of a campaign.
///
/// The ordinal ordering is load-bearing: preemption only ever claims slots
/// from strictly lower ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignPriority {
    Deferred = 0,
    Low = 1,
    Normal = 2,
    High = 3,
}

impl Default for CampaignPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl CampaignPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deferred => "deferred",
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "deferred" => Some(Self::Deferred),
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Numeric ordinal used for priority comparison in SQL.
    pub fn ordinal(&self) -> i64 {
        *self as i64
    }
}

/// A named, priority-tagged grouping of attacks against one hash list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    /// Unique identifier
    pub id: Uuid,
    /// Owning project
    pub project_id: Uuid,
    /// Hash list every attack of this campaign targets
    pub hash_list_id: Uuid,
    /// Human-readable name
    pub name: String,
    /// Scheduling priority
    pub priority: CampaignPriority,
    /// When true, none of this campaign's tasks may run
    pub paused: bool,
    /// User that created the campaign
    pub creator: String,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Create a new campaign at normal priority.
    pub fn new(
        project_id: Uuid,
        hash_list_id: Uuid,
        name: impl Into<String>,
        creator: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            hash_list_id,
            name: name.into(),
            priority: CampaignPriority::default(),
            paused: false,
            creator: creator.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set priority (builder form).
    pub fn with_priority(mut self, priority: CampaignPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Validate campaign fields.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Campaign name cannot be empty".to_string());
        }
        if self.creator.trim().is_empty() {
            return Err("Campaign creator cannot be empty".to_string());
        }
        Ok(())
    }
}

/// The caller on whose behalf a service mutation runs.
///
/// Authorization policy lives outside this core, but capability-gated
/// operations (raising a campaign to high priority) still need an explicit
/// caller record rather than ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Stable user identifier
    pub user: String,
    /// Whether this caller may set `CampaignPriority::High`
    pub can_set_high_priority: bool,
}

impl Caller {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            can_set_high_priority: false,
        }
    }

    pub fn with_high_priority_grant(mut self) -> Self {
        self.can_set_high_priority = true;
        self
    }
}
