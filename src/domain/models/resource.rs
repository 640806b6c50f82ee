//! Attack resource files: word lists, rule lists, mask lists.
//!
//! The file content itself lives in object storage; the server only keeps
//! the metadata needed to render download references for agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of resource an attack can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    WordList,
    RuleList,
    MaskList,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WordList => "word_list",
            Self::RuleList => "rule_list",
            Self::MaskList => "mask_list",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "word_list" => Some(Self::WordList),
            "rule_list" => Some(Self::RuleList),
            "mask_list" => Some(Self::MaskList),
            _ => None,
        }
    }
}

/// Metadata for one content-addressed blob in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFile {
    /// Unique identifier
    pub id: Uuid,
    /// Owning project; None for resources shared across projects
    pub project_id: Option<Uuid>,
    /// What the resource is used as
    pub kind: ResourceKind,
    /// Original file name presented to agents
    pub file_name: String,
    /// Content checksum recorded at upload
    pub checksum: String,
    /// Key of the blob in object storage
    pub object_key: String,
    /// When registered
    pub created_at: DateTime<Utc>,
}

impl ResourceFile {
    pub fn new(
        kind: ResourceKind,
        file_name: impl Into<String>,
        checksum: impl Into<String>,
        object_key: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id: None,
            kind,
            file_name: file_name.into(),
            checksum: checksum.into(),
            object_key: object_key.into(),
            created_at: Utc::now(),
        }
    }

    /// Scope the resource to a project (builder form).
    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }
}
