//! Hash list and hash item domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A hashcat hash mode, e.g. 0 for MD5 or 1000 for NTLM.
///
/// The numeric code is passed straight through to the agent; the server only
/// uses it for benchmark affinity and crack propagation matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashType(pub i64);

impl HashType {
    pub const MD5: Self = Self(0);
    pub const SHA1: Self = Self(100);
    pub const NTLM: Self = Self(1000);
}

impl std::fmt::Display for HashType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered collection of hash items of a single hash type within a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashList {
    /// Unique identifier
    pub id: Uuid,
    /// Owning project
    pub project_id: Uuid,
    /// Human-readable name
    pub name: String,
    /// Hash mode of every item in this list
    pub hash_type: HashType,
    /// True once ingestion has populated the items
    pub processed: bool,
    /// When created
    pub created_at: DateTime<Utc>,
}

impl HashList {
    /// Create a new, not-yet-processed hash list.
    pub fn new(project_id: Uuid, name: impl Into<String>, hash_type: HashType) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            hash_type,
            processed: false,
            created_at: Utc::now(),
        }
    }

    /// Mark ingestion as finished.
    pub fn mark_processed(&mut self) {
        self.processed = true;
    }
}

/// A single hash within a hash list.
///
/// Once `cracked` is set, `plain_text` and `cracked_time` are always present
/// and never cleared again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashItem {
    /// Unique identifier
    pub id: Uuid,
    /// Owning hash list
    pub hash_list_id: Uuid,
    /// Opaque hash string as submitted
    pub hash_value: String,
    /// Salt for salted modes; None for unsalted
    pub salt: Option<String>,
    /// Whether a plain text has been recovered
    pub cracked: bool,
    /// Recovered plain text
    pub plain_text: Option<String>,
    /// When the crack was recorded
    pub cracked_time: Option<DateTime<Utc>>,
    /// Attack that produced the crack, when known
    pub attack_id: Option<Uuid>,
    /// When created
    pub created_at: DateTime<Utc>,
}

impl HashItem {
    /// Create a new uncracked item.
    pub fn new(hash_list_id: Uuid, hash_value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            hash_list_id,
            hash_value: hash_value.into(),
            salt: None,
            cracked: false,
            plain_text: None,
            cracked_time: None,
            attack_id: None,
            created_at: Utc::now(),
        }
    }

    /// Attach a salt (builder form).
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    /// Record a crack. Idempotent: returns false if already cracked, in
    /// which case nothing changes.
    pub fn crack(
        &mut self,
        plain_text: impl Into<String>,
        attack_id: Uuid,
        at: DateTime<Utc>,
    ) -> bool {
        if self.cracked {
            return false;
        }
        self.cracked = true;
        self.plain_text = Some(plain_text.into());
        self.cracked_time = Some(at);
        self.attack_id = Some(attack_id);
        true
    }
}
