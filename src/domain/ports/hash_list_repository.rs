//! Hash list repository port.
//!
//! Besides plain persistence this port carries `record_crack`, the one
//! compound operation of the crack pipeline: locating the item, writing the
//! crack, propagating it across same-project lists, and staling sibling
//! tasks must all commit or none of it may.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{HashItem, HashList, HashType};

/// Everything the crack pipeline needs to know about the submitting task.
#[derive(Debug, Clone)]
pub struct CrackRequest {
    /// Task that produced the crack (exempt from sibling staling)
    pub task_id: Uuid,
    /// Attack credited with the crack
    pub attack_id: Uuid,
    /// Hash list of the submitting task
    pub hash_list_id: Uuid,
    /// Project scope for cross-list propagation
    pub project_id: Uuid,
    /// Hash type that must match for propagation
    pub hash_type: HashType,
    /// The cracked hash
    pub hash_value: String,
    /// Recovered plain text
    pub plain_text: String,
    /// Agent-reported crack time
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a transactional crack recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrackRecord {
    /// No item with that hash value exists in the task's list
    NotFound,
    /// The item was already cracked; nothing changed
    AlreadyCracked { uncracked_remaining: i64 },
    /// The crack was written
    Cracked {
        /// Uncracked items left in the submitting task's list
        uncracked_remaining: i64,
        /// Items cracked in other lists of the same project
        propagated: u64,
        /// Sibling tasks flagged stale
        staled_tasks: u64,
    },
}

/// Repository interface for hash lists and their items.
#[async_trait]
pub trait HashListRepository: Send + Sync {
    /// Create a new hash list.
    async fn create(&self, list: &HashList) -> DomainResult<()>;

    /// Get a hash list by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<HashList>>;

    /// Mark a list's ingestion as finished.
    async fn mark_processed(&self, id: Uuid) -> DomainResult<()>;

    /// Add one item to a list.
    async fn add_item(&self, item: &HashItem) -> DomainResult<()>;

    /// Look up an item by value within a list.
    async fn get_item(&self, list_id: Uuid, hash_value: &str) -> DomainResult<Option<HashItem>>;

    /// All items of a list, in insertion order.
    async fn list_items(&self, list_id: Uuid) -> DomainResult<Vec<HashItem>>;

    /// Uncracked items of a list, in insertion order.
    async fn uncracked_items(&self, list_id: Uuid) -> DomainResult<Vec<HashItem>>;

    /// Number of uncracked items remaining in a list.
    async fn uncracked_count(&self, list_id: Uuid) -> DomainResult<i64>;

    /// Record a crack in one transaction: item update, same-project
    /// propagation (matching hash type and salt), sibling-task staling.
    /// Already-cracked items are skipped everywhere.
    async fn record_crack(&self, request: &CrackRequest) -> DomainResult<CrackRecord>;
}
