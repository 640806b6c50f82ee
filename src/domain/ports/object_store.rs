//! Object storage port.
//!
//! Wordlists, rules, and masks are opaque blobs the agent downloads
//! directly; the server only stats them and renders download references.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Metadata of one stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Content checksum as reported by the store
    pub checksum: Option<String>,
    /// Stored file name
    pub file_name: String,
    /// Size in bytes when known
    pub size: Option<u64>,
}

/// Interface over the blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Metadata for a key; None when the blob does not exist.
    async fn stat(&self, key: &str) -> DomainResult<Option<ObjectMeta>>;

    /// A URL an agent can download the blob from.
    fn download_url(&self, key: &str) -> String;

    /// Liveness probe of the store, bounded by the adapter's timeout.
    async fn probe(&self) -> DomainResult<()>;
}
