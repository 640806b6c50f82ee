//! Benchmark repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{HashType, HashcatBenchmark};

/// Repository interface for hashcat benchmarks.
#[async_trait]
pub trait BenchmarkRepository: Send + Sync {
    /// Replace the agent's benchmark set in one transaction. A benchmark
    /// submission always carries the full set.
    async fn replace_for_agent(
        &self,
        agent_id: Uuid,
        benchmarks: &[HashcatBenchmark],
    ) -> DomainResult<()>;

    /// The agent's most recent benchmark for a hash type.
    async fn latest_for_agent(
        &self,
        agent_id: Uuid,
        hash_type: HashType,
    ) -> DomainResult<Option<HashcatBenchmark>>;

    /// All benchmarks of one agent.
    async fn list_for_agent(&self, agent_id: Uuid) -> DomainResult<Vec<HashcatBenchmark>>;

    /// The best speed any agent has recorded for a hash type. Drives the
    /// total-ETA estimate.
    async fn best_speed_for_hash_type(&self, hash_type: HashType) -> DomainResult<Option<f64>>;
}
