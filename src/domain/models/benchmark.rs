//! Hashcat benchmark domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::hash_list::HashType;

/// Minimum guesses/sec an agent must benchmark at to be eligible for a hash
/// type. Below this the agent is skipped and an info-severity error logged.
pub const MIN_PERFORMANCE_BENCHMARK: f64 = 1000.0;

/// One measured `(agent, hash_type) → hash_speed` data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashcatBenchmark {
    /// Unique identifier
    pub id: Uuid,
    /// Agent that produced the measurement
    pub agent_id: Uuid,
    /// Hash mode measured
    pub hash_type: HashType,
    /// Guesses per second across all selected devices
    pub hash_speed: f64,
    /// Devices participating in the measurement
    pub device_count: i64,
    /// Wall-clock benchmark runtime
    pub runtime_ms: i64,
    /// When recorded
    pub created_at: DateTime<Utc>,
}

impl HashcatBenchmark {
    pub fn new(agent_id: Uuid, hash_type: HashType, hash_speed: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            hash_type,
            hash_speed,
            device_count: 1,
            runtime_ms: 0,
            created_at: Utc::now(),
        }
    }

    /// Whether this measurement clears the assignment floor.
    pub fn meets_performance_floor(&self) -> bool {
        self.hash_speed >= MIN_PERFORMANCE_BENCHMARK
    }
}
