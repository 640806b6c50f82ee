//! SQLite implementation of the BenchmarkRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{HashType, HashcatBenchmark};
use crate::domain::ports::BenchmarkRepository;

#[derive(Clone)]
pub struct SqliteBenchmarkRepository {
    pool: SqlitePool,
}

impl SqliteBenchmarkRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BenchmarkRepository for SqliteBenchmarkRepository {
    async fn replace_for_agent(
        &self,
        agent_id: Uuid,
        benchmarks: &[HashcatBenchmark],
    ) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM benchmarks WHERE agent_id = ?")
            .bind(agent_id.to_string())
            .execute(&mut *tx)
            .await?;

        for benchmark in benchmarks {
            sqlx::query(
                r#"INSERT INTO benchmarks (id, agent_id, hash_type, hash_speed, device_count,
                   runtime_ms, created_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(benchmark.id.to_string())
            .bind(agent_id.to_string())
            .bind(benchmark.hash_type.0)
            .bind(benchmark.hash_speed)
            .bind(benchmark.device_count)
            .bind(benchmark.runtime_ms)
            .bind(benchmark.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn latest_for_agent(
        &self,
        agent_id: Uuid,
        hash_type: HashType,
    ) -> DomainResult<Option<HashcatBenchmark>> {
        let row: Option<BenchmarkRow> = sqlx::query_as(
            r#"SELECT * FROM benchmarks WHERE agent_id = ? AND hash_type = ?
               ORDER BY created_at DESC, id DESC LIMIT 1"#,
        )
        .bind(agent_id.to_string())
        .bind(hash_type.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_for_agent(&self, agent_id: Uuid) -> DomainResult<Vec<HashcatBenchmark>> {
        let rows: Vec<BenchmarkRow> =
            sqlx::query_as("SELECT * FROM benchmarks WHERE agent_id = ? ORDER BY hash_type")
                .bind(agent_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn best_speed_for_hash_type(&self, hash_type: HashType) -> DomainResult<Option<f64>> {
        let row: (Option<f64>,) =
            sqlx::query_as("SELECT MAX(hash_speed) FROM benchmarks WHERE hash_type = ?")
                .bind(hash_type.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }
}

#[derive(sqlx::FromRow)]
struct BenchmarkRow {
    id: String,
    agent_id: String,
    hash_type: i64,
    hash_speed: f64,
    device_count: i64,
    runtime_ms: i64,
    created_at: String,
}

impl TryFrom<BenchmarkRow> for HashcatBenchmark {
    type Error = DomainError;

    fn try_from(row: BenchmarkRow) -> Result<Self, Self::Error> {
        Ok(HashcatBenchmark {
            id: super::parse_uuid(&row.id)?,
            agent_id: super::parse_uuid(&row.agent_id)?,
            hash_type: HashType(row.hash_type),
            hash_speed: row.hash_speed,
            device_count: row.device_count,
            runtime_ms: row.runtime_ms,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}
