//! SQLite implementation of the TaskRepository.
//!
//! The scheduling transitions (accept, preempt, orphan reclaim) are single
//! guarded UPDATEs: the WHERE clause re-validates state under the row
//! write, so concurrent schedulers serialize on the database and the loser
//! simply affects zero rows.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    CampaignPriority, Task, TaskState, PREEMPTION_PIN_COUNT,
};
use crate::domain::ports::{PreemptionCandidate, TaskRepository};

#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO tasks (id, attack_id, agent_id, state, stale, retry_count,
               preemption_count, last_error, activity_timestamp, version, created_at,
               updated_at, started_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(task.attack_id.to_string())
        .bind(task.agent_id.map(|id| id.to_string()))
        .bind(task.state.as_str())
        .bind(task.stale)
        .bind(task.retry_count)
        .bind(task.preemption_count)
        .bind(&task.last_error)
        .bind(task.activity_timestamp.map(|t| t.to_rfc3339()))
        .bind(task.version)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(task.started_at.map(|t| t.to_rfc3339()))
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        // Domain mutators bump `version` in memory; the guard checks the
        // version the mutation started from.
        let result = sqlx::query(
            r#"UPDATE tasks SET agent_id = ?, state = ?, stale = ?, retry_count = ?,
               preemption_count = ?, last_error = ?, activity_timestamp = ?, version = ?,
               updated_at = ?, started_at = ?, completed_at = ?
               WHERE id = ? AND version = ?"#,
        )
        .bind(task.agent_id.map(|id| id.to_string()))
        .bind(task.state.as_str())
        .bind(task.stale)
        .bind(task.retry_count)
        .bind(task.preemption_count)
        .bind(&task.last_error)
        .bind(task.activity_timestamp.map(|t| t.to_rfc3339()))
        .bind(task.version)
        .bind(task.updated_at.to_rfc3339())
        .bind(task.started_at.map(|t| t.to_rfc3339()))
        .bind(task.completed_at.map(|t| t.to_rfc3339()))
        .bind(task.id.to_string())
        .bind(task.version - 1)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return if self.get(task.id).await?.is_some() {
                Err(DomainError::ConcurrencyConflict {
                    entity: "task",
                    id: task.id.to_string(),
                })
            } else {
                Err(DomainError::TaskNotFound(task.id))
            };
        }
        Ok(())
    }

    async fn list_by_attack(&self, attack_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> =
            sqlx::query_as("SELECT * FROM tasks WHERE attack_id = ? ORDER BY created_at, id")
                .bind(attack_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_by_agent_in_state(
        &self,
        agent_id: Uuid,
        state: TaskState,
    ) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT * FROM tasks WHERE agent_id = ? AND state = ? ORDER BY created_at, id",
        )
        .bind(agent_id.to_string())
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_running_by_campaign(&self, campaign_id: Uuid) -> DomainResult<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            r#"SELECT t.* FROM tasks t
               JOIN attacks a ON a.id = t.attack_id
               WHERE a.campaign_id = ? AND t.state = 'running'
               ORDER BY t.created_at, t.id"#,
        )
        .bind(campaign_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_incomplete_for_agent(&self, agent_id: Uuid) -> DomainResult<Option<Task>> {
        self.find_own_task(agent_id, &["pending", "running", "paused"])
            .await
    }

    async fn find_resumable_for_agent(&self, agent_id: Uuid) -> DomainResult<Option<Task>> {
        self.find_own_task(agent_id, &["pending", "failed"]).await
    }

    async fn reclaim_orphaned(&self, agent_id: Uuid) -> DomainResult<Option<Task>> {
        let candidates: Vec<(String,)> = sqlx::query_as(
            r#"SELECT t.id FROM tasks t
               JOIN attacks a ON a.id = t.attack_id
               JOIN campaigns c ON c.id = a.campaign_id
               JOIN project_agents pa ON pa.project_id = c.project_id AND pa.agent_id = ?1
               JOIN agents og ON og.id = t.agent_id
               WHERE t.state = 'paused'
                 AND og.state = 'offline'
                 AND og.id != ?1
                 AND c.paused = 0
                 AND a.state IN ('pending', 'running')
                 AND EXISTS (SELECT 1 FROM hash_items hi
                             WHERE hi.hash_list_id = c.hash_list_id AND hi.cracked = 0)
               ORDER BY t.created_at, t.id"#,
        )
        .bind(agent_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        for (task_id,) in candidates {
            let claim = sqlx::query(
                r#"UPDATE tasks SET state = 'pending', agent_id = ?1, stale = 1,
                   version = version + 1, updated_at = ?2
                   WHERE id = ?3 AND state = 'paused'"#,
            )
            .bind(agent_id.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(&task_id)
            .execute(&self.pool)
            .await;

            match claim {
                Ok(result) if result.rows_affected() == 1 => {
                    return self.get(super::parse_uuid(&task_id)?).await;
                }
                // Lost the claim race; try the next candidate.
                Ok(_) => {}
                Err(e) => {
                    // The agent may already hold an incomplete task on the
                    // same attack (unique slot index); skip that candidate.
                    if e.to_string().contains("UNIQUE constraint") {
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(None)
    }

    async fn accept(&self, task_id: Uuid, agent_id: Uuid) -> DomainResult<Option<Task>> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"UPDATE tasks SET state = 'running', version = version + 1, updated_at = ?1,
               started_at = COALESCE(started_at, ?1)
               WHERE id = ?2 AND agent_id = ?3 AND state = 'pending'"#,
        )
        .bind(&now)
        .bind(task_id.to_string())
        .bind(agent_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(task_id).await
    }

    async fn preempt(&self, task_id: Uuid) -> DomainResult<Option<Task>> {
        let result = sqlx::query(
            r#"UPDATE tasks SET state = 'pending', preemption_count = preemption_count + 1,
               stale = 1, agent_id = NULL, version = version + 1, updated_at = ?1
               WHERE id = ?2 AND state = 'running' AND preemption_count < ?3"#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(task_id.to_string())
        .bind(PREEMPTION_PIN_COUNT)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(task_id).await
    }

    async fn touch_activity(&self, task_id: Uuid, at: DateTime<Utc>) -> DomainResult<()> {
        sqlx::query(
            r#"UPDATE tasks SET activity_timestamp = ?1
               WHERE id = ?2 AND (activity_timestamp IS NULL OR activity_timestamp < ?1)"#,
        )
        .bind(at.to_rfc3339())
        .bind(task_id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_stale(&self, task_id: Uuid, stale: bool) -> DomainResult<()> {
        let result = sqlx::query("UPDATE tasks SET stale = ? WHERE id = ?")
            .bind(stale)
            .bind(task_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(task_id));
        }
        Ok(())
    }

    async fn preemption_candidates(
        &self,
        project_id: Uuid,
        ceiling: CampaignPriority,
    ) -> DomainResult<Vec<PreemptionCandidate>> {
        let rows: Vec<PreemptionCandidateRow> = sqlx::query_as(
            r#"SELECT t.*,
                      c.priority AS campaign_priority,
                      (SELECT CAST(s.progress_done AS REAL) / CAST(s.progress_total AS REAL)
                         FROM hashcat_statuses s
                        WHERE s.task_id = t.id AND s.progress_total > 0
                        ORDER BY s.created_at DESC, s.id DESC LIMIT 1) AS progress
               FROM tasks t
               JOIN attacks a ON a.id = t.attack_id
               JOIN campaigns c ON c.id = a.campaign_id
               JOIN agents ag ON ag.id = t.agent_id
               WHERE c.project_id = ?1
                 AND t.state = 'running'
                 AND ag.state = 'active'
                 AND t.preemption_count < ?2
                 AND (CASE c.priority
                        WHEN 'deferred' THEN 0
                        WHEN 'low' THEN 1
                        WHEN 'normal' THEN 2
                        WHEN 'high' THEN 3
                      END) < ?3
               ORDER BY t.created_at, t.id"#,
        )
        .bind(project_id.to_string())
        .bind(PREEMPTION_PIN_COUNT)
        .bind(ceiling.ordinal())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn all_active_agents_busy(&self) -> DomainResult<bool> {
        let row: (i64, Option<i64>) = sqlx::query_as(
            r#"SELECT COUNT(*),
                      SUM(CASE WHEN NOT EXISTS (
                          SELECT 1 FROM tasks t
                          WHERE t.agent_id = ag.id
                            AND t.state IN ('pending', 'running', 'paused')
                      ) THEN 1 ELSE 0 END)
               FROM agents ag WHERE ag.state = 'active'"#,
        )
        .fetch_one(&self.pool)
        .await?;

        let (active, idle) = (row.0, row.1.unwrap_or(0));
        Ok(active > 0 && idle == 0)
    }

    async fn delete_with_tombstone(&self, task_id: Uuid) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT OR REPLACE INTO task_tombstones (task_id, deleted_at) VALUES (?, ?)")
            .bind(task_id.to_string())
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(task_id.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::TaskNotFound(task_id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn tombstoned_within(&self, task_id: Uuid, within: Duration) -> DomainResult<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT deleted_at FROM task_tombstones WHERE task_id = ?")
                .bind(task_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((deleted_at,)) => {
                let deleted_at = super::parse_datetime(&deleted_at)?;
                Ok(Utc::now() - deleted_at <= within)
            }
            None => Ok(false),
        }
    }

    async fn count_by_state(&self) -> DomainResult<HashMap<TaskState, u64>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM tasks GROUP BY state")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = HashMap::new();
        for (state_str, count) in rows {
            if let Some(state) = TaskState::parse_str(&state_str) {
                counts.insert(state, u64::try_from(count).unwrap_or(0));
            }
        }
        Ok(counts)
    }
}

impl SqliteTaskRepository {
    async fn find_own_task(
        &self,
        agent_id: Uuid,
        states: &[&str],
    ) -> DomainResult<Option<Task>> {
        let placeholders = states
            .iter()
            .map(|s| format!("'{s}'"))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            r#"SELECT t.* FROM tasks t
               JOIN attacks a ON a.id = t.attack_id
               WHERE t.agent_id = ?1
                 AND t.state IN ({placeholders})
                 AND a.state != 'abandoned'
                 AND NOT EXISTS (SELECT 1 FROM agent_errors e
                                 WHERE e.agent_id = ?1 AND e.task_id = t.id
                                   AND e.severity = 'fatal')
               ORDER BY t.created_at, t.id LIMIT 1"#
        );

        let row: Option<TaskRow> = sqlx::query_as(&query)
            .bind(agent_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    attack_id: String,
    agent_id: Option<String>,
    state: String,
    stale: bool,
    retry_count: i64,
    preemption_count: i64,
    last_error: Option<String>,
    activity_timestamp: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let state = TaskState::parse_str(&row.state).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid task state: {}", row.state))
        })?;

        Ok(Task {
            id: super::parse_uuid(&row.id)?,
            attack_id: super::parse_uuid(&row.attack_id)?,
            agent_id: super::parse_optional_uuid(row.agent_id)?,
            state,
            stale: row.stale,
            retry_count: row.retry_count,
            preemption_count: row.preemption_count,
            last_error: row.last_error,
            activity_timestamp: super::parse_optional_datetime(row.activity_timestamp)?,
            version: row.version,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
            started_at: super::parse_optional_datetime(row.started_at)?,
            completed_at: super::parse_optional_datetime(row.completed_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PreemptionCandidateRow {
    #[sqlx(flatten)]
    task: TaskRow,
    campaign_priority: String,
    progress: Option<f64>,
}

impl TryFrom<PreemptionCandidateRow> for PreemptionCandidate {
    type Error = DomainError;

    fn try_from(row: PreemptionCandidateRow) -> Result<Self, Self::Error> {
        let priority = CampaignPriority::parse_str(&row.campaign_priority).ok_or_else(|| {
            DomainError::SerializationError(format!(
                "Invalid priority: {}",
                row.campaign_priority
            ))
        })?;

        Ok(PreemptionCandidate {
            task: row.task.try_into()?,
            priority,
            progress: row.progress.unwrap_or(0.0),
        })
    }
}
