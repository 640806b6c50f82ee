//! SQLite implementation of the AgentRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AdvancedConfiguration, Agent, AgentError, AgentState, DeviceInfo, ErrorSeverity,
};
use crate::domain::ports::AgentRepository;

#[derive(Clone)]
pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_memberships(&self, agent: &mut Agent) -> DomainResult<()> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT project_id FROM project_agents WHERE agent_id = ?")
                .bind(agent.id.to_string())
                .fetch_all(&self.pool)
                .await?;

        agent.project_ids = rows
            .into_iter()
            .filter_map(|(id,)| Uuid::parse_str(&id).ok())
            .collect();
        Ok(())
    }
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn create(&self, agent: &Agent) -> DomainResult<()> {
        let devices_json = serde_json::to_string(&agent.devices)?;
        let advanced_json = agent
            .advanced_configuration
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO agents (id, user_name, host_name, state, trusted, operating_system,
               last_ipaddress, last_seen_at, devices, advanced_configuration, created_at,
               updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(agent.id.to_string())
        .bind(&agent.user_name)
        .bind(&agent.host_name)
        .bind(agent.state.as_str())
        .bind(agent.trusted)
        .bind(&agent.operating_system)
        .bind(&agent.last_ipaddress)
        .bind(agent.last_seen_at.map(|t| t.to_rfc3339()))
        .bind(&devices_json)
        .bind(&advanced_json)
        .bind(agent.created_at.to_rfc3339())
        .bind(agent.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for project_id in &agent.project_ids {
            sqlx::query("INSERT INTO project_agents (project_id, agent_id) VALUES (?, ?)")
                .bind(project_id.to_string())
                .bind(agent.id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Agent>> {
        let row: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut agent: Agent = row.try_into()?;
                self.load_memberships(&mut agent).await?;
                Ok(Some(agent))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, agent: &Agent) -> DomainResult<()> {
        let devices_json = serde_json::to_string(&agent.devices)?;
        let advanced_json = agent
            .advanced_configuration
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"UPDATE agents SET user_name = ?, host_name = ?, state = ?, trusted = ?,
               operating_system = ?, last_ipaddress = ?, last_seen_at = ?, devices = ?,
               advanced_configuration = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&agent.user_name)
        .bind(&agent.host_name)
        .bind(agent.state.as_str())
        .bind(agent.trusted)
        .bind(&agent.operating_system)
        .bind(&agent.last_ipaddress)
        .bind(agent.last_seen_at.map(|t| t.to_rfc3339()))
        .bind(&devices_json)
        .bind(&advanced_json)
        .bind(agent.updated_at.to_rfc3339())
        .bind(agent.id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DomainError::AgentNotFound(agent.id));
        }

        sqlx::query("DELETE FROM project_agents WHERE agent_id = ?")
            .bind(agent.id.to_string())
            .execute(&mut *tx)
            .await?;

        for project_id in &agent.project_ids {
            sqlx::query("INSERT INTO project_agents (project_id, agent_id) VALUES (?, ?)")
                .bind(project_id.to_string())
                .bind(agent.id.to_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> = sqlx::query_as("SELECT * FROM agents ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        let mut agents = Vec::with_capacity(rows.len());
        for row in rows {
            let mut agent: Agent = row.try_into()?;
            self.load_memberships(&mut agent).await?;
            agents.push(agent);
        }
        Ok(agents)
    }

    async fn list_active(&self) -> DomainResult<Vec<Agent>> {
        let rows: Vec<AgentRow> =
            sqlx::query_as("SELECT * FROM agents WHERE state = 'active' ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;

        let mut agents = Vec::with_capacity(rows.len());
        for row in rows {
            let mut agent: Agent = row.try_into()?;
            self.load_memberships(&mut agent).await?;
            agents.push(agent);
        }
        Ok(agents)
    }

    async fn record_error(&self, error: &AgentError) -> DomainResult<()> {
        let metadata_json = error
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"INSERT INTO agent_errors (id, agent_id, task_id, severity, message, metadata,
               created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(error.id.to_string())
        .bind(error.agent_id.to_string())
        .bind(error.task_id.map(|id| id.to_string()))
        .bind(error.severity.as_str())
        .bind(&error.message)
        .bind(&metadata_json)
        .bind(error.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fatal_error_exists(&self, agent_id: Uuid, task_id: Uuid) -> DomainResult<bool> {
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM agent_errors
               WHERE agent_id = ? AND task_id = ? AND severity = 'fatal'"#,
        )
        .bind(agent_id.to_string())
        .bind(task_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn count_fatal_errors_since(
        &self,
        agent_id: Uuid,
        since: DateTime<Utc>,
    ) -> DomainResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM agent_errors
               WHERE agent_id = ? AND severity = 'fatal' AND created_at >= ?"#,
        )
        .bind(agent_id.to_string())
        .bind(since.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn list_errors(&self, agent_id: Uuid) -> DomainResult<Vec<AgentError>> {
        let rows: Vec<AgentErrorRow> = sqlx::query_as(
            "SELECT * FROM agent_errors WHERE agent_id = ? ORDER BY created_at DESC, id",
        )
        .bind(agent_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    user_name: String,
    host_name: String,
    state: String,
    trusted: bool,
    operating_system: Option<String>,
    last_ipaddress: Option<String>,
    last_seen_at: Option<String>,
    devices: Option<String>,
    advanced_configuration: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AgentRow> for Agent {
    type Error = DomainError;

    fn try_from(row: AgentRow) -> Result<Self, Self::Error> {
        let state = AgentState::parse_str(&row.state).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid agent state: {}", row.state))
        })?;

        let devices: Vec<DeviceInfo> = super::parse_json_or_default(row.devices)?;
        let advanced_configuration: Option<AdvancedConfiguration> = row
            .advanced_configuration
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        Ok(Agent {
            id: super::parse_uuid(&row.id)?,
            user_name: row.user_name,
            host_name: row.host_name,
            project_ids: Vec::new(), // Loaded separately
            state,
            trusted: row.trusted,
            operating_system: row.operating_system,
            last_ipaddress: row.last_ipaddress,
            last_seen_at: super::parse_optional_datetime(row.last_seen_at)?,
            devices,
            advanced_configuration,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AgentErrorRow {
    id: String,
    agent_id: String,
    task_id: Option<String>,
    severity: String,
    message: String,
    metadata: Option<String>,
    created_at: String,
}

impl TryFrom<AgentErrorRow> for AgentError {
    type Error = DomainError;

    fn try_from(row: AgentErrorRow) -> Result<Self, Self::Error> {
        let severity = ErrorSeverity::parse_str(&row.severity).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid severity: {}", row.severity))
        })?;

        let metadata = row
            .metadata
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        Ok(AgentError {
            id: super::parse_uuid(&row.id)?,
            agent_id: super::parse_uuid(&row.agent_id)?,
            task_id: super::parse_optional_uuid(row.task_id)?,
            severity,
            message: row.message,
            metadata,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}
