//! SQLite implementation of the CampaignRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Campaign, CampaignPriority};
use crate::domain::ports::CampaignRepository;

#[derive(Clone)]
pub struct SqliteCampaignRepository {
    pool: SqlitePool,
}

impl SqliteCampaignRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepository for SqliteCampaignRepository {
    async fn create(&self, campaign: &Campaign) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO campaigns (id, project_id, hash_list_id, name, priority, paused,
               creator, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(campaign.id.to_string())
        .bind(campaign.project_id.to_string())
        .bind(campaign.hash_list_id.to_string())
        .bind(&campaign.name)
        .bind(campaign.priority.as_str())
        .bind(campaign.paused)
        .bind(&campaign.creator)
        .bind(campaign.created_at.to_rfc3339())
        .bind(campaign.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Campaign>> {
        let row: Option<CampaignRow> = sqlx::query_as("SELECT * FROM campaigns WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, campaign: &Campaign) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE campaigns SET name = ?, priority = ?, paused = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&campaign.name)
        .bind(campaign.priority.as_str())
        .bind(campaign.paused)
        .bind(campaign.updated_at.to_rfc3339())
        .bind(campaign.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::CampaignNotFound(campaign.id));
        }
        Ok(())
    }

    async fn list_by_project(&self, project_id: Uuid) -> DomainResult<Vec<Campaign>> {
        let rows: Vec<CampaignRow> =
            sqlx::query_as("SELECT * FROM campaigns WHERE project_id = ? ORDER BY created_at")
                .bind(project_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list(&self) -> DomainResult<Vec<Campaign>> {
        let rows: Vec<CampaignRow> =
            sqlx::query_as("SELECT * FROM campaigns ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: String,
    project_id: String,
    hash_list_id: String,
    name: String,
    priority: String,
    paused: bool,
    creator: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = DomainError;

    fn try_from(row: CampaignRow) -> Result<Self, Self::Error> {
        let priority = CampaignPriority::parse_str(&row.priority).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid priority: {}", row.priority))
        })?;

        Ok(Campaign {
            id: super::parse_uuid(&row.id)?,
            project_id: super::parse_uuid(&row.project_id)?,
            hash_list_id: super::parse_uuid(&row.hash_list_id)?,
            name: row.name,
            priority,
            paused: row.paused,
            creator: row.creator,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}
