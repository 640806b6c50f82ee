//! SQLite implementation of the ResourceRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ResourceFile, ResourceKind};
use crate::domain::ports::ResourceRepository;

#[derive(Clone)]
pub struct SqliteResourceRepository {
    pool: SqlitePool,
}

impl SqliteResourceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourceRepository for SqliteResourceRepository {
    async fn create(&self, resource: &ResourceFile) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO resource_files (id, project_id, kind, file_name, checksum,
               object_key, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(resource.id.to_string())
        .bind(resource.project_id.map(|id| id.to_string()))
        .bind(resource.kind.as_str())
        .bind(&resource.file_name)
        .bind(&resource.checksum)
        .bind(&resource.object_key)
        .bind(resource.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<ResourceFile>> {
        let row: Option<ResourceRow> = sqlx::query_as("SELECT * FROM resource_files WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct ResourceRow {
    id: String,
    project_id: Option<String>,
    kind: String,
    file_name: String,
    checksum: String,
    object_key: String,
    created_at: String,
}

impl TryFrom<ResourceRow> for ResourceFile {
    type Error = DomainError;

    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        let kind = ResourceKind::parse_str(&row.kind).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid resource kind: {}", row.kind))
        })?;

        Ok(ResourceFile {
            id: super::parse_uuid(&row.id)?,
            project_id: super::parse_optional_uuid(row.project_id)?,
            kind,
            file_name: row.file_name,
            checksum: row.checksum,
            object_key: row.object_key,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}
