//! SQLite implementation of the HashListRepository.
//!
//! `record_crack` is the transactional heart of the crack pipeline: the
//! item write, the same-project propagation, and the sibling-task staling
//! commit together or not at all.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{HashItem, HashList, HashType};
use crate::domain::ports::{CrackRecord, CrackRequest, HashListRepository};

#[derive(Clone)]
pub struct SqliteHashListRepository {
    pool: SqlitePool,
}

impl SqliteHashListRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HashListRepository for SqliteHashListRepository {
    async fn create(&self, list: &HashList) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO hash_lists (id, project_id, name, hash_type, processed, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(list.id.to_string())
        .bind(list.project_id.to_string())
        .bind(&list.name)
        .bind(list.hash_type.0)
        .bind(list.processed)
        .bind(list.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<HashList>> {
        let row: Option<HashListRow> = sqlx::query_as("SELECT * FROM hash_lists WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn mark_processed(&self, id: Uuid) -> DomainResult<()> {
        let result = sqlx::query("UPDATE hash_lists SET processed = 1 WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::HashListNotFound(id));
        }
        Ok(())
    }

    async fn add_item(&self, item: &HashItem) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO hash_items (id, hash_list_id, hash_value, salt, cracked, plain_text,
               cracked_time, attack_id, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(item.id.to_string())
        .bind(item.hash_list_id.to_string())
        .bind(&item.hash_value)
        .bind(&item.salt)
        .bind(item.cracked)
        .bind(&item.plain_text)
        .bind(item.cracked_time.map(|t| t.to_rfc3339()))
        .bind(item.attack_id.map(|id| id.to_string()))
        .bind(item.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_item(&self, list_id: Uuid, hash_value: &str) -> DomainResult<Option<HashItem>> {
        let row: Option<HashItemRow> = sqlx::query_as(
            "SELECT * FROM hash_items WHERE hash_list_id = ? AND hash_value = ?",
        )
        .bind(list_id.to_string())
        .bind(hash_value)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_items(&self, list_id: Uuid) -> DomainResult<Vec<HashItem>> {
        let rows: Vec<HashItemRow> =
            sqlx::query_as("SELECT * FROM hash_items WHERE hash_list_id = ? ORDER BY created_at, id")
                .bind(list_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn uncracked_items(&self, list_id: Uuid) -> DomainResult<Vec<HashItem>> {
        let rows: Vec<HashItemRow> = sqlx::query_as(
            "SELECT * FROM hash_items WHERE hash_list_id = ? AND cracked = 0 ORDER BY created_at, id",
        )
        .bind(list_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn uncracked_count(&self, list_id: Uuid) -> DomainResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM hash_items WHERE hash_list_id = ? AND cracked = 0")
                .bind(list_id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn record_crack(&self, request: &CrackRequest) -> DomainResult<CrackRecord> {
        let mut tx = self.pool.begin().await?;
        let list_id = request.hash_list_id.to_string();

        let item: Option<(String, bool, Option<String>)> = sqlx::query_as(
            "SELECT id, cracked, salt FROM hash_items WHERE hash_list_id = ? AND hash_value = ?",
        )
        .bind(&list_id)
        .bind(&request.hash_value)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((item_id, already_cracked, item_salt)) = item else {
            tx.rollback().await?;
            return Ok(CrackRecord::NotFound);
        };

        if already_cracked {
            let remaining = uncracked_count_tx(&mut tx, &list_id).await?;
            tx.commit().await?;
            return Ok(CrackRecord::AlreadyCracked {
                uncracked_remaining: remaining,
            });
        }

        let cracked_time = request.timestamp.to_rfc3339();
        sqlx::query(
            r#"UPDATE hash_items SET cracked = 1, plain_text = ?, cracked_time = ?, attack_id = ?
               WHERE id = ? AND cracked = 0"#,
        )
        .bind(&request.plain_text)
        .bind(&cracked_time)
        .bind(request.attack_id.to_string())
        .bind(&item_id)
        .execute(&mut *tx)
        .await?;

        // Cross-list propagation: same project, same hash type, same salt
        // (both absent or both equal). Already-cracked items are skipped.
        let propagated = sqlx::query(
            r#"UPDATE hash_items SET cracked = 1, plain_text = ?1, cracked_time = ?2, attack_id = ?3
               WHERE cracked = 0
                 AND hash_value = ?4
                 AND ((salt IS NULL AND ?5 IS NULL) OR salt = ?5)
                 AND hash_list_id IN (
                     SELECT id FROM hash_lists
                     WHERE project_id = ?6 AND hash_type = ?7 AND id != ?8
                 )"#,
        )
        .bind(&request.plain_text)
        .bind(&cracked_time)
        .bind(request.attack_id.to_string())
        .bind(&request.hash_value)
        .bind(item_salt.as_deref())
        .bind(request.project_id.to_string())
        .bind(request.hash_type.0)
        .bind(&list_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // Sibling staleness: every other non-terminal task working this hash
        // list must re-pull cracks. The submitting task stays fresh.
        let staled = sqlx::query(
            r#"UPDATE tasks SET stale = 1, updated_at = ?1
               WHERE id != ?2
                 AND state IN ('pending', 'running', 'paused', 'failed')
                 AND attack_id IN (
                     SELECT a.id FROM attacks a
                     JOIN campaigns c ON c.id = a.campaign_id
                     WHERE c.hash_list_id = ?3
                 )"#,
        )
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(request.task_id.to_string())
        .bind(&list_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let remaining = uncracked_count_tx(&mut tx, &list_id).await?;
        tx.commit().await?;

        Ok(CrackRecord::Cracked {
            uncracked_remaining: remaining,
            propagated,
            staled_tasks: staled,
        })
    }
}

async fn uncracked_count_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    list_id: &str,
) -> DomainResult<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM hash_items WHERE hash_list_id = ? AND cracked = 0")
            .bind(list_id)
            .fetch_one(&mut **tx)
            .await?;
    Ok(count)
}

#[derive(sqlx::FromRow)]
struct HashListRow {
    id: String,
    project_id: String,
    name: String,
    hash_type: i64,
    processed: bool,
    created_at: String,
}

impl TryFrom<HashListRow> for HashList {
    type Error = DomainError;

    fn try_from(row: HashListRow) -> Result<Self, Self::Error> {
        Ok(HashList {
            id: super::parse_uuid(&row.id)?,
            project_id: super::parse_uuid(&row.project_id)?,
            name: row.name,
            hash_type: HashType(row.hash_type),
            processed: row.processed,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HashItemRow {
    id: String,
    hash_list_id: String,
    hash_value: String,
    salt: Option<String>,
    cracked: bool,
    plain_text: Option<String>,
    cracked_time: Option<String>,
    attack_id: Option<String>,
    created_at: String,
}

impl TryFrom<HashItemRow> for HashItem {
    type Error = DomainError;

    fn try_from(row: HashItemRow) -> Result<Self, Self::Error> {
        Ok(HashItem {
            id: super::parse_uuid(&row.id)?,
            hash_list_id: super::parse_uuid(&row.hash_list_id)?,
            hash_value: row.hash_value,
            salt: row.salt,
            cracked: row.cracked,
            plain_text: row.plain_text,
            cracked_time: super::parse_optional_datetime(row.cracked_time)?,
            attack_id: super::parse_optional_uuid(row.attack_id)?,
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}
