//! SQLite implementation of the StatusRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{DeviceStatus, HashcatGuess, HashcatStatus};
use crate::domain::ports::StatusRepository;

#[derive(Clone)]
pub struct SqliteStatusRepository {
    pool: SqlitePool,
}

impl SqliteStatusRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_children(&self, status: &mut HashcatStatus) -> DomainResult<()> {
        let guess: Option<GuessRow> =
            sqlx::query_as("SELECT * FROM hashcat_guesses WHERE status_id = ?")
                .bind(status.id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        if let Some(guess) = guess {
            status.guess = guess.into();
        }

        let devices: Vec<DeviceRow> = sqlx::query_as(
            "SELECT * FROM device_statuses WHERE status_id = ? ORDER BY device_id",
        )
        .bind(status.id.to_string())
        .fetch_all(&self.pool)
        .await?;

        status.device_statuses = devices.into_iter().map(Into::into).collect();
        Ok(())
    }
}

#[async_trait]
impl StatusRepository for SqliteStatusRepository {
    async fn insert(&self, status: &HashcatStatus) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        let status_id = status.id.to_string();

        sqlx::query(
            r#"INSERT INTO hashcat_statuses (id, task_id, time, session, status, progress_done,
               progress_total, restore_point, rejected, time_start, estimated_stop, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&status_id)
        .bind(status.task_id.to_string())
        .bind(status.time.to_rfc3339())
        .bind(&status.session)
        .bind(status.status)
        .bind(status.progress[0])
        .bind(status.progress[1])
        .bind(status.restore_point)
        .bind(status.rejected)
        .bind(status.time_start.map(|t| t.to_rfc3339()))
        .bind(status.estimated_stop.map(|t| t.to_rfc3339()))
        .bind(status.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO hashcat_guesses (status_id, guess_base, guess_base_count,
               guess_base_offset, guess_base_percentage, guess_mod, guess_mod_count,
               guess_mod_offset, guess_mod_percentage, guess_mode)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&status_id)
        .bind(&status.guess.guess_base)
        .bind(status.guess.guess_base_count)
        .bind(status.guess.guess_base_offset)
        .bind(status.guess.guess_base_percentage)
        .bind(&status.guess.guess_mod)
        .bind(status.guess.guess_mod_count)
        .bind(status.guess.guess_mod_offset)
        .bind(status.guess.guess_mod_percentage)
        .bind(status.guess.guess_mode)
        .execute(&mut *tx)
        .await?;

        for device in &status.device_statuses {
            sqlx::query(
                r#"INSERT INTO device_statuses (id, status_id, device_id, device_name,
                   device_type, speed, utilization, temperature)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&status_id)
            .bind(device.device_id)
            .bind(&device.device_name)
            .bind(&device.device_type)
            .bind(device.speed)
            .bind(device.utilization)
            .bind(device.temperature)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn latest_for_task(&self, task_id: Uuid) -> DomainResult<Option<HashcatStatus>> {
        let row: Option<StatusRow> = sqlx::query_as(
            r#"SELECT * FROM hashcat_statuses WHERE task_id = ?
               ORDER BY created_at DESC, id DESC LIMIT 1"#,
        )
        .bind(task_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let mut status: HashcatStatus = row.try_into()?;
                self.load_children(&mut status).await?;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }

    async fn list_for_task(&self, task_id: Uuid, limit: i64) -> DomainResult<Vec<HashcatStatus>> {
        let rows: Vec<StatusRow> = sqlx::query_as(
            r#"SELECT * FROM hashcat_statuses WHERE task_id = ?
               ORDER BY created_at DESC, id DESC LIMIT ?"#,
        )
        .bind(task_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut statuses = Vec::with_capacity(rows.len());
        for row in rows {
            let mut status: HashcatStatus = row.try_into()?;
            self.load_children(&mut status).await?;
            statuses.push(status);
        }
        Ok(statuses)
    }
}

#[derive(sqlx::FromRow)]
struct StatusRow {
    id: String,
    task_id: String,
    time: String,
    session: Option<String>,
    status: i64,
    progress_done: i64,
    progress_total: i64,
    restore_point: i64,
    rejected: i64,
    time_start: Option<String>,
    estimated_stop: Option<String>,
    created_at: String,
}

impl TryFrom<StatusRow> for HashcatStatus {
    type Error = DomainError;

    fn try_from(row: StatusRow) -> Result<Self, Self::Error> {
        Ok(HashcatStatus {
            id: super::parse_uuid(&row.id)?,
            task_id: super::parse_uuid(&row.task_id)?,
            time: super::parse_datetime(&row.time)?,
            session: row.session,
            status: row.status,
            progress: [row.progress_done, row.progress_total],
            restore_point: row.restore_point,
            rejected: row.rejected,
            time_start: super::parse_optional_datetime(row.time_start)?,
            estimated_stop: super::parse_optional_datetime(row.estimated_stop)?,
            guess: HashcatGuess::default(), // Loaded separately
            device_statuses: Vec::new(),    // Loaded separately
            created_at: super::parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct GuessRow {
    #[allow(dead_code)]
    status_id: String,
    guess_base: Option<String>,
    guess_base_count: i64,
    guess_base_offset: i64,
    guess_base_percentage: f64,
    guess_mod: Option<String>,
    guess_mod_count: i64,
    guess_mod_offset: i64,
    guess_mod_percentage: f64,
    guess_mode: i64,
}

impl From<GuessRow> for HashcatGuess {
    fn from(row: GuessRow) -> Self {
        HashcatGuess {
            guess_base: row.guess_base,
            guess_base_count: row.guess_base_count,
            guess_base_offset: row.guess_base_offset,
            guess_base_percentage: row.guess_base_percentage,
            guess_mod: row.guess_mod,
            guess_mod_count: row.guess_mod_count,
            guess_mod_offset: row.guess_mod_offset,
            guess_mod_percentage: row.guess_mod_percentage,
            guess_mode: row.guess_mode,
        }
    }
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    #[allow(dead_code)]
    id: String,
    #[allow(dead_code)]
    status_id: String,
    device_id: i64,
    device_name: String,
    device_type: String,
    speed: i64,
    utilization: i64,
    temperature: i64,
}

impl From<DeviceRow> for DeviceStatus {
    fn from(row: DeviceRow) -> Self {
        DeviceStatus {
            device_id: row.device_id,
            device_name: row.device_name,
            device_type: row.device_type,
            speed: row.speed,
            utilization: row.utilization,
            temperature: row.temperature,
        }
    }
}
