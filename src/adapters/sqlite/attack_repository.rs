//! SQLite implementation of the AttackRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Attack, AttackMode, AttackState, CampaignPriority, HashType};
use crate::domain::ports::{AttackCandidate, AttackRepository};

#[derive(Clone)]
pub struct SqliteAttackRepository {
    pool: SqlitePool,
}

impl SqliteAttackRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttackRepository for SqliteAttackRepository {
    async fn create(&self, attack: &Attack) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO attacks (id, campaign_id, name, attack_mode, mask, increment_mode,
               increment_minimum, increment_maximum, custom_charset_1, custom_charset_2,
               custom_charset_3, custom_charset_4, left_rule, right_rule, disable_markov,
               optimized, workload_profile, word_list_id, rule_list_id, mask_list_id,
               complexity_value, state, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(attack.id.to_string())
        .bind(attack.campaign_id.to_string())
        .bind(&attack.name)
        .bind(attack.attack_mode.as_str())
        .bind(&attack.mask)
        .bind(attack.increment_mode)
        .bind(attack.increment_minimum)
        .bind(attack.increment_maximum)
        .bind(&attack.custom_charset_1)
        .bind(&attack.custom_charset_2)
        .bind(&attack.custom_charset_3)
        .bind(&attack.custom_charset_4)
        .bind(&attack.left_rule)
        .bind(&attack.right_rule)
        .bind(attack.disable_markov)
        .bind(attack.optimized)
        .bind(attack.workload_profile)
        .bind(attack.word_list_id.map(|id| id.to_string()))
        .bind(attack.rule_list_id.map(|id| id.to_string()))
        .bind(attack.mask_list_id.map(|id| id.to_string()))
        .bind(attack.complexity_value)
        .bind(attack.state.as_str())
        .bind(attack.created_at.to_rfc3339())
        .bind(attack.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Attack>> {
        let row: Option<AttackRow> = sqlx::query_as("SELECT * FROM attacks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn update(&self, attack: &Attack) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE attacks SET name = ?, attack_mode = ?, mask = ?, increment_mode = ?,
               increment_minimum = ?, increment_maximum = ?, custom_charset_1 = ?,
               custom_charset_2 = ?, custom_charset_3 = ?, custom_charset_4 = ?,
               left_rule = ?, right_rule = ?, disable_markov = ?, optimized = ?,
               workload_profile = ?, word_list_id = ?, rule_list_id = ?, mask_list_id = ?,
               complexity_value = ?, state = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&attack.name)
        .bind(attack.attack_mode.as_str())
        .bind(&attack.mask)
        .bind(attack.increment_mode)
        .bind(attack.increment_minimum)
        .bind(attack.increment_maximum)
        .bind(&attack.custom_charset_1)
        .bind(&attack.custom_charset_2)
        .bind(&attack.custom_charset_3)
        .bind(&attack.custom_charset_4)
        .bind(&attack.left_rule)
        .bind(&attack.right_rule)
        .bind(attack.disable_markov)
        .bind(attack.optimized)
        .bind(attack.workload_profile)
        .bind(attack.word_list_id.map(|id| id.to_string()))
        .bind(attack.rule_list_id.map(|id| id.to_string()))
        .bind(attack.mask_list_id.map(|id| id.to_string()))
        .bind(attack.complexity_value)
        .bind(attack.state.as_str())
        .bind(attack.updated_at.to_rfc3339())
        .bind(attack.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::AttackNotFound(attack.id));
        }
        Ok(())
    }

    async fn list_by_campaign(&self, campaign_id: Uuid) -> DomainResult<Vec<Attack>> {
        let rows: Vec<AttackRow> =
            sqlx::query_as("SELECT * FROM attacks WHERE campaign_id = ? ORDER BY created_at, id")
                .bind(campaign_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_candidates_for_agent(
        &self,
        agent_id: Uuid,
    ) -> DomainResult<Vec<AttackCandidate>> {
        let rows: Vec<AttackCandidateRow> = sqlx::query_as(
            r#"SELECT a.*,
                      c.priority AS campaign_priority,
                      c.project_id AS project_id,
                      c.hash_list_id AS hash_list_id,
                      hl.hash_type AS hash_type,
                      (SELECT b.hash_speed FROM benchmarks b
                        WHERE b.agent_id = ?1 AND b.hash_type = hl.hash_type
                        ORDER BY b.created_at DESC, b.id DESC LIMIT 1) AS benchmark_speed
               FROM attacks a
               JOIN campaigns c ON c.id = a.campaign_id
               JOIN hash_lists hl ON hl.id = c.hash_list_id
               JOIN project_agents pa ON pa.project_id = c.project_id AND pa.agent_id = ?1
               WHERE c.paused = 0
                 AND a.state IN ('pending', 'running')
                 AND EXISTS (SELECT 1 FROM hash_items hi
                             WHERE hi.hash_list_id = hl.id AND hi.cracked = 0)
                 AND EXISTS (SELECT 1 FROM benchmarks b
                             WHERE b.agent_id = ?1 AND b.hash_type = hl.hash_type)
               ORDER BY a.complexity_value ASC, a.created_at ASC, a.id ASC"#,
        )
        .bind(agent_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn find_high_priority_needing_slot(&self, agent_id: Uuid) -> DomainResult<Vec<Attack>> {
        let rows: Vec<AttackRow> = sqlx::query_as(
            r#"SELECT a.* FROM attacks a
               JOIN campaigns c ON c.id = a.campaign_id
               JOIN project_agents pa ON pa.project_id = c.project_id AND pa.agent_id = ?1
               WHERE c.paused = 0
                 AND c.priority = 'high'
                 AND a.state IN ('pending', 'running')
                 AND EXISTS (SELECT 1 FROM hash_items hi
                             WHERE hi.hash_list_id = c.hash_list_id AND hi.cracked = 0)
                 AND NOT EXISTS (SELECT 1 FROM tasks t
                                 WHERE t.attack_id = a.id
                                   AND t.state IN ('pending', 'running', 'paused'))
               ORDER BY a.complexity_value ASC, a.created_at ASC, a.id ASC"#,
        )
        .bind(agent_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn list_live_by_hash_list(&self, hash_list_id: Uuid) -> DomainResult<Vec<Attack>> {
        let rows: Vec<AttackRow> = sqlx::query_as(
            r#"SELECT a.* FROM attacks a
               JOIN campaigns c ON c.id = a.campaign_id
               WHERE c.hash_list_id = ?
                 AND a.state IN ('pending', 'running', 'paused')
               ORDER BY a.created_at, a.id"#,
        )
        .bind(hash_list_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AttackRow {
    id: String,
    campaign_id: String,
    name: String,
    attack_mode: String,
    mask: Option<String>,
    increment_mode: bool,
    increment_minimum: Option<i64>,
    increment_maximum: Option<i64>,
    custom_charset_1: Option<String>,
    custom_charset_2: Option<String>,
    custom_charset_3: Option<String>,
    custom_charset_4: Option<String>,
    left_rule: Option<String>,
    right_rule: Option<String>,
    disable_markov: bool,
    optimized: bool,
    workload_profile: i64,
    word_list_id: Option<String>,
    rule_list_id: Option<String>,
    mask_list_id: Option<String>,
    complexity_value: i64,
    state: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<AttackRow> for Attack {
    type Error = DomainError;

    fn try_from(row: AttackRow) -> Result<Self, Self::Error> {
        let attack_mode = AttackMode::parse_str(&row.attack_mode).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid attack mode: {}", row.attack_mode))
        })?;
        let state = AttackState::parse_str(&row.state).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid attack state: {}", row.state))
        })?;

        Ok(Attack {
            id: super::parse_uuid(&row.id)?,
            campaign_id: super::parse_uuid(&row.campaign_id)?,
            name: row.name,
            attack_mode,
            mask: row.mask,
            increment_mode: row.increment_mode,
            increment_minimum: row.increment_minimum,
            increment_maximum: row.increment_maximum,
            custom_charset_1: row.custom_charset_1,
            custom_charset_2: row.custom_charset_2,
            custom_charset_3: row.custom_charset_3,
            custom_charset_4: row.custom_charset_4,
            left_rule: row.left_rule,
            right_rule: row.right_rule,
            disable_markov: row.disable_markov,
            optimized: row.optimized,
            workload_profile: row.workload_profile,
            word_list_id: super::parse_optional_uuid(row.word_list_id)?,
            rule_list_id: super::parse_optional_uuid(row.rule_list_id)?,
            mask_list_id: super::parse_optional_uuid(row.mask_list_id)?,
            complexity_value: row.complexity_value,
            state,
            created_at: super::parse_datetime(&row.created_at)?,
            updated_at: super::parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AttackCandidateRow {
    #[sqlx(flatten)]
    attack: AttackRow,
    campaign_priority: String,
    project_id: String,
    hash_list_id: String,
    hash_type: i64,
    benchmark_speed: f64,
}

impl TryFrom<AttackCandidateRow> for AttackCandidate {
    type Error = DomainError;

    fn try_from(row: AttackCandidateRow) -> Result<Self, Self::Error> {
        let priority = CampaignPriority::parse_str(&row.campaign_priority).ok_or_else(|| {
            DomainError::SerializationError(format!(
                "Invalid priority: {}",
                row.campaign_priority
            ))
        })?;

        Ok(AttackCandidate {
            priority,
            project_id: super::parse_uuid(&row.project_id)?,
            hash_list_id: super::parse_uuid(&row.hash_list_id)?,
            hash_type: HashType(row.hash_type),
            benchmark_speed: row.benchmark_speed,
            attack: row.attack.try_into()?,
        })
    }
}
