//! Thin ingress controller for the agent-facing API.
//!
//! Maps external requests onto the scheduling services, verifies task
//! ownership, and translates outcomes into the wire error taxonomy. Transport
//! (HTTP routing, authentication) lives outside this core; every entry
//! point takes the already-authenticated agent id.

use anyhow::Context;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::{
    AgentError, AttackState, ErrorSeverity, HashcatBenchmark, StatusFrame, Task, TaskState,
};
use crate::domain::ports::{
    AttackRepository, CampaignRepository, HashListRepository, TaskRepository,
};
use crate::services::lifecycle_logger::StateChangeLogger;
use crate::services::{
    AgentService, Assignment, AssignmentService, CrackErrorType, CrackService, StatusErrorType,
    StatusResult, StatusService,
};

use super::descriptor::{AttackDescriptor, DescriptorRenderer, UncrackedList};
use super::errors::{classify_task_lookup, ApiError, ApiErrorKind};

/// Maximum time spent retrying a transient storage failure before it is
/// surfaced as `Internal`.
const RETRY_BUDGET: Duration = Duration::from_secs(3);

/// A task handed to an agent at pickup.
#[derive(Debug, Clone, Serialize)]
pub struct TaskGrant {
    pub task_id: Uuid,
    pub attack_id: Uuid,
    /// The agent must pull cracks before producing work
    pub stale: bool,
}

impl From<&Task> for TaskGrant {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id,
            attack_id: task.attack_id,
            stale: task.stale,
        }
    }
}

/// In-band outcome of a crack submission.
#[derive(Debug, Clone, Serialize)]
pub struct CrackResponse {
    pub success: bool,
    /// "not_found" when the hash is not in the task's list (benign)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uncracked_count: Option<i64>,
}

/// In-band outcome of a status submission.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// The agent-facing controller.
pub struct AgentApi {
    tasks: Arc<dyn TaskRepository>,
    attacks: Arc<dyn AttackRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    hash_lists: Arc<dyn HashListRepository>,
    agent_service: Arc<AgentService>,
    assignment: Arc<AssignmentService>,
    cracks: Arc<CrackService>,
    statuses: Arc<StatusService>,
    renderer: Arc<DescriptorRenderer>,
    logger: StateChangeLogger,
}

impl AgentApi {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        attacks: Arc<dyn AttackRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        hash_lists: Arc<dyn HashListRepository>,
        agent_service: Arc<AgentService>,
        assignment: Arc<AssignmentService>,
        cracks: Arc<CrackService>,
        statuses: Arc<StatusService>,
        renderer: Arc<DescriptorRenderer>,
    ) -> Self {
        Self {
            tasks,
            attacks,
            campaigns,
            hash_lists,
            agent_service,
            assignment,
            cracks,
            statuses,
            renderer,
            logger: StateChangeLogger::new(),
        }
    }

    /// Publish lifecycle records through a shared logger (builder form).
    pub fn with_logger(mut self, logger: StateChangeLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Agent pickup: recover the agent if it was offline, stamp its
    /// heartbeat, and hand out the next task if any. An empty pickup
    /// caused purely by the agent's benchmarks is surfaced as the
    /// performance-threshold kind instead of plain emptiness.
    pub async fn pickup(
        &self,
        agent_id: Uuid,
        ipaddress: Option<String>,
    ) -> Result<Option<TaskGrant>, ApiError> {
        self.agent_service
            .seen(agent_id, ipaddress)
            .await
            .map_err(|e| self.internal_error("pickup", &e))?;

        let assignment = self
            .assignment
            .next_assignment(agent_id)
            .await
            .map_err(|e| self.internal_error("pickup", &e))?;

        match assignment {
            Assignment::Granted(task) => Ok(Some(TaskGrant::from(&task))),
            Assignment::Empty { floor_skipped } if floor_skipped > 0 => Err(ApiError::new(
                ApiErrorKind::PerformanceThreshold,
                format!(
                    "agent benchmarks below the performance floor for {floor_skipped} eligible attack(s)"
                ),
            )),
            Assignment::Empty { .. } => Ok(None),
        }
    }

    /// Agent accepts a granted task: `pending → running`.
    pub async fn accept_task(&self, agent_id: Uuid, task_id: Uuid) -> Result<TaskGrant, ApiError> {
        match self.tasks.accept(task_id, agent_id).await {
            Ok(Some(task)) => Ok(TaskGrant::from(&task)),
            Ok(None) => Err(self.explain_task_failure(agent_id, task_id, "accept").await),
            Err(e) => Err(self.internal_error("accept", &anyhow::Error::from(e))),
        }
    }

    /// Submit one cracked hash. Transient storage failures are retried
    /// within a bounded budget before surfacing as internal.
    pub async fn submit_crack(
        &self,
        agent_id: Uuid,
        task_id: Uuid,
        hash_value: &str,
        plain_text: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<CrackResponse, ApiError> {
        self.owned_task(agent_id, task_id).await?;

        let policy = ExponentialBackoff {
            max_elapsed_time: Some(RETRY_BUDGET),
            ..ExponentialBackoff::default()
        };

        let result = backoff::future::retry(policy, || async {
            self.cracks
                .submit(task_id, hash_value, plain_text, timestamp)
                .await
                .map_err(|e| {
                    if is_transient(&e) {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
        })
        .await
        .map_err(|e| self.internal_error("submit_crack", &e))?;

        match result.error_type {
            Some(CrackErrorType::NotFound) => Ok(CrackResponse {
                success: false,
                error: Some("not_found"),
                uncracked_count: None,
            }),
            None => Ok(CrackResponse {
                success: true,
                error: None,
                uncracked_count: result.uncracked_count,
            }),
        }
    }

    /// Submit one telemetry frame.
    pub async fn submit_status(
        &self,
        agent_id: Uuid,
        task_id: Uuid,
        frame: StatusFrame,
    ) -> Result<StatusResponse, ApiError> {
        self.owned_task(agent_id, task_id).await?;

        let result = self
            .statuses
            .submit_status(task_id, frame)
            .await
            .map_err(|e| self.internal_error("submit_status", &e))?;

        match result {
            StatusResult::Ok => Ok(StatusResponse { status: "ok" }),
            StatusResult::Stale => Ok(StatusResponse { status: "stale" }),
            StatusResult::Paused => Ok(StatusResponse { status: "paused" }),
            StatusResult::Error(StatusErrorType::GuessNotFound) => Err(ApiError::new(
                ApiErrorKind::GuessNotFound,
                "status frame carries no guess record",
            )),
            StatusResult::Error(StatusErrorType::DeviceStatusesNotFound) => Err(ApiError::new(
                ApiErrorKind::DeviceStatusesNotFound,
                "status frame carries no device entries",
            )),
        }
    }

    /// Agent reports success (or 100% progress): `running → completed`.
    pub async fn complete_task(&self, agent_id: Uuid, task_id: Uuid) -> Result<(), ApiError> {
        let mut task = self.owned_task(agent_id, task_id).await?;
        task.complete()
            .map_err(|msg| ApiError::new(ApiErrorKind::TaskInvalid, msg))?;
        self.tasks
            .update(&task)
            .await
            .map_err(|e| self.internal_error("complete_task", &anyhow::Error::from(e)))?;
        Ok(())
    }

    /// Agent reports exhausted keyspace: the task exhausts, and once no
    /// incomplete sibling remains the attack settles to exhausted (hashes
    /// remain) or completed (list is done).
    pub async fn exhaust_task(&self, agent_id: Uuid, task_id: Uuid) -> Result<(), ApiError> {
        let mut task = self.owned_task(agent_id, task_id).await?;
        task.exhaust()
            .map_err(|msg| ApiError::new(ApiErrorKind::TaskInvalid, msg))?;
        self.tasks
            .update(&task)
            .await
            .map_err(|e| self.internal_error("exhaust_task", &anyhow::Error::from(e)))?;

        self.settle_exhausted_attack(task.attack_id)
            .await
            .map_err(|e| self.internal_error("exhaust_task", &e))?;
        Ok(())
    }

    /// Agent reports a benchmark set.
    pub async fn submit_benchmarks(
        &self,
        agent_id: Uuid,
        benchmarks: Vec<HashcatBenchmark>,
    ) -> Result<(), ApiError> {
        self.agent_service
            .submit_benchmarks(agent_id, benchmarks)
            .await
            .map_err(|e| self.internal_error("submit_benchmarks", &e))
    }

    /// Agent reports an incident.
    pub async fn report_error(
        &self,
        agent_id: Uuid,
        task_id: Option<Uuid>,
        severity: ErrorSeverity,
        message: String,
        metadata: Option<serde_json::Value>,
    ) -> Result<(), ApiError> {
        let mut error = AgentError::new(agent_id, severity, message);
        error.task_id = task_id;
        error.metadata = metadata;

        self.agent_service
            .record_error(error)
            .await
            .map_err(|e| self.internal_error("report_error", &e))
    }

    /// Agent announces a clean shutdown.
    pub async fn shutdown(&self, agent_id: Uuid) -> Result<(), ApiError> {
        self.agent_service
            .shutdown(agent_id)
            .await
            .map_err(|e| self.internal_error("shutdown", &e))
    }

    /// Render the attack recipe for a granted task.
    pub async fn attack_descriptor(&self, attack_id: Uuid) -> Result<AttackDescriptor, ApiError> {
        self.renderer
            .render(attack_id)
            .await
            .map_err(|e| self.internal_error("attack_descriptor", &e))
    }

    /// Render the dynamic uncracked-hash list of an attack's target.
    pub async fn uncracked_list(&self, attack_id: Uuid) -> Result<UncrackedList, ApiError> {
        let result: anyhow::Result<UncrackedList> = async {
            let attack = self
                .attacks
                .get(attack_id)
                .await?
                .ok_or(DomainError::AttackNotFound(attack_id))?;
            let campaign = self
                .campaigns
                .get(attack.campaign_id)
                .await?
                .ok_or(DomainError::CampaignNotFound(attack.campaign_id))?;
            self.renderer.render_uncracked_list(campaign.hash_list_id).await
        }
        .await;

        result.map_err(|e| self.internal_error("uncracked_list", &e))
    }

    async fn owned_task(&self, agent_id: Uuid, task_id: Uuid) -> Result<Task, ApiError> {
        match self.tasks.get(task_id).await {
            Ok(Some(task)) if task.agent_id == Some(agent_id) => Ok(task),
            Ok(_) => Err(self.explain_task_failure(agent_id, task_id, "task lookup").await),
            Err(e) => Err(self.internal_error(
                "task lookup",
                &anyhow::Error::from(e),
            )),
        }
    }

    async fn explain_task_failure(
        &self,
        agent_id: Uuid,
        task_id: Uuid,
        endpoint: &str,
    ) -> ApiError {
        match classify_task_lookup(self.tasks.as_ref(), task_id, agent_id).await {
            Ok(failure) => failure.into_api_error(task_id),
            Err(e) => self.internal_error(endpoint, &e),
        }
    }

    fn internal_error(&self, endpoint: &str, error: &anyhow::Error) -> ApiError {
        self.logger
            .api_error(endpoint, &error.to_string(), Some(&format!("{error:?}")));
        ApiError::new(ApiErrorKind::Internal, "internal error")
    }

    async fn settle_exhausted_attack(&self, attack_id: Uuid) -> anyhow::Result<()> {
        let siblings = self.tasks.list_by_attack(attack_id).await?;
        if siblings.iter().any(Task::is_incomplete) {
            return Ok(());
        }
        if !siblings
            .iter()
            .any(|t| t.state == TaskState::Exhausted)
        {
            return Ok(());
        }

        let Some(mut attack) = self.attacks.get(attack_id).await? else {
            return Ok(());
        };
        if attack.state != AttackState::Running {
            return Ok(());
        }

        let campaign = self
            .campaigns
            .get(attack.campaign_id)
            .await?
            .context("campaign of exhausted attack vanished")?;
        let uncracked = self
            .hash_lists
            .uncracked_count(campaign.hash_list_id)
            .await?;

        let target = if uncracked > 0 {
            AttackState::Exhausted
        } else {
            AttackState::Completed
        };
        if attack.transition_to(target).is_ok() {
            self.attacks.update(&attack).await?;
        }
        Ok(())
    }
}

fn is_transient(error: &anyhow::Error) -> bool {
    matches!(
        error.downcast_ref::<DomainError>(),
        Some(DomainError::DatabaseError(_) | DomainError::ConcurrencyConflict { .. })
    )
}
