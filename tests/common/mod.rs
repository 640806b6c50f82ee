//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use cipherswarm::adapters::memory::InProcessLockStore;
use cipherswarm::adapters::sqlite::{
    create_migrated_test_pool, SqliteAgentRepository, SqliteAttackRepository,
    SqliteBenchmarkRepository, SqliteCampaignRepository, SqliteHashListRepository,
    SqliteProjectRepository, SqliteResourceRepository, SqliteStatusRepository,
    SqliteTaskRepository,
};
use cipherswarm::domain::models::{
    Agent, Attack, AttackMode, AttackState, Campaign, CampaignPriority, DeviceStatus, HashItem,
    HashList, HashType, HashcatBenchmark, HashcatGuess, HashcatStatus, Project, StatusFrame, Task,
};
use cipherswarm::domain::ports::{
    AgentRepository, AttackRepository, BenchmarkRepository, CampaignRepository,
    HashListRepository, ProjectRepository, ResourceRepository, StatusRepository, TaskRepository,
};
use cipherswarm::services::{
    AgentService, AssignmentService, CampaignService, CrackService, EtaService, EventBus,
    PreemptionService, StateChangeLogger, StatusService,
};

/// Every repository and service wired over one migrated in-memory pool.
pub struct Harness {
    pub pool: SqlitePool,
    pub projects: Arc<dyn ProjectRepository>,
    pub hash_lists: Arc<dyn HashListRepository>,
    pub campaigns: Arc<dyn CampaignRepository>,
    pub attacks: Arc<dyn AttackRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub agents: Arc<dyn AgentRepository>,
    pub benchmarks: Arc<dyn BenchmarkRepository>,
    pub statuses: Arc<dyn StatusRepository>,
    pub resources: Arc<dyn ResourceRepository>,
    pub lock_store: Arc<InProcessLockStore>,
    pub event_bus: Arc<EventBus>,
    pub logger: StateChangeLogger,
    pub campaign_service: Arc<CampaignService>,
    pub agent_service: Arc<AgentService>,
    pub preemption: Arc<PreemptionService>,
    pub assignment: Arc<AssignmentService>,
    pub cracks: Arc<CrackService>,
    pub status_service: Arc<StatusService>,
    pub eta: Arc<EtaService>,
}

impl Harness {
    pub async fn new() -> Self {
        let pool = create_migrated_test_pool().await.unwrap();

        let projects: Arc<dyn ProjectRepository> =
            Arc::new(SqliteProjectRepository::new(pool.clone()));
        let hash_lists: Arc<dyn HashListRepository> =
            Arc::new(SqliteHashListRepository::new(pool.clone()));
        let campaigns: Arc<dyn CampaignRepository> =
            Arc::new(SqliteCampaignRepository::new(pool.clone()));
        let attacks: Arc<dyn AttackRepository> =
            Arc::new(SqliteAttackRepository::new(pool.clone()));
        let tasks: Arc<dyn TaskRepository> = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let agents: Arc<dyn AgentRepository> = Arc::new(SqliteAgentRepository::new(pool.clone()));
        let benchmarks: Arc<dyn BenchmarkRepository> =
            Arc::new(SqliteBenchmarkRepository::new(pool.clone()));
        let statuses: Arc<dyn StatusRepository> =
            Arc::new(SqliteStatusRepository::new(pool.clone()));
        let resources: Arc<dyn ResourceRepository> =
            Arc::new(SqliteResourceRepository::new(pool.clone()));
        let lock_store = Arc::new(InProcessLockStore::new());

        // One bus for every service, so a single subscriber sees the
        // whole lifecycle stream.
        let event_bus = Arc::new(EventBus::default());
        let logger = StateChangeLogger::with_bus(event_bus.clone());

        let campaign_service = Arc::new(
            CampaignService::new(campaigns.clone(), attacks.clone(), tasks.clone())
                .with_logger(logger.clone()),
        );
        let agent_service = Arc::new(
            AgentService::new(
                agents.clone(),
                benchmarks.clone(),
                tasks.clone(),
                campaign_service.clone(),
            )
            .with_logger(logger.clone()),
        );
        let preemption = Arc::new(
            PreemptionService::new(tasks.clone(), attacks.clone(), campaigns.clone())
                .with_logger(logger.clone()),
        );
        let assignment = Arc::new(
            AssignmentService::new(
                tasks.clone(),
                attacks.clone(),
                agents.clone(),
                preemption.clone(),
            )
            .with_logger(logger.clone()),
        );
        let cracks = Arc::new(
            CrackService::new(
                tasks.clone(),
                attacks.clone(),
                campaigns.clone(),
                hash_lists.clone(),
            )
            .with_logger(logger.clone()),
        );
        let status_service = Arc::new(StatusService::new(tasks.clone(), statuses.clone()));
        let eta = Arc::new(EtaService::new(
            tasks.clone(),
            statuses.clone(),
            attacks.clone(),
            campaigns.clone(),
            hash_lists.clone(),
            benchmarks.clone(),
        ));

        Self {
            pool,
            projects,
            hash_lists,
            campaigns,
            attacks,
            tasks,
            agents,
            benchmarks,
            statuses,
            resources,
            lock_store,
            event_bus,
            logger,
            campaign_service,
            agent_service,
            preemption,
            assignment,
            cracks,
            status_service,
            eta,
        }
    }

    pub async fn create_project(&self, name: &str) -> Project {
        let project = Project::new(name);
        self.projects.create(&project).await.unwrap();
        project
    }

    /// A processed MD5 hash list seeded with the given hash values.
    pub async fn create_hash_list(&self, project: &Project, values: &[&str]) -> HashList {
        let mut list = HashList::new(project.id, "list", HashType::MD5);
        list.processed = true;
        self.hash_lists.create(&list).await.unwrap();
        for value in values {
            self.hash_lists
                .add_item(&HashItem::new(list.id, *value))
                .await
                .unwrap();
        }
        list
    }

    pub async fn create_campaign(
        &self,
        project: &Project,
        hash_list: &HashList,
        priority: CampaignPriority,
    ) -> Campaign {
        let campaign = Campaign::new(project.id, hash_list.id, "campaign", "admin")
            .with_priority(priority);
        self.campaigns.create(&campaign).await.unwrap();
        campaign
    }

    pub async fn create_attack(&self, campaign: &Campaign, complexity: i64) -> Attack {
        let attack = Attack::new(campaign.id, "mask attack", AttackMode::Mask)
            .with_mask("?d?d?d?d?d?d")
            .with_complexity(complexity);
        self.attacks.create(&attack).await.unwrap();
        attack
    }

    /// An active agent with membership in the given projects and an MD5
    /// benchmark at the given speed.
    pub async fn create_active_agent(&self, projects: &[&Project], speed: f64) -> Agent {
        let mut agent = Agent::new("operator", "rig");
        for project in projects {
            agent = agent.with_project(project.id);
        }
        agent.activate().unwrap();
        agent.last_seen_at = Some(Utc::now());
        self.agents.create(&agent).await.unwrap();

        self.benchmarks
            .replace_for_agent(
                agent.id,
                &[HashcatBenchmark::new(agent.id, HashType::MD5, speed)],
            )
            .await
            .unwrap();
        agent
    }

    /// A pickup that must yield a task.
    pub async fn pickup(&self, agent: &Agent) -> Task {
        self.assignment
            .find_next_task(agent.id)
            .await
            .unwrap()
            .expect("expected a task")
    }

    /// Accept a pending task on behalf of its agent.
    pub async fn accept(&self, task: &Task) -> Task {
        self.tasks
            .accept(task.id, task.agent_id.unwrap())
            .await
            .unwrap()
            .expect("accept guard failed")
    }

    /// Bind a fresh running task to (attack, agent) directly, bypassing
    /// assignment. Useful when a test needs a specific layout.
    pub async fn create_running_task(&self, attack: &Attack, agent: &Agent) -> Task {
        let task = Task::new(attack.id, agent.id);
        self.tasks.create(&task).await.unwrap();

        let mut attack = self.attacks.get(attack.id).await.unwrap().unwrap();
        if attack.state == AttackState::Pending {
            attack.transition_to(AttackState::Running).unwrap();
            self.attacks.update(&attack).await.unwrap();
        }
        self.accept(&task).await
    }

    /// Record a status frame carrying the given progress for a task.
    pub async fn post_progress(&self, task_id: Uuid, done: i64, total: i64) {
        let status = HashcatStatus::from_frame(task_id, frame(done, total));
        self.statuses.insert(&status).await.unwrap();
    }
}

/// A well-formed status frame at the given progress.
pub fn frame(done: i64, total: i64) -> StatusFrame {
    StatusFrame {
        time: Utc::now(),
        session: Some("cipherswarm".to_string()),
        status: 3,
        progress: [done, total],
        restore_point: 0,
        rejected: 0,
        time_start: Some(Utc::now()),
        estimated_stop: None,
        hashcat_guess: Some(HashcatGuess::default()),
        device_statuses: vec![DeviceStatus {
            device_id: 1,
            device_name: "RTX 4090".to_string(),
            device_type: "gpu".to_string(),
            speed: 1_000_000,
            utilization: 97,
            temperature: 64,
        }],
    }
}
