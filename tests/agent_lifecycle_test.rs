//! Agent lifecycle integration tests: activation, shutdown, heartbeat
//! loss, and fatal-error escalation.

mod common;

use common::Harness;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cipherswarm::domain::models::{
    Agent, AgentError, AgentState, AttackState, CampaignPriority, ErrorSeverity,
    HashType, HashcatBenchmark, TaskState,
};
use cipherswarm::domain::ports::{
    AgentRepository as _, AttackRepository as _, LockStore as _, TaskRepository as _,
};
use cipherswarm::services::health_service::MONITOR_HEARTBEAT_KEY;
use cipherswarm::services::AgentMonitor;

#[tokio::test]
async fn first_benchmark_activates_agent() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;

    let agent = Agent::new("operator", "rig").with_project(project.id);
    h.agent_service.register(agent.clone()).await.unwrap();
    assert_eq!(
        h.agents.get(agent.id).await.unwrap().unwrap().state,
        AgentState::Pending
    );

    h.agent_service
        .submit_benchmarks(
            agent.id,
            vec![HashcatBenchmark::new(agent.id, HashType::MD5, 5_000_000.0)],
        )
        .await
        .unwrap();

    assert_eq!(
        h.agents.get(agent.id).await.unwrap().unwrap().state,
        AgentState::Active
    );
}

#[tokio::test]
async fn empty_benchmark_set_does_not_activate() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;

    let agent = Agent::new("operator", "rig").with_project(project.id);
    h.agent_service.register(agent.clone()).await.unwrap();
    h.agent_service.submit_benchmarks(agent.id, vec![]).await.unwrap();

    assert_eq!(
        h.agents.get(agent.id).await.unwrap().unwrap().state,
        AgentState::Pending
    );
}

#[tokio::test]
async fn shutdown_pauses_running_tasks_and_pickup_recovers() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["abc"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    let attack = h.create_attack(&campaign, 100).await;
    let agent = h.create_active_agent(&[&project], 10_000_000.0).await;
    let task = h.create_running_task(&attack, &agent).await;

    h.agent_service.shutdown(agent.id).await.unwrap();

    let agent_row = h.agents.get(agent.id).await.unwrap().unwrap();
    assert_eq!(agent_row.state, AgentState::Offline);
    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Paused);
    // The binding survives so the agent can resume its own work.
    assert_eq!(task.agent_id, Some(agent.id));

    // Next authenticated request recovers the agent.
    h.agent_service.seen(agent.id, Some("10.0.0.7".to_string())).await.unwrap();
    let agent_row = h.agents.get(agent.id).await.unwrap().unwrap();
    assert_eq!(agent_row.state, AgentState::Active);
    assert_eq!(agent_row.last_ipaddress.as_deref(), Some("10.0.0.7"));
}

#[tokio::test]
async fn monitor_takes_silent_agent_offline() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["abc"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    let attack = h.create_attack(&campaign, 100).await;

    let mut agent = h.create_active_agent(&[&project], 10_000_000.0).await;
    let task = h.create_running_task(&attack, &agent).await;

    // Fake a long silence.
    agent.last_seen_at = Some(Utc::now() - chrono::Duration::hours(2));
    h.agents.update(&agent).await.unwrap();

    let monitor = AgentMonitor::new(
        h.agents.clone(),
        h.agent_service.clone(),
        h.lock_store.clone(),
        Duration::from_secs(30),
    );
    monitor.sweep().await.unwrap();

    let agent_row = h.agents.get(agent.id).await.unwrap().unwrap();
    assert_eq!(agent_row.state, AgentState::Offline);
    let task = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task.state, TaskState::Paused);
}

#[tokio::test]
async fn recently_seen_agent_survives_sweep() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let agent = h.create_active_agent(&[&project], 10_000_000.0).await;

    let monitor = AgentMonitor::new(
        h.agents.clone(),
        h.agent_service.clone(),
        h.lock_store.clone(),
        Duration::from_secs(30),
    );
    monitor.sweep().await.unwrap();

    assert_eq!(
        h.agents.get(agent.id).await.unwrap().unwrap().state,
        AgentState::Active
    );
}

#[tokio::test]
async fn fatal_error_fails_attack_and_repeats_disable_agent() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["abc"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    let attack = h.create_attack(&campaign, 100).await;
    let agent = h.create_active_agent(&[&project], 10_000_000.0).await;
    let task = h.create_running_task(&attack, &agent).await;

    h.agent_service
        .record_error(
            AgentError::new(agent.id, ErrorSeverity::Fatal, "driver crash").with_task(task.id),
        )
        .await
        .unwrap();

    // The attack failed with its tasks cancelled.
    let attack_row = h.attacks.get(attack.id).await.unwrap().unwrap();
    assert_eq!(attack_row.state, AttackState::Failed);
    let task_row = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(task_row.state, TaskState::Failed);

    // One fatal error is not enough to disable the agent.
    assert_eq!(
        h.agents.get(agent.id).await.unwrap().unwrap().state,
        AgentState::Active
    );

    // Two more within the window cross the threshold.
    for _ in 0..2 {
        h.agent_service
            .record_error(AgentError::new(agent.id, ErrorSeverity::Fatal, "driver crash"))
            .await
            .unwrap();
    }
    assert_eq!(
        h.agents.get(agent.id).await.unwrap().unwrap().state,
        AgentState::Error
    );
}

#[tokio::test]
async fn fatal_error_blocks_resuming_the_same_task() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["abc", "def"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    let attack = h.create_attack(&campaign, 100).await;
    let agent = h.create_active_agent(&[&project], 10_000_000.0).await;
    let task = h.create_running_task(&attack, &agent).await;

    // A fatal incident tied to the task keeps it away from this agent.
    h.agents
        .record_error(
            &AgentError::new(agent.id, ErrorSeverity::Fatal, "kernel panic").with_task(task.id),
        )
        .await
        .unwrap();

    assert!(h
        .tasks
        .find_incomplete_for_agent(agent.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn monitor_publishes_heartbeat() {
    let h = Harness::new().await;
    let monitor = Arc::new(AgentMonitor::new(
        h.agents.clone(),
        h.agent_service.clone(),
        h.lock_store.clone(),
        Duration::from_millis(20),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let handle = monitor.start(shutdown_rx);

    tokio::time::sleep(Duration::from_millis(80)).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();

    let stamp = h.lock_store.fetch(MONITOR_HEARTBEAT_KEY).await.unwrap();
    assert!(stamp.is_some());
}
