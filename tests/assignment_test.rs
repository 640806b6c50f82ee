//! Assignment service integration tests: the five-rule pickup order.

mod common;

use common::Harness;

use cipherswarm::domain::models::{
    AttackState, CampaignPriority, ErrorSeverity, TaskState, MIN_PERFORMANCE_BENCHMARK,
};
use cipherswarm::domain::ports::{
    AgentRepository as _, AttackRepository as _, TaskRepository as _,
};
use cipherswarm::services::Assignment;

#[tokio::test]
async fn creates_task_from_cheapest_attack() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["5f4dcc3b5aa765d61d8327deb882cf99"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    let expensive = h.create_attack(&campaign, 500).await;
    let cheap = h.create_attack(&campaign, 100).await;
    let agent = h.create_active_agent(&[&project], 10_000_000.0).await;

    let task = h.pickup(&agent).await;

    assert_eq!(task.attack_id, cheap.id);
    assert_eq!(task.agent_id, Some(agent.id));
    assert_eq!(task.state, TaskState::Pending);

    // The chosen attack started; the expensive one is untouched.
    let cheap = h.attacks.get(cheap.id).await.unwrap().unwrap();
    assert_eq!(cheap.state, AttackState::Running);
    let expensive = h.attacks.get(expensive.id).await.unwrap().unwrap();
    assert_eq!(expensive.state, AttackState::Pending);
}

#[tokio::test]
async fn repeat_pickup_returns_same_task() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["abc"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    h.create_attack(&campaign, 100).await;
    let agent = h.create_active_agent(&[&project], 10_000_000.0).await;

    let first = h.pickup(&agent).await;
    let second = h.pickup(&agent).await;
    assert_eq!(first.id, second.id);

    // Still the same task after accepting it.
    h.accept(&first).await;
    let third = h.pickup(&agent).await;
    assert_eq!(first.id, third.id);
}

#[tokio::test]
async fn agent_without_membership_gets_nothing() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["abc"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    h.create_attack(&campaign, 100).await;

    // Member of no projects at all.
    let outsider = h.create_active_agent(&[], 10_000_000.0).await;
    assert!(h.assignment.find_next_task(outsider.id).await.unwrap().is_none());
}

#[tokio::test]
async fn agent_without_benchmark_sees_no_attacks() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["abc"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    h.create_attack(&campaign, 100).await;

    let mut agent = cipherswarm::domain::models::Agent::new("operator", "rig")
        .with_project(project.id);
    agent.activate().unwrap();
    h.agents.create(&agent).await.unwrap();

    assert!(h.assignment.find_next_task(agent.id).await.unwrap().is_none());
}

#[tokio::test]
async fn below_threshold_agent_is_skipped_with_info_error() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["abc"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    h.create_attack(&campaign, 100).await;
    let slow = h
        .create_active_agent(&[&project], MIN_PERFORMANCE_BENCHMARK - 1.0)
        .await;

    // The emptiness is attributed to the benchmark floor, not a lack of
    // work.
    match h.assignment.next_assignment(slow.id).await.unwrap() {
        Assignment::Empty { floor_skipped } => assert_eq!(floor_skipped, 1),
        Assignment::Granted(task) => panic!("unexpected grant: {}", task.id),
    }
    assert!(h.assignment.find_next_task(slow.id).await.unwrap().is_none());

    let errors = h.agents.list_errors(slow.id).await.unwrap();
    assert!(!errors.is_empty());
    assert_eq!(errors[0].severity, ErrorSeverity::Info);
    assert_eq!(errors[0].message, "performance threshold");
}

#[tokio::test]
async fn empty_pool_reports_zero_floor_skips() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let agent = h.create_active_agent(&[&project], 10_000_000.0).await;

    match h.assignment.next_assignment(agent.id).await.unwrap() {
        Assignment::Empty { floor_skipped } => assert_eq!(floor_skipped, 0),
        Assignment::Granted(task) => panic!("unexpected grant: {}", task.id),
    }
}

#[tokio::test]
async fn paused_campaign_is_not_assigned() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["abc"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    h.create_attack(&campaign, 100).await;
    let agent = h.create_active_agent(&[&project], 10_000_000.0).await;

    h.campaign_service.pause(campaign.id).await.unwrap();
    assert!(h.assignment.find_next_task(agent.id).await.unwrap().is_none());

    h.campaign_service.resume(campaign.id).await.unwrap();
    assert!(h.assignment.find_next_task(agent.id).await.unwrap().is_some());
}

#[tokio::test]
async fn fully_cracked_list_spawns_no_tasks() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["abc"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    let attack = h.create_attack(&campaign, 100).await;
    let agent = h.create_active_agent(&[&project], 10_000_000.0).await;

    // Crack the only hash through a task of the attack.
    let task = h.pickup(&agent).await;
    h.accept(&task).await;
    h.cracks
        .submit(task.id, "abc", "password", chrono::Utc::now())
        .await
        .unwrap();

    // No uncracked items remain: nothing new is created.
    let other = h.create_active_agent(&[&project], 10_000_000.0).await;
    assert!(h.assignment.find_next_task(other.id).await.unwrap().is_none());

    // And the attack itself has completed.
    let attack = h.attacks.get(attack.id).await.unwrap().unwrap();
    assert_eq!(attack.state, AttackState::Completed);
}

#[tokio::test]
async fn reclaims_orphaned_paused_task() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["abc"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    h.create_attack(&campaign, 100).await;

    let g1 = h.create_active_agent(&[&project], 10_000_000.0).await;
    let task = h.pickup(&g1).await;
    h.accept(&task).await;

    // G1 shuts down: its running task pauses and it goes offline.
    h.agent_service.shutdown(g1.id).await.unwrap();
    let orphan = h.tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(orphan.state, TaskState::Paused);
    assert_eq!(orphan.agent_id, Some(g1.id));

    // G2 picks up: same task, rebound, resumed to pending, stale.
    let g2 = h.create_active_agent(&[&project], 10_000_000.0).await;
    let reclaimed = h.pickup(&g2).await;
    assert_eq!(reclaimed.id, task.id);
    assert_eq!(reclaimed.state, TaskState::Pending);
    assert_eq!(reclaimed.agent_id, Some(g2.id));
    assert!(reclaimed.stale);
}

#[tokio::test]
async fn failed_task_is_retried_on_pickup() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["abc"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    h.create_attack(&campaign, 100).await;
    let agent = h.create_active_agent(&[&project], 10_000_000.0).await;

    let task = h.pickup(&agent).await;
    let mut running = h.accept(&task).await;
    running.last_error = Some("watchdog abort".to_string());
    running.cancel().unwrap();
    h.tasks.update(&running).await.unwrap();

    let retried = h.pickup(&agent).await;
    assert_eq!(retried.id, task.id);
    assert_eq!(retried.state, TaskState::Pending);
    assert_eq!(retried.retry_count, 1);
    assert!(retried.last_error.is_none());
}
