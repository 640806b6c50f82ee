//! Preemption service integration tests: slot reclaim for high-priority
//! attacks on a saturated fleet.

mod common;

use common::Harness;

use cipherswarm::domain::models::{Agent, CampaignPriority, Task, TaskState};
use cipherswarm::domain::ports::TaskRepository as _;
use uuid::Uuid;

/// Two agents, each running one normal-priority task at the given
/// progresses, plus an admitted high-priority attack in the same project.
async fn saturated_fleet(
    h: &Harness,
    progress_1: (i64, i64),
    progress_2: (i64, i64),
) -> (Task, Task, Uuid, Agent, Agent) {
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["aa", "bb"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    h.create_attack(&campaign, 100).await;
    h.create_attack(&campaign, 200).await;

    let g1 = h.create_active_agent(&[&project], 10_000_000.0).await;
    let g2 = h.create_active_agent(&[&project], 10_000_000.0).await;

    let t1 = h.pickup(&g1).await;
    let t1 = h.accept(&t1).await;
    let t2 = h.pickup(&g2).await;
    let t2 = h.accept(&t2).await;

    h.post_progress(t1.id, progress_1.0, progress_1.1).await;
    h.post_progress(t2.id, progress_2.0, progress_2.1).await;

    let high_list = h.create_hash_list(&project, &["cc"]).await;
    let high_campaign = h
        .create_campaign(&project, &high_list, CampaignPriority::High)
        .await;
    let high_attack = h.create_attack(&high_campaign, 50).await;

    (t1, t2, high_attack.id, g1, g2)
}

#[tokio::test]
async fn preempts_least_complete_task() {
    let h = Harness::new().await;
    let (t1, t2, high_attack, _, _) = saturated_fleet(&h, (25, 100), (75, 100)).await;

    let preempted = h
        .preemption
        .preempt_if_needed(high_attack)
        .await
        .unwrap()
        .expect("expected a preemption");

    assert_eq!(preempted.id, t1.id);
    assert_eq!(preempted.state, TaskState::Pending);
    assert_eq!(preempted.preemption_count, 1);
    assert!(preempted.stale);
    assert!(preempted.agent_id.is_none());

    // The further-along task keeps running untouched.
    let t2 = h.tasks.get(t2.id).await.unwrap().unwrap();
    assert_eq!(t2.state, TaskState::Running);
    assert_eq!(t2.preemption_count, 0);
}

#[tokio::test]
async fn twice_preempted_task_is_pinned() {
    let h = Harness::new().await;
    let (t1, t2, high_attack, g1, _) = saturated_fleet(&h, (25, 100), (75, 100)).await;

    // First high-priority arrival claims T1.
    let first = h.preemption.preempt_if_needed(high_attack).await.unwrap().unwrap();
    assert_eq!(first.id, t1.id);

    // T1 goes back to its agent and runs again; second arrival claims it
    // once more (count 1 is still preemptable).
    let mut back = h.tasks.get(t1.id).await.unwrap().unwrap();
    back.reassign(g1.id).unwrap();
    h.tasks.update(&back).await.unwrap();
    h.tasks.accept(t1.id, g1.id).await.unwrap().unwrap();

    let second = h.preemption.preempt_if_needed(high_attack).await.unwrap().unwrap();
    assert_eq!(second.id, t1.id);
    assert_eq!(second.preemption_count, 2);

    // Third arrival: T1 is pinned, so T2 (75 %, still under the cutoff)
    // gives up its slot instead.
    let mut back = h.tasks.get(t1.id).await.unwrap().unwrap();
    back.reassign(g1.id).unwrap();
    h.tasks.update(&back).await.unwrap();
    h.tasks.accept(t1.id, g1.id).await.unwrap().unwrap();

    let third = h.preemption.preempt_if_needed(high_attack).await.unwrap().unwrap();
    assert_eq!(third.id, t2.id);
}

#[tokio::test]
async fn other_projects_are_never_touched() {
    let h = Harness::new().await;
    let (t1, t2, _, _, _) = saturated_fleet(&h, (25, 100), (75, 100)).await;

    // A high-priority attack lands in a different project.
    let p2 = h.create_project("p2").await;
    let other_list = h.create_hash_list(&p2, &["dd"]).await;
    let other_campaign = h.create_campaign(&p2, &other_list, CampaignPriority::High).await;
    let other_attack = h.create_attack(&other_campaign, 10).await;

    let result = h.preemption.preempt_if_needed(other_attack.id).await.unwrap();
    assert!(result.is_none());

    for id in [t1.id, t2.id] {
        let task = h.tasks.get(id).await.unwrap().unwrap();
        assert_eq!(task.state, TaskState::Running);
        assert_eq!(task.preemption_count, 0);
    }
}

#[tokio::test]
async fn idle_fleet_needs_no_preemption() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["aa"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    h.create_attack(&campaign, 100).await;

    let g1 = h.create_active_agent(&[&project], 10_000_000.0).await;
    let task = h.pickup(&g1).await;
    h.accept(&task).await;

    // A second active agent sits idle, so the fleet is not saturated.
    h.create_active_agent(&[&project], 10_000_000.0).await;

    let high_list = h.create_hash_list(&project, &["cc"]).await;
    let high_campaign = h
        .create_campaign(&project, &high_list, CampaignPriority::High)
        .await;
    let high_attack = h.create_attack(&high_campaign, 10).await;

    assert!(h.preemption.preempt_if_needed(high_attack.id).await.unwrap().is_none());
}

#[tokio::test]
async fn ninety_percent_progress_is_protected() {
    let h = Harness::new().await;
    let (t1, t2, high_attack, _, _) = saturated_fleet(&h, (90, 100), (95, 100)).await;

    // Both tasks are at or above the cutoff: no victim.
    assert!(h.preemption.preempt_if_needed(high_attack).await.unwrap().is_none());

    for id in [t1.id, t2.id] {
        let task = h.tasks.get(id).await.unwrap().unwrap();
        assert_eq!(task.state, TaskState::Running);
    }
}

#[tokio::test]
async fn task_without_frames_counts_as_zero_progress() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["aa", "bb"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    h.create_attack(&campaign, 100).await;
    h.create_attack(&campaign, 200).await;

    let g1 = h.create_active_agent(&[&project], 10_000_000.0).await;
    let g2 = h.create_active_agent(&[&project], 10_000_000.0).await;

    let silent = h.pickup(&g1).await;
    let silent = h.accept(&silent).await;
    let reporting = h.pickup(&g2).await;
    let reporting = h.accept(&reporting).await;
    h.post_progress(reporting.id, 50, 100).await;

    let high_list = h.create_hash_list(&project, &["cc"]).await;
    let high_campaign = h
        .create_campaign(&project, &high_list, CampaignPriority::High)
        .await;
    let high_attack = h.create_attack(&high_campaign, 10).await;

    let preempted = h
        .preemption
        .preempt_if_needed(high_attack.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(preempted.id, silent.id);
}

#[tokio::test]
async fn lowest_priority_group_loses_first() {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;

    let low_list = h.create_hash_list(&project, &["aa"]).await;
    let low_campaign = h.create_campaign(&project, &low_list, CampaignPriority::Low).await;
    let low_attack = h.create_attack(&low_campaign, 100).await;

    let normal_list = h.create_hash_list(&project, &["bb"]).await;
    let normal_campaign = h
        .create_campaign(&project, &normal_list, CampaignPriority::Normal)
        .await;
    let normal_attack = h.create_attack(&normal_campaign, 50).await;

    let g1 = h.create_active_agent(&[&project], 10_000_000.0).await;
    let g2 = h.create_active_agent(&[&project], 10_000_000.0).await;

    let normal_task = h.create_running_task(&normal_attack, &g1).await;
    let low_task = h.create_running_task(&low_attack, &g2).await;

    // The normal task is barely started, the low one nearly half done;
    // priority still dominates progress.
    h.post_progress(normal_task.id, 1, 100).await;
    h.post_progress(low_task.id, 45, 100).await;

    let high_list = h.create_hash_list(&project, &["cc"]).await;
    let high_campaign = h
        .create_campaign(&project, &high_list, CampaignPriority::High)
        .await;
    let high_attack = h.create_attack(&high_campaign, 10).await;

    let preempted = h
        .preemption
        .preempt_if_needed(high_attack.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(preempted.id, low_task.id);
}
