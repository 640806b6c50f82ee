//! Status submission integration tests: frame validation, persistence,
//! and the stale/paused readouts.

mod common;

use common::{frame, Harness};

use cipherswarm::domain::models::CampaignPriority;
use cipherswarm::domain::ports::{StatusRepository as _, TaskRepository as _};
use cipherswarm::services::{StatusErrorType, StatusResult};

async fn harness_with_running_task() -> (Harness, uuid::Uuid) {
    let h = Harness::new().await;
    let project = h.create_project("p1").await;
    let list = h.create_hash_list(&project, &["abc"]).await;
    let campaign = h.create_campaign(&project, &list, CampaignPriority::Normal).await;
    let attack = h.create_attack(&campaign, 100).await;
    let agent = h.create_active_agent(&[&project], 10_000_000.0).await;
    let task = h.create_running_task(&attack, &agent).await;
    (h, task.id)
}

#[tokio::test]
async fn frame_is_persisted_and_activity_advances() {
    let (h, task_id) = harness_with_running_task().await;

    let before = h.tasks.get(task_id).await.unwrap().unwrap();
    assert!(before.activity_timestamp.is_none());

    let result = h
        .status_service
        .submit_status(task_id, frame(25, 100))
        .await
        .unwrap();
    assert_eq!(result, StatusResult::Ok);

    let latest = h.statuses.latest_for_task(task_id).await.unwrap().unwrap();
    assert_eq!(latest.progress, [25, 100]);
    assert_eq!(latest.device_statuses.len(), 1);
    assert_eq!(latest.device_statuses[0].device_name, "RTX 4090");

    let after = h.tasks.get(task_id).await.unwrap().unwrap();
    assert!(after.activity_timestamp.is_some());
}

#[tokio::test]
async fn frames_are_ordered_and_latest_wins() {
    let (h, task_id) = harness_with_running_task().await;

    for (done, total) in [(10, 100), (20, 100), (30, 100)] {
        h.status_service
            .submit_status(task_id, frame(done, total))
            .await
            .unwrap();
    }

    let latest = h.statuses.latest_for_task(task_id).await.unwrap().unwrap();
    assert_eq!(latest.progress, [30, 100]);

    let all = h.statuses.list_for_task(task_id, 10).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn missing_guess_is_rejected_without_mutation() {
    let (h, task_id) = harness_with_running_task().await;

    let mut bad = frame(25, 100);
    bad.hashcat_guess = None;

    let result = h.status_service.submit_status(task_id, bad).await.unwrap();
    assert_eq!(result, StatusResult::Error(StatusErrorType::GuessNotFound));

    // No frame stored, no activity touch.
    assert!(h.statuses.latest_for_task(task_id).await.unwrap().is_none());
    let task = h.tasks.get(task_id).await.unwrap().unwrap();
    assert!(task.activity_timestamp.is_none());
}

#[tokio::test]
async fn missing_devices_are_rejected_without_mutation() {
    let (h, task_id) = harness_with_running_task().await;

    let mut bad = frame(25, 100);
    bad.device_statuses.clear();

    let result = h.status_service.submit_status(task_id, bad).await.unwrap();
    assert_eq!(
        result,
        StatusResult::Error(StatusErrorType::DeviceStatusesNotFound)
    );
    assert!(h.statuses.latest_for_task(task_id).await.unwrap().is_none());
}

#[tokio::test]
async fn stale_task_reads_out_stale() {
    let (h, task_id) = harness_with_running_task().await;
    h.tasks.set_stale(task_id, true).await.unwrap();

    let result = h
        .status_service
        .submit_status(task_id, frame(25, 100))
        .await
        .unwrap();
    assert_eq!(result, StatusResult::Stale);

    // The readout never mutates state: the task is still running and the
    // frame was stored anyway.
    let task = h.tasks.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.state.as_str(), "running");
    assert!(h.statuses.latest_for_task(task_id).await.unwrap().is_some());
}

#[tokio::test]
async fn paused_task_reads_out_paused() {
    let (h, task_id) = harness_with_running_task().await;

    let mut task = h.tasks.get(task_id).await.unwrap().unwrap();
    task.pause().unwrap();
    h.tasks.update(&task).await.unwrap();

    let result = h
        .status_service
        .submit_status(task_id, frame(25, 100))
        .await
        .unwrap();
    assert_eq!(result, StatusResult::Paused);
}

#[tokio::test]
async fn stale_wins_over_paused() {
    let (h, task_id) = harness_with_running_task().await;

    let mut task = h.tasks.get(task_id).await.unwrap().unwrap();
    task.pause().unwrap();
    h.tasks.update(&task).await.unwrap();
    h.tasks.set_stale(task_id, true).await.unwrap();

    // A stale paused task must first re-sync cracks.
    let result = h
        .status_service
        .submit_status(task_id, frame(25, 100))
        .await
        .unwrap();
    assert_eq!(result, StatusResult::Stale);
}
