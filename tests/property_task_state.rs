//! Property tests over the task state machine: for any sequence of
//! operations, the counters are monotone and terminal states are frozen.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use cipherswarm::domain::models::{Task, TaskState};

#[derive(Debug, Clone, Copy)]
enum Op {
    Accept,
    Pause,
    Resume,
    Cancel,
    Retry,
    Preempt { progress_pct: u8 },
    Complete,
    Exhaust,
    Abandon,
    Reassign,
    Touch { offset_secs: i16 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Accept),
        Just(Op::Pause),
        Just(Op::Resume),
        Just(Op::Cancel),
        Just(Op::Retry),
        (0u8..=100).prop_map(|progress_pct| Op::Preempt { progress_pct }),
        Just(Op::Complete),
        Just(Op::Exhaust),
        Just(Op::Abandon),
        Just(Op::Reassign),
        (-300i16..=300).prop_map(|offset_secs| Op::Touch { offset_secs }),
    ]
}

fn apply(task: &mut Task, op: Op) {
    // Invalid operations are rejected by the machine; rejection is fine,
    // the properties below must hold either way.
    let _ = match op {
        Op::Accept => task.accept(),
        Op::Pause => task.pause(),
        Op::Resume => task.resume(),
        Op::Cancel => task.cancel(),
        Op::Retry => task.retry(),
        Op::Preempt { progress_pct } => task.preempt(f64::from(progress_pct) / 100.0),
        Op::Complete => task.complete(),
        Op::Exhaust => task.exhaust(),
        Op::Abandon => task.abandon(),
        Op::Reassign => task.reassign(Uuid::new_v4()),
        Op::Touch { offset_secs } => {
            task.touch_activity(Utc::now() + Duration::seconds(i64::from(offset_secs)));
            Ok(())
        }
    };
}

proptest! {
    #[test]
    fn counters_are_monotone_and_terminals_freeze(
        ops in prop::collection::vec(op_strategy(), 0..60)
    ) {
        let mut task = Task::new(Uuid::new_v4(), Uuid::new_v4());
        let mut preemptions = task.preemption_count;
        let mut retries = task.retry_count;
        let mut version = task.version;
        let mut activity = task.activity_timestamp;
        let mut terminal_state: Option<TaskState> = None;

        for op in ops {
            apply(&mut task, op);

            prop_assert!(task.preemption_count >= preemptions);
            prop_assert!(task.retry_count >= retries);
            prop_assert!(task.version >= version);
            if let (Some(previous), Some(current)) = (activity, task.activity_timestamp) {
                prop_assert!(current >= previous);
            }

            if let Some(frozen) = terminal_state {
                prop_assert_eq!(task.state, frozen);
            } else if task.state.is_terminal() {
                terminal_state = Some(task.state);
            }

            preemptions = task.preemption_count;
            retries = task.retry_count;
            version = task.version;
            activity = task.activity_timestamp;
        }
    }

    #[test]
    fn preemption_only_succeeds_under_the_guards(
        progress_pct in 0u8..=100,
        prior_preemptions in 0i64..=3,
    ) {
        let mut task = Task::new(Uuid::new_v4(), Uuid::new_v4());
        task.accept().unwrap();
        task.preemption_count = prior_preemptions;

        let progress = f64::from(progress_pct) / 100.0;
        let expected = prior_preemptions < 2 && progress < 0.90;
        prop_assert_eq!(task.preempt(progress).is_ok(), expected);

        if expected {
            prop_assert_eq!(task.state, TaskState::Pending);
            prop_assert!(task.stale);
            prop_assert!(task.agent_id.is_none());
            prop_assert_eq!(task.preemption_count, prior_preemptions + 1);
        }
    }
}
