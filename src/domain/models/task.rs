//! Task domain model.
//!
//! A task is one assignment of an attack to an agent. Its state machine is
//! the contract every scheduling service (assignment, preemption, status and
//! crack ingestion) is written against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Preemption count at which a task becomes pinned against further preemption.
pub const PREEMPTION_PIN_COUNT: i64 = 2;

/// Fractional progress at or above which a running task may not be preempted.
pub const PREEMPTION_PROGRESS_CUTOFF: f64 = 0.90;

/// State of a task in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for its agent to pick it up (or re-pick it up)
    Pending,
    /// The agent is actively working the keyspace slice
    Running,
    /// Suspended; keeps its agent binding for later resume or reclaim
    Paused,
    /// Finished successfully
    Completed,
    /// Cancelled by a user or stopped by an error
    Failed,
    /// Keyspace enumerated with hashes remaining
    Exhausted,
    /// Destroyed together with its attack
    Abandoned,
}

impl Default for TaskState {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Exhausted => "exhausted",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "exhausted" => Some(Self::Exhausted),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }

    /// Check if this is a terminal state. `Failed` is not terminal: a user
    /// retry moves it back to pending.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Exhausted | Self::Abandoned)
    }

    /// A task is incomplete while pending, running, or paused.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Self::Pending | Self::Running | Self::Paused)
    }

    /// Valid transitions from this state.
    pub fn valid_transitions(&self) -> &'static [TaskState] {
        match self {
            Self::Pending => &[Self::Running, Self::Failed, Self::Abandoned],
            Self::Running => &[
                Self::Pending,
                Self::Paused,
                Self::Completed,
                Self::Failed,
                Self::Exhausted,
                Self::Abandoned,
            ],
            Self::Paused => &[Self::Pending, Self::Abandoned],
            Self::Failed => &[Self::Pending, Self::Abandoned],
            Self::Completed | Self::Exhausted | Self::Abandoned => &[],
        }
    }

    pub fn can_transition_to(&self, new_state: Self) -> bool {
        self.valid_transitions().contains(&new_state)
    }
}

/// One assignment of an attack to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: Uuid,
    /// Owning attack
    pub attack_id: Uuid,
    /// Bound agent; cleared by preemption
    pub agent_id: Option<Uuid>,
    /// Current state
    pub state: TaskState,
    /// When set, the agent must re-pull cracks before continuing
    pub stale: bool,
    /// Times this task was retried after failure
    pub retry_count: i64,
    /// Times this task has been preempted; ≥ 2 pins it
    pub preemption_count: i64,
    /// Most recent error message, cleared on retry
    pub last_error: Option<String>,
    /// Last time the agent reported activity; only moves forward
    pub activity_timestamp: Option<DateTime<Utc>>,
    /// Version for optimistic locking
    pub version: i64,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
    /// When first accepted by an agent
    pub started_at: Option<DateTime<Utc>>,
    /// When reaching a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task bound to (attack, agent).
    pub fn new(attack_id: Uuid, agent_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            attack_id,
            agent_id: Some(agent_id),
            state: TaskState::default(),
            stale: false,
            retry_count: 0,
            preemption_count: 0,
            last_error: None,
            activity_timestamp: None,
            version: 1,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    fn transition_to(&mut self, new_state: TaskState) -> Result<(), String> {
        if !self.state.can_transition_to(new_state) {
            return Err(format!(
                "Cannot transition task from {} to {}",
                self.state.as_str(),
                new_state.as_str()
            ));
        }
        self.state = new_state;
        self.updated_at = Utc::now();
        self.version += 1;

        match new_state {
            TaskState::Running => {
                if self.started_at.is_none() {
                    self.started_at = Some(Utc::now());
                }
            }
            s if s.is_terminal() => self.completed_at = Some(Utc::now()),
            _ => {}
        }
        Ok(())
    }

    /// Agent accepts the task: `pending → running`.
    pub fn accept(&mut self) -> Result<(), String> {
        if self.state != TaskState::Pending {
            return Err(format!("Cannot accept task in state {}", self.state.as_str()));
        }
        self.transition_to(TaskState::Running)
    }

    /// Suspend a running task, keeping the agent binding.
    pub fn pause(&mut self) -> Result<(), String> {
        if self.state != TaskState::Running {
            return Err(format!("Cannot pause task in state {}", self.state.as_str()));
        }
        self.transition_to(TaskState::Paused)
    }

    /// Resume a paused task back to `pending`. The agent must pick it up
    /// again so it re-syncs cracks before producing more work.
    pub fn resume(&mut self) -> Result<(), String> {
        if self.state != TaskState::Paused {
            return Err(format!("Cannot resume task in state {}", self.state.as_str()));
        }
        self.transition_to(TaskState::Pending)
    }

    /// User cancellation: `{pending, running} → failed`.
    pub fn cancel(&mut self) -> Result<(), String> {
        if !matches!(self.state, TaskState::Pending | TaskState::Running) {
            return Err(format!("Cannot cancel task in state {}", self.state.as_str()));
        }
        self.transition_to(TaskState::Failed)
    }

    /// User retry: `failed → pending`. Increments the retry counter and
    /// clears the recorded error.
    pub fn retry(&mut self) -> Result<(), String> {
        if self.state != TaskState::Failed {
            return Err(format!("Cannot retry task in state {}", self.state.as_str()));
        }
        self.transition_to(TaskState::Pending)?;
        self.retry_count += 1;
        self.last_error = None;
        Ok(())
    }

    /// Rebind the task to a different agent while incomplete or failed.
    /// A running task passes through pause/resume so it lands in `pending`
    /// and the new agent re-syncs cracks on pickup.
    pub fn reassign(&mut self, new_agent: Uuid) -> Result<(), String> {
        match self.state {
            TaskState::Running => {
                self.pause()?;
                self.resume()?;
            }
            TaskState::Paused | TaskState::Failed => {
                self.transition_to(TaskState::Pending)?;
            }
            TaskState::Pending => {
                self.updated_at = Utc::now();
                self.version += 1;
            }
            other => {
                return Err(format!("Cannot reassign task in state {}", other.as_str()));
            }
        }
        self.agent_id = Some(new_agent);
        self.stale = true;
        Ok(())
    }

    /// Scheduler preemption: `running → pending`, counted, staled, unbound.
    /// `progress` is the fractional progress from the latest status frame.
    pub fn preempt(&mut self, progress: f64) -> Result<(), String> {
        if !self.is_preemptable(progress) {
            return Err(format!(
                "Task not preemptable (state {}, preemptions {}, progress {progress:.2})",
                self.state.as_str(),
                self.preemption_count
            ));
        }
        self.transition_to(TaskState::Pending)?;
        self.preemption_count += 1;
        self.stale = true;
        self.agent_id = None;
        Ok(())
    }

    /// Agent reports success or 100 % progress: `running → completed`.
    pub fn complete(&mut self) -> Result<(), String> {
        if self.state != TaskState::Running {
            return Err(format!("Cannot complete task in state {}", self.state.as_str()));
        }
        self.transition_to(TaskState::Completed)
    }

    /// Agent reports exhausted keyspace: `running → exhausted`.
    pub fn exhaust(&mut self) -> Result<(), String> {
        if self.state != TaskState::Running {
            return Err(format!("Cannot exhaust task in state {}", self.state.as_str()));
        }
        self.transition_to(TaskState::Exhausted)
    }

    /// Destroy-path transition used when the owning attack is abandoned.
    pub fn abandon(&mut self) -> Result<(), String> {
        if self.state.is_terminal() {
            return Err(format!("Cannot abandon task in state {}", self.state.as_str()));
        }
        self.transition_to(TaskState::Abandoned)
    }

    /// A task is incomplete while pending, running, or paused.
    pub fn is_incomplete(&self) -> bool {
        self.state.is_incomplete()
    }

    /// Preemptable: running, below the pin count, and under the progress
    /// cutoff. Exactly 0.90 progress is already protected.
    pub fn is_preemptable(&self, progress: f64) -> bool {
        self.state == TaskState::Running
            && self.preemption_count < PREEMPTION_PIN_COUNT
            && progress < PREEMPTION_PROGRESS_CUTOFF
    }

    /// Advance the activity timestamp, never moving it backwards.
    pub fn touch_activity(&mut self, at: DateTime<Utc>) {
        match self.activity_timestamp {
            Some(existing) if existing >= at => {}
            _ => self.activity_timestamp = Some(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(Uuid::new_v4(), Uuid::new_v4())
    }

    fn running_task() -> Task {
        let mut t = task();
        t.accept().unwrap();
        t
    }

    #[test]
    fn test_accept_sets_started_at() {
        let mut t = task();
        assert!(t.started_at.is_none());
        t.accept().unwrap();
        assert_eq!(t.state, TaskState::Running);
        assert!(t.started_at.is_some());
    }

    #[test]
    fn test_pause_preserves_agent() {
        let mut t = running_task();
        let agent = t.agent_id;
        t.pause().unwrap();
        assert_eq!(t.state, TaskState::Paused);
        assert_eq!(t.agent_id, agent);
    }

    #[test]
    fn test_resume_goes_to_pending_not_running() {
        let mut t = running_task();
        t.pause().unwrap();
        t.resume().unwrap();
        assert_eq!(t.state, TaskState::Pending);
    }

    #[test]
    fn test_cancel_from_pending_and_running() {
        let mut pending = task();
        pending.cancel().unwrap();
        assert_eq!(pending.state, TaskState::Failed);

        let mut running = running_task();
        running.cancel().unwrap();
        assert_eq!(running.state, TaskState::Failed);

        let mut paused = running_task();
        paused.pause().unwrap();
        assert!(paused.cancel().is_err());
    }

    #[test]
    fn test_retry_increments_and_clears_error() {
        let mut t = running_task();
        t.last_error = Some("gpu fell off the bus".to_string());
        t.cancel().unwrap();

        t.retry().unwrap();
        assert_eq!(t.state, TaskState::Pending);
        assert_eq!(t.retry_count, 1);
        assert!(t.last_error.is_none());
    }

    #[test]
    fn test_preempt_effects() {
        let mut t = running_task();
        t.preempt(0.25).unwrap();
        assert_eq!(t.state, TaskState::Pending);
        assert_eq!(t.preemption_count, 1);
        assert!(t.stale);
        assert!(t.agent_id.is_none());
    }

    #[test]
    fn test_preemption_pin_cap() {
        let mut t = running_task();
        t.preempt(0.1).unwrap();

        // Pick the task back up and preempt a second time.
        t.agent_id = Some(Uuid::new_v4());
        t.accept().unwrap();
        t.preempt(0.1).unwrap();
        assert_eq!(t.preemption_count, 2);

        // Third preemption is pinned out.
        t.agent_id = Some(Uuid::new_v4());
        t.accept().unwrap();
        assert!(!t.is_preemptable(0.1));
        assert!(t.preempt(0.1).is_err());
    }

    #[test]
    fn test_progress_cutoff_boundary() {
        let t = running_task();
        assert!(t.is_preemptable(0.8999));
        assert!(!t.is_preemptable(0.90));
        assert!(!t.is_preemptable(0.95));
    }

    #[test]
    fn test_reassign_running_lands_pending_and_stale() {
        let mut t = running_task();
        let new_agent = Uuid::new_v4();
        t.reassign(new_agent).unwrap();
        assert_eq!(t.state, TaskState::Pending);
        assert_eq!(t.agent_id, Some(new_agent));
        assert!(t.stale);
    }

    #[test]
    fn test_reassign_rejected_when_terminal() {
        let mut t = running_task();
        t.complete().unwrap();
        assert!(t.reassign(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_terminal_states_are_frozen() {
        let mut t = running_task();
        t.exhaust().unwrap();
        assert!(t.accept().is_err());
        assert!(t.pause().is_err());
        assert!(t.cancel().is_err());
        assert!(t.abandon().is_err());
    }

    #[test]
    fn test_abandon_from_each_incomplete_state() {
        let mut pending = task();
        assert!(pending.abandon().is_ok());

        let mut running = running_task();
        assert!(running.abandon().is_ok());

        let mut paused = running_task();
        paused.pause().unwrap();
        assert!(paused.abandon().is_ok());

        let mut failed = running_task();
        failed.cancel().unwrap();
        assert!(failed.abandon().is_ok());
    }

    #[test]
    fn test_activity_timestamp_is_monotonic() {
        let mut t = task();
        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(30);

        t.touch_activity(later);
        t.touch_activity(earlier);
        assert_eq!(t.activity_timestamp, Some(later));
    }

    #[test]
    fn test_version_bumps_on_transition() {
        let mut t = task();
        let v = t.version;
        t.accept().unwrap();
        assert_eq!(t.version, v + 1);
        t.pause().unwrap();
        assert_eq!(t.version, v + 2);
    }
}
