//! Agent domain model.
//!
//! Agents are the workers running hashcat. The server tracks their project
//! memberships, lifecycle state, reported devices, and the errors they
//! attribute to themselves or their tasks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Seconds between agent status updates when not overridden per agent.
pub const DEFAULT_UPDATE_INTERVAL_SECS: i64 = 30;

/// Extra slack added to the heartbeat deadline before an agent is declared
/// offline.
pub const HEARTBEAT_GRACE_SECS: i64 = 15;

/// Fatal errors inside the lookback window before an agent is moved to
/// `error`.
pub const FATAL_ERRORS_BEFORE_ERROR_STATE: i64 = 3;

/// State of an agent in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    /// Registered, no successful benchmark yet
    Pending,
    /// Benchmarked and eligible for assignment
    Active,
    /// Heartbeat lost or voluntarily shut down
    Offline,
    /// Disabled after repeated fatal errors
    Error,
}

impl Default for AgentState {
    fn default() -> Self {
        Self::Pending
    }
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Offline => "offline",
            Self::Error => "error",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "offline" => Some(Self::Offline),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Valid transitions from this state. `Error` is reachable from
    /// anywhere via [`Agent::mark_errored`].
    pub fn valid_transitions(&self) -> &'static [AgentState] {
        match self {
            Self::Pending => &[Self::Active, Self::Error],
            Self::Active => &[Self::Offline, Self::Error],
            Self::Offline => &[Self::Active, Self::Error],
            Self::Error => &[],
        }
    }

    pub fn can_transition_to(&self, new_state: Self) -> bool {
        self.valid_transitions().contains(&new_state)
    }
}

/// A compute device reported by the agent at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Hashcat device id
    pub device_id: i64,
    /// Vendor device name
    pub name: String,
    /// "gpu" or "cpu"
    pub device_type: String,
}

/// Per-agent tuning knobs set by an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvancedConfiguration {
    /// Seconds between status updates
    pub update_interval_secs: i64,
    /// Use a natively installed hashcat instead of the bundled build
    pub use_native_hashcat: bool,
    /// Restrict execution to these device ids; empty means all
    pub backend_devices: Vec<i64>,
}

impl Default for AdvancedConfiguration {
    fn default() -> Self {
        Self {
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            use_native_hashcat: false,
            backend_devices: Vec::new(),
        }
    }
}

/// A worker that executes tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier
    pub id: Uuid,
    /// Owning user
    pub user_name: String,
    /// Reported host name
    pub host_name: String,
    /// Projects this agent may take work from
    pub project_ids: Vec<Uuid>,
    /// Current lifecycle state
    pub state: AgentState,
    /// Operator has vouched for this agent
    pub trusted: bool,
    /// Reported operating system
    pub operating_system: Option<String>,
    /// Source address of the last authenticated request
    pub last_ipaddress: Option<String>,
    /// Last time any authenticated request arrived
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Devices reported at registration, in hashcat order
    pub devices: Vec<DeviceInfo>,
    /// Optional per-agent tuning
    pub advanced_configuration: Option<AdvancedConfiguration>,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Register a new agent in `Pending`.
    pub fn new(user_name: impl Into<String>, host_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_name: user_name.into(),
            host_name: host_name.into(),
            project_ids: Vec::new(),
            state: AgentState::default(),
            trusted: false,
            operating_system: None,
            last_ipaddress: None,
            last_seen_at: None,
            devices: Vec::new(),
            advanced_configuration: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Grant membership in a project (builder form).
    pub fn with_project(mut self, project_id: Uuid) -> Self {
        if !self.project_ids.contains(&project_id) {
            self.project_ids.push(project_id);
        }
        self
    }

    fn transition_to(&mut self, new_state: AgentState) -> Result<(), String> {
        if !self.state.can_transition_to(new_state) {
            return Err(format!(
                "Cannot transition agent from {} to {}",
                self.state.as_str(),
                new_state.as_str()
            ));
        }
        self.state = new_state;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// First successful benchmark: `pending → active`.
    pub fn activate(&mut self) -> Result<(), String> {
        if self.state == AgentState::Active {
            return Ok(());
        }
        self.transition_to(AgentState::Active)
    }

    /// Heartbeat loss or voluntary shutdown: `active → offline`.
    pub fn go_offline(&mut self) -> Result<(), String> {
        if self.state != AgentState::Active {
            return Err(format!(
                "Cannot take agent offline from {}",
                self.state.as_str()
            ));
        }
        self.transition_to(AgentState::Offline)
    }

    /// Next authenticated pickup after being offline: `offline → active`.
    pub fn recover(&mut self) -> Result<(), String> {
        if self.state != AgentState::Offline {
            return Err(format!("Cannot recover agent from {}", self.state.as_str()));
        }
        self.transition_to(AgentState::Active)
    }

    /// Repeated fatal errors: any state → `error`. Terminal.
    pub fn mark_errored(&mut self) {
        self.state = AgentState::Error;
        self.updated_at = Utc::now();
    }

    /// Effective seconds between status updates for this agent.
    pub fn update_interval_secs(&self) -> i64 {
        self.advanced_configuration
            .as_ref()
            .map_or(DEFAULT_UPDATE_INTERVAL_SECS, |c| c.update_interval_secs)
    }

    /// The instant after which a silent agent counts as having lost its
    /// heartbeat: three missed update intervals plus a grace period.
    pub fn heartbeat_deadline(&self) -> Option<DateTime<Utc>> {
        self.last_seen_at.map(|seen| {
            seen + Duration::seconds(self.update_interval_secs() * 3 + HEARTBEAT_GRACE_SECS)
        })
    }

    /// Whether the heartbeat deadline has passed as of `now`.
    pub fn heartbeat_lost(&self, now: DateTime<Utc>) -> bool {
        self.state == AgentState::Active
            && self.heartbeat_deadline().is_some_and(|deadline| now > deadline)
    }

    /// Record an authenticated request from the agent.
    pub fn touch_seen(&mut self, at: DateTime<Utc>, ipaddress: Option<String>) {
        self.last_seen_at = Some(at);
        if let Some(ip) = ipaddress {
            self.last_ipaddress = Some(ip);
        }
        self.updated_at = Utc::now();
    }
}

/// Severity of an incident attributed to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    Info = 0,
    Warning = 1,
    Major = 2,
    Fatal = 3,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Major => "major",
            Self::Fatal => "fatal",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "major" => Some(Self::Major),
            "fatal" => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Only fatal errors block reassignment of the same task to the agent.
    pub fn blocks_reassignment(&self) -> bool {
        matches!(self, Self::Fatal)
    }
}

/// An incident attributable to an agent and optionally one of its tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentError {
    /// Unique identifier
    pub id: Uuid,
    /// Agent that reported or caused the incident
    pub agent_id: Uuid,
    /// Task involved, when attributable
    pub task_id: Option<Uuid>,
    /// Incident severity
    pub severity: ErrorSeverity,
    /// Human-readable message
    pub message: String,
    /// Bounded structured context
    pub metadata: Option<serde_json::Value>,
    /// When recorded
    pub created_at: DateTime<Utc>,
}

impl AgentError {
    pub fn new(agent_id: Uuid, severity: ErrorSeverity, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            task_id: None,
            severity,
            message: message.into(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the task the incident happened on.
    pub fn with_task(mut self, task_id: Uuid) -> Self {
        self.task_id = Some(task_id);
        self
    }

    /// Attach structured context.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent() -> Agent {
        Agent::new("operator", "rig-01")
    }

    #[test]
    fn test_lifecycle_cycle() {
        let mut a = agent();
        assert_eq!(a.state, AgentState::Pending);

        a.activate().unwrap();
        a.go_offline().unwrap();
        a.recover().unwrap();
        assert_eq!(a.state, AgentState::Active);
    }

    #[test]
    fn test_activate_is_idempotent() {
        let mut a = agent();
        a.activate().unwrap();
        assert!(a.activate().is_ok());
        assert_eq!(a.state, AgentState::Active);
    }

    #[test]
    fn test_pending_cannot_go_offline() {
        let mut a = agent();
        assert!(a.go_offline().is_err());
    }

    #[test]
    fn test_error_state_is_terminal() {
        let mut a = agent();
        a.mark_errored();
        assert!(a.activate().is_err());
        assert!(a.recover().is_err());
    }

    #[test]
    fn test_heartbeat_deadline_uses_update_interval() {
        let mut a = agent();
        a.activate().unwrap();
        let seen = Utc::now();
        a.last_seen_at = Some(seen);

        let expected = seen
            + Duration::seconds(DEFAULT_UPDATE_INTERVAL_SECS * 3 + HEARTBEAT_GRACE_SECS);
        assert_eq!(a.heartbeat_deadline(), Some(expected));

        // Custom interval shrinks the window.
        a.advanced_configuration = Some(AdvancedConfiguration {
            update_interval_secs: 5,
            ..AdvancedConfiguration::default()
        });
        let expected = seen + Duration::seconds(5 * 3 + HEARTBEAT_GRACE_SECS);
        assert_eq!(a.heartbeat_deadline(), Some(expected));
    }

    #[test]
    fn test_heartbeat_lost_detection() {
        let mut a = agent();
        a.activate().unwrap();
        let long_ago = Utc::now() - Duration::hours(1);
        a.last_seen_at = Some(long_ago);
        assert!(a.heartbeat_lost(Utc::now()));

        a.last_seen_at = Some(Utc::now());
        assert!(!a.heartbeat_lost(Utc::now()));

        // An agent never seen cannot lose a heartbeat.
        a.last_seen_at = None;
        assert!(!a.heartbeat_lost(Utc::now()));
    }

    #[test]
    fn test_only_fatal_blocks_reassignment() {
        assert!(!ErrorSeverity::Info.blocks_reassignment());
        assert!(!ErrorSeverity::Warning.blocks_reassignment());
        assert!(!ErrorSeverity::Major.blocks_reassignment());
        assert!(ErrorSeverity::Fatal.blocks_reassignment());
    }
}
