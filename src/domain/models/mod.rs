//! Domain models for the CipherSwarm scheduling core.

pub mod agent;
pub mod attack;
pub mod benchmark;
pub mod campaign;
pub mod config;
pub mod hash_list;
pub mod project;
pub mod resource;
pub mod status;
pub mod task;

pub use agent::{
    AdvancedConfiguration, Agent, AgentError, AgentState, DeviceInfo, ErrorSeverity,
    DEFAULT_UPDATE_INTERVAL_SECS, FATAL_ERRORS_BEFORE_ERROR_STATE, HEARTBEAT_GRACE_SECS,
};
pub use attack::{Attack, AttackMode, AttackState};
pub use benchmark::{HashcatBenchmark, MIN_PERFORMANCE_BENCHMARK};
pub use campaign::{Caller, Campaign, CampaignPriority};
pub use config::Config;
pub use hash_list::{HashItem, HashList, HashType};
pub use project::Project;
pub use resource::{ResourceFile, ResourceKind};
pub use status::{DeviceStatus, HashcatGuess, HashcatStatus, StatusFrame};
pub use task::{Task, TaskState, PREEMPTION_PIN_COUNT, PREEMPTION_PROGRESS_CUTOFF};
