//! Ports (trait interfaces) between the domain and its adapters.

pub mod agent_repository;
pub mod attack_repository;
pub mod benchmark_repository;
pub mod campaign_repository;
pub mod hash_list_repository;
pub mod lock_store;
pub mod object_store;
pub mod project_repository;
pub mod resource_repository;
pub mod status_repository;
pub mod task_repository;

pub use agent_repository::AgentRepository;
pub use attack_repository::{AttackCandidate, AttackRepository};
pub use benchmark_repository::BenchmarkRepository;
pub use campaign_repository::CampaignRepository;
pub use hash_list_repository::{CrackRecord, CrackRequest, HashListRepository};
pub use lock_store::LockStore;
pub use object_store::{ObjectMeta, ObjectStore};
pub use project_repository::ProjectRepository;
pub use resource_repository::ResourceRepository;
pub use status_repository::StatusRepository;
pub use task_repository::{PreemptionCandidate, TaskRepository};
