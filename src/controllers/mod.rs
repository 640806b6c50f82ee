//! Thin ingress controllers: request mapping, the error taxonomy,
//! and the agent-facing attack descriptor.

pub mod agent_api;
pub mod descriptor;
pub mod errors;

pub use agent_api::{AgentApi, CrackResponse, StatusResponse, TaskGrant};
pub use descriptor::{AttackDescriptor, DescriptorRenderer, ResourceRef, UncrackedList};
pub use errors::{classify_task_lookup, ApiError, ApiErrorKind, TaskLookupFailure};
