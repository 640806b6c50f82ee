//! Uniform structured records for lifecycle transitions and API errors.
//!
//! Every scheduling service funnels its state-change records through this
//! one surface: task and attack transitions, agent lifecycle, campaign
//! events, API errors, and data cleanup. Each record carries the involved
//! entity ids, the event name, from/to states when present, and a bounded
//! context map. Records are delivered twice: as a structured log line for
//! operators, and onto the [`EventBus`] for whatever transport subscribes.
//! Every emit returns the record it produced, so callers can hand it
//! further up if their caller wants the event trail.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::services::event_bus::{EventBus, LifecycleEvent};

/// Upper bound on context entries carried by one record.
const MAX_CONTEXT_ENTRIES: usize = 16;

/// Backtraces are cut to this many frames.
const MAX_BACKTRACE_FRAMES: usize = 5;

const TARGET: &str = "cipherswarm::lifecycle";

/// Entity ids attached to a record. Absent ids are omitted from output.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordIds {
    pub task_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub attack_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
}

impl RecordIds {
    pub fn task(task_id: Uuid) -> Self {
        Self {
            task_id: Some(task_id),
            ..Self::default()
        }
    }

    pub fn agent(agent_id: Uuid) -> Self {
        Self {
            agent_id: Some(agent_id),
            ..Self::default()
        }
    }

    pub fn attack(attack_id: Uuid) -> Self {
        Self {
            attack_id: Some(attack_id),
            ..Self::default()
        }
    }

    pub fn campaign(campaign_id: Uuid) -> Self {
        Self {
            campaign_id: Some(campaign_id),
            ..Self::default()
        }
    }

    pub fn with_agent(mut self, agent_id: Uuid) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    pub fn with_attack(mut self, attack_id: Uuid) -> Self {
        self.attack_id = Some(attack_id);
        self
    }

    pub fn with_campaign(mut self, campaign_id: Uuid) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }
}

/// The single emitting surface for lifecycle records.
///
/// Cheap to clone; clones share the underlying bus, so every service
/// wired with the same logger publishes into one subscriber stream.
#[derive(Clone, Default)]
pub struct StateChangeLogger {
    bus: Arc<EventBus>,
}

impl StateChangeLogger {
    /// A logger with its own private bus. Fine for tests and tools that
    /// never subscribe; deployments share one via [`with_bus`](Self::with_bus).
    pub fn new() -> Self {
        Self::default()
    }

    /// A logger publishing onto a shared bus.
    pub fn with_bus(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// The bus this logger publishes to.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// A state-machine transition on any entity.
    pub fn transition(
        &self,
        ids: RecordIds,
        event: &str,
        from: Option<&str>,
        to: Option<&str>,
        context: &[(&str, Value)],
    ) -> LifecycleEvent {
        let record = LifecycleEvent {
            id: Uuid::new_v4(),
            sequence: 0,
            timestamp: Utc::now(),
            event: event.to_string(),
            task_id: ids.task_id,
            agent_id: ids.agent_id,
            attack_id: ids.attack_id,
            campaign_id: ids.campaign_id,
            from: from.map(str::to_string),
            to: to.map(str::to_string),
            context: bounded_context(context),
        };
        self.emit(record)
    }

    /// An event without a from/to pair (pause cascades, priority changes).
    pub fn event(&self, ids: RecordIds, event: &str, context: &[(&str, Value)]) -> LifecycleEvent {
        self.transition(ids, event, None, None, context)
    }

    /// An error surfaced to an API caller. The backtrace, when present, is
    /// truncated to the first five frames and kept off the bus.
    pub fn api_error(&self, endpoint: &str, error: &str, backtrace: Option<&str>) -> LifecycleEvent {
        let backtrace = backtrace.map(truncate_backtrace);
        let mut record = LifecycleEvent {
            id: Uuid::new_v4(),
            sequence: 0,
            timestamp: Utc::now(),
            event: "api_error".to_string(),
            task_id: None,
            agent_id: None,
            attack_id: None,
            campaign_id: None,
            from: None,
            to: None,
            context: json!({ "endpoint": endpoint, "error": error }),
        };
        self.publish(&mut record);

        tracing::warn!(
            target: TARGET,
            event = "api_error",
            sequence = record.sequence,
            endpoint = endpoint,
            error = error,
            backtrace = backtrace,
            "api error"
        );
        record
    }

    /// A data-cleanup sweep. Records with a non-positive affected count
    /// are suppressed entirely.
    pub fn data_cleanup(&self, ids: RecordIds, what: &str, affected: i64) -> Option<LifecycleEvent> {
        if affected <= 0 {
            return None;
        }
        Some(self.event(
            ids,
            "data_cleanup",
            &[("what", json!(what)), ("affected", json!(affected))],
        ))
    }

    /// A failed broadcast to a subscribed consumer.
    pub fn broadcast_error(&self, channel: &str, error: &str) {
        tracing::warn!(
            target: TARGET,
            event = "broadcast_error",
            channel = channel,
            error = error,
            "broadcast error"
        );
    }

    fn emit(&self, mut record: LifecycleEvent) -> LifecycleEvent {
        self.publish(&mut record);

        tracing::info!(
            target: TARGET,
            event = %record.event,
            sequence = record.sequence,
            task_id = record.task_id.map(|id| id.to_string()),
            agent_id = record.agent_id.map(|id| id.to_string()),
            attack_id = record.attack_id.map(|id| id.to_string()),
            campaign_id = record.campaign_id.map(|id| id.to_string()),
            from = record.from.as_deref(),
            to = record.to.as_deref(),
            context = %record.context,
            "state change"
        );
        record
    }

    fn publish(&self, record: &mut LifecycleEvent) {
        if let Err(e) = self.bus.publish(record) {
            self.broadcast_error("lifecycle", &e);
        }
    }
}

fn bounded_context(context: &[(&str, Value)]) -> Value {
    let mut map = serde_json::Map::new();
    for (key, value) in context.iter().take(MAX_CONTEXT_ENTRIES) {
        map.insert((*key).to_string(), value.clone());
    }
    if context.len() > MAX_CONTEXT_ENTRIES {
        map.insert("truncated_entries".to_string(), json!(context.len() - MAX_CONTEXT_ENTRIES));
    }
    Value::Object(map)
}

fn truncate_backtrace(backtrace: &str) -> String {
    backtrace
        .lines()
        .take(MAX_BACKTRACE_FRAMES)
        .collect::<Vec<_>>()
        .join("\n")
}
