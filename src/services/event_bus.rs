//! Event bus for lifecycle records.
//!
//! Services never push to the UI themselves: every lifecycle record is
//! published here with a sequence number, and the transport layer decides
//! how to deliver it by subscribing. A bus with no subscribers drops
//! events silently; that is the normal state for tests and the CLI.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Default broadcast channel capacity. Slow subscribers past this lag are
/// dropped by the channel, not by the publisher.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// One emitted lifecycle record.
///
/// The same record backs both delivery surfaces: the structured log line
/// and the subscriber broadcast.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleEvent {
    /// Unique identifier
    pub id: Uuid,
    /// Monotonically increasing publish order, assigned by the bus
    pub sequence: u64,
    /// When emitted
    pub timestamp: DateTime<Utc>,
    /// Event name ("preempt", "crack_recorded", "heartbeat_lost", …)
    pub event: String,
    pub task_id: Option<Uuid>,
    pub agent_id: Option<Uuid>,
    pub attack_id: Option<Uuid>,
    pub campaign_id: Option<Uuid>,
    /// Source state for transitions
    pub from: Option<String>,
    /// Target state for transitions
    pub to: Option<String>,
    /// Bounded structured context
    pub context: Value,
}

/// Broadcast bus carrying [`LifecycleEvent`]s to transport subscribers.
pub struct EventBus {
    sender: broadcast::Sender<LifecycleEvent>,
    sequence: AtomicU64,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Open a subscription. Events published before this call are not
    /// replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Assign the next sequence number and broadcast the event. Returns
    /// the number of subscribers reached; publishing with no subscribers
    /// is not an error. A send failure with live subscribers is.
    pub fn publish(&self, event: &mut LifecycleEvent) -> Result<usize, String> {
        event.sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        if self.sender.receiver_count() == 0 {
            return Ok(0);
        }
        self.sender
            .send(event.clone())
            .map_err(|e| e.to_string())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: &str) -> LifecycleEvent {
        LifecycleEvent {
            id: Uuid::new_v4(),
            sequence: 0,
            timestamp: Utc::now(),
            event: name.to_string(),
            task_id: None,
            agent_id: None,
            attack_id: None,
            campaign_id: None,
            from: None,
            to: None,
            context: json!({}),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let bus = EventBus::default();
        let mut record = event("run");
        assert_eq!(bus.publish(&mut record).unwrap(), 0);
        assert_eq!(record.sequence, 1);
    }

    #[tokio::test]
    async fn test_subscriber_receives_sequenced_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        for name in ["run", "preempt", "complete"] {
            bus.publish(&mut event(name)).unwrap();
        }

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        let third = rx.try_recv().unwrap();
        assert_eq!(first.event, "run");
        assert_eq!(second.event, "preempt");
        assert_eq!(third.event, "complete");
        assert!(first.sequence < second.sequence);
        assert!(second.sequence < third.sequence);
    }

    #[tokio::test]
    async fn test_sequence_survives_subscriber_churn() {
        let bus = EventBus::default();

        let mut before = event("run");
        bus.publish(&mut before).unwrap();

        let rx = bus.subscribe();
        drop(rx);

        let mut after = event("pause");
        bus.publish(&mut after).unwrap();
        assert_eq!(after.sequence, before.sequence + 1);
    }
}
