//! Broadcast bus the location screens use to tell each other about writes.
//!
//! One [`EventBus`] is shared via `Arc` by every screen of a console
//! process. Delivery is best effort: a receiver that falls more than the
//! channel capacity behind sees `RecvError::Lagged` and should resync.

use chrono::{DateTime, Utc};
use isp_core::hierarchy::NodeRef;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event names exchanged on the bus.
pub mod event_types {
    /// Some writer outside the hierarchy screen changed location records
    /// (a sibling screen renamed a city, an import ran). Listeners rebuild.
    pub const LOCATIONS_UPDATED: &str = "locations.updated";

    pub const LOCATION_CREATED: &str = "location.created";
    pub const LOCATION_UPDATED: &str = "location.updated";

    /// Payload: `{ "cascade": bool, "impact": ImpactSummary }`.
    pub const LOCATION_DELETED: &str = "location.deleted";
}

/// A change notification about the location hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleEvent {
    /// One of [`event_types`].
    pub event_type: String,
    /// The node the event is about, when it concerns a single node.
    pub node: Option<NodeRef>,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

impl ConsoleEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            node: None,
            payload: serde_json::Value::Object(Default::default()),
            emitted_at: Utc::now(),
        }
    }

    pub fn with_node(mut self, node: NodeRef) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn is(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }
}

/// Buffered events per receiver before the slowest one starts lagging.
const DEFAULT_CAPACITY: usize = 256;

/// Fan-out bus over a [`broadcast`] channel.
///
/// ```rust
/// use isp_events::{event_types, ConsoleEvent, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
/// bus.publish(ConsoleEvent::new(event_types::LOCATIONS_UPDATED));
/// assert!(rx.try_recv().is_ok());
/// ```
pub struct EventBus {
    sender: broadcast::Sender<ConsoleEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send to every current subscriber. Returns how many received it.
    pub fn publish(&self, event: ConsoleEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(event_type = %event.event_type, "No subscribers for event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
