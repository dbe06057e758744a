//! Session event fan-out.
//!
//! The registry never talks to observers directly. It pushes
//! [`SessionEvent`]s into an internal channel; a dispatcher task drains that
//! channel into the [`EventBus`], which keeps one bounded delivery channel
//! per subscriber.
//!
//! # Example
//!
//! ```rust
//! use nexus_core::event_bus::{EventBus, SessionEvent};
//! use nexus_core::session::SessionKey;
//!
//! let bus = EventBus::new();
//! let mut subscription = bus.subscribe();
//!
//! bus.publish(SessionEvent::SessionEvicted {
//!     session_id: SessionKey::new("abc"),
//! });
//!
//! assert!(subscription.try_recv().is_ok());
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{
    self,
    error::{TryRecvError, TrySendError},
};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::mission::{AgentRole, MissionRank};
use crate::session::{Alert, Session, SessionKey};

/// A state change observers care about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        session_id: SessionKey,
        team_name: String,
        agent_role: AgentRole,
    },
    #[serde(rename = "session_update")]
    SessionUpdated {
        session_id: SessionKey,
        data: Session,
        alerts: Vec<Alert>,
    },
    SessionCompleted {
        session_id: SessionKey,
        team_name: String,
        final_score: f64,
        rank: MissionRank,
    },
    SessionEvicted {
        session_id: SessionKey,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &SessionKey {
        match self {
            SessionEvent::SessionStarted { session_id, .. }
            | SessionEvent::SessionUpdated { session_id, .. }
            | SessionEvent::SessionCompleted { session_id, .. }
            | SessionEvent::SessionEvicted { session_id } => session_id,
        }
    }
}

/// Sending half of the registry's internal event channel.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Unique identifier for an event subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub String);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events a subscriber may have queued before it is dropped as stalled.
pub const DEFAULT_CAPACITY: usize = 1024;

type SubscriberMap = HashMap<SubscriberId, mpsc::Sender<SessionEvent>>;

/// A subscriber's end of its delivery channel.
///
/// Dropping it is enough to unsubscribe; the bus notices on the next publish.
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<SessionEvent>,
}

impl Subscription {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Wait for the next event. `None` once the bus has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<SessionEvent, TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Dynamic set of subscribers, each with its own bounded channel.
pub struct EventBus {
    subscribers: Mutex<SubscriberMap>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A bus whose subscribers may each queue at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn subscribers(&self) -> MutexGuard<'_, SubscriberMap> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = SubscriberId::new();
        self.subscribers().insert(id.clone(), sender);
        Subscription { id, receiver }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: &SubscriberId) -> bool {
        self.subscribers().remove(id).is_some()
    }

    /// Deliver `event` to every live subscriber and prune the rest.
    ///
    /// Returns the number of subscribers that received the event. The set's
    /// lock is held for the whole round, so concurrent publishers are
    /// serialized and every subscriber sees the same publish order. Sends
    /// never wait: a subscriber whose queue is full has stopped reading and
    /// is dropped, which ends its stream once it drains what is queued.
    pub fn publish(&self, event: SessionEvent) -> usize {
        let mut delivered = 0;
        let mut subscribers = self.subscribers();
        subscribers.retain(|id, sender| match sender.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                log::warn!(
                    "Subscriber {} lagged behind by {} events; dropping it",
                    id,
                    self.capacity
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("Dropping disconnected subscriber {}", id);
                false
            }
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward everything from the registry's channel into `bus` until every
/// sender is dropped.
pub fn spawn_dispatcher(mut events: EventReceiver, bus: Arc<EventBus>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let session_id = event.session_id().clone();
            let delivered = bus.publish(event);
            log::trace!("Event for {} delivered to {} subscribers", session_id, delivered);
        }
        log::debug!("Event dispatcher stopped: registry channel closed");
    })
}

// ============================================================================
// TESTS
// ============================================================================
