use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use vehiclelink_frame::MessageType;

use crate::event::DomainEvent;

/// Why a link went down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect()` was called.
    Requested,
    /// The port reached end of stream.
    Closed,
    /// The port failed with an I/O error.
    PortError(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Requested => f.write_str("requested"),
            DisconnectReason::Closed => f.write_str("closed"),
            DisconnectReason::PortError(err) => write!(f, "port error: {err}"),
        }
    }
}

/// Everything the link publishes to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkNotification {
    /// A decoded vehicle event.
    Event(DomainEvent),
    /// A frame with an unknown message type, or an EVENT with an unknown id.
    Unrecognized {
        message_type: MessageType,
        payload: Bytes,
    },
    /// No valid frame within the silence threshold. Advisory only.
    ConnectionLost { silent_for: Duration },
    /// The link is down.
    Disconnected { reason: DisconnectReason },
}

pub const UNRECOGNIZED: &str = "unrecognized";
pub const CONNECTION_LOST: &str = "connection-lost";
pub const DISCONNECTED: &str = "disconnected";

impl LinkNotification {
    /// Topic name: the event name for events, otherwise a fixed name.
    pub fn name(&self) -> &'static str {
        match self {
            LinkNotification::Event(event) => event.name(),
            LinkNotification::Unrecognized { .. } => UNRECOGNIZED,
            LinkNotification::ConnectionLost { .. } => CONNECTION_LOST,
            LinkNotification::Disconnected { .. } => DISCONNECTED,
        }
    }
}

/// What a subscriber listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// Every notification (`*`).
    All,
    /// Notifications with this name.
    Named(String),
}

impl Topic {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Topic::All => true,
            Topic::Named(topic) => topic == name,
        }
    }
}

impl From<&str> for Topic {
    fn from(value: &str) -> Self {
        if value == "*" {
            Topic::All
        } else {
            Topic::Named(value.to_string())
        }
    }
}

impl From<String> for Topic {
    fn from(value: String) -> Self {
        Topic::from(value.as_str())
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::All => f.write_str("*"),
            Topic::Named(name) => f.write_str(name),
        }
    }
}

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Handler = Arc<dyn Fn(&LinkNotification) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    topic: Topic,
    handler: Handler,
}

/// Subscription registry.
///
/// Handlers run synchronously on the publishing task, in subscription order.
/// A handler may subscribe or unsubscribe; the change applies from the next
/// publish.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, topic: impl Into<Topic>, handler: F) -> SubscriptionId
    where
        F: Fn(&LinkNotification) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscriber {
            id,
            topic: topic.into(),
            handler: Arc::new(handler),
        });
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|sub| sub.id != id);
        subscribers.len() != before
    }

    /// Deliver to every matching subscriber. Returns the number of handlers run.
    pub fn publish(&self, notification: &LinkNotification) -> usize {
        let name = notification.name();
        let handlers: Vec<Handler> = self
            .lock()
            .iter()
            .filter(|sub| sub.topic.matches(name))
            .map(|sub| Arc::clone(&sub.handler))
            .collect();
        for handler in &handlers {
            handler(notification);
        }
        handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}
