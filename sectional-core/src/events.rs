//! Hydration lifecycle events and their publish/subscribe bus.
//!
//! Every call produces `loading-start`, then exactly one of `loading-success`
//! or `loading-error`, then `loading-end`. The bus owned by the hydrator is
//! the only place these are published.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use tokio::sync::mpsc;

use crate::errors::HydrationError;

/// Payload shared by all lifecycle events of one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetail {
    /// Per-hydrator call number, increasing from 1
    pub call_id: u64,
    /// Page URL as given by the caller
    pub url: String,
    /// Section being hydrated
    pub section_id: String,
    /// Requested slot ids
    pub slots: Vec<String>,
}

/// Lifecycle event broadcast by the hydrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum HydrationEvent {
    /// A call started; the hydrator is loading.
    #[serde(rename = "section:loading-start")]
    LoadingStart {
        /// Call payload
        #[serde(flatten)]
        detail: EventDetail,
    },
    /// The section was fetched and its slots applied.
    #[serde(rename = "section:loading-success")]
    LoadingSuccess {
        /// Call payload
        #[serde(flatten)]
        detail: EventDetail,
    },
    /// The call failed; nothing after the failure point was applied.
    #[serde(rename = "section:loading-error")]
    LoadingError {
        /// Call payload
        #[serde(flatten)]
        detail: EventDetail,
        /// What went wrong
        #[serde(serialize_with = "serialize_error")]
        error: HydrationError,
    },
    /// The call finished, successfully or not.
    #[serde(rename = "section:loading-end")]
    LoadingEnd {
        /// Call payload
        #[serde(flatten)]
        detail: EventDetail,
    },
}

impl HydrationEvent {
    /// Event name as seen by page scripts, e.g. `section:loading-start`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadingStart { .. } => "section:loading-start",
            Self::LoadingSuccess { .. } => "section:loading-success",
            Self::LoadingError { .. } => "section:loading-error",
            Self::LoadingEnd { .. } => "section:loading-end",
        }
    }

    /// Payload of the call that produced this event.
    pub fn detail(&self) -> &EventDetail {
        match self {
            Self::LoadingStart { detail }
            | Self::LoadingSuccess { detail }
            | Self::LoadingError { detail, .. }
            | Self::LoadingEnd { detail } => detail,
        }
    }

    /// True for `loading-success` and `loading-error`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::LoadingSuccess { .. } | Self::LoadingError { .. }
        )
    }
}

fn serialize_error<S: Serializer>(error: &HydrationError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Synchronous observer called inline for every published event.
///
/// Observers run on the publishing task; keep them short.
pub trait HydrationObserver: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: &HydrationEvent);
}

impl<F> HydrationObserver for F
where
    F: Fn(&HydrationEvent) + Send + Sync,
{
    fn on_event(&self, event: &HydrationEvent) {
        self(event)
    }
}

/// Channel end held by the bus for one subscriber.
enum Subscriber {
    Unbounded(mpsc::UnboundedSender<HydrationEvent>),
    Bounded(mpsc::Sender<HydrationEvent>),
}

impl Subscriber {
    /// Returns false once the receiver is gone.
    fn deliver(&self, event: &HydrationEvent) -> bool {
        match self {
            Self::Unbounded(tx) => tx.send(event.clone()).is_ok(),
            Self::Bounded(tx) => match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(event)) => {
                    tracing::warn!(
                        event = event.name(),
                        call_id = event.detail().call_id,
                        "Subscriber queue full, dropping event"
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            },
        }
    }
}

/// Publish/subscribe bus for hydration events.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    observers: Mutex<Vec<Arc<dyn HydrationObserver>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.lock().len())
            .field("observers", &self.observers.lock().len())
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a receiver for every event published from now on.
    ///
    /// Dropping the receiver unsubscribes it at the next publish. The queue
    /// is unbounded: a receiver that is kept but never drained grows for the
    /// life of the bus. Use [`EventBus::subscribe_bounded`] for long-lived
    /// listeners that may fall behind.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<HydrationEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(Subscriber::Unbounded(tx));
        rx
    }

    /// Like [`EventBus::subscribe`], but holds at most `capacity` undelivered
    /// events. Events published while the queue is full are dropped for this
    /// receiver only.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn subscribe_bounded(&self, capacity: usize) -> mpsc::Receiver<HydrationEvent> {
        let (tx, rx) = mpsc::channel(capacity);
        self.subscribers.lock().push(Subscriber::Bounded(tx));
        rx
    }

    /// Registers a synchronous observer for the lifetime of the bus.
    pub fn observe(&self, observer: Arc<dyn HydrationObserver>) {
        self.observers.lock().push(observer);
    }

    /// Delivers `event` to every observer, then to every live subscriber.
    pub fn publish(&self, event: HydrationEvent) {
        tracing::trace!(event = event.name(), call_id = event.detail().call_id, "Publishing");

        // Clone out so observers may touch the bus without deadlocking
        let observers: Vec<_> = self.observers.lock().clone();
        for observer in observers {
            observer.on_event(&event);
        }

        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.deliver(&event));
    }

    /// Number of channel subscribers still attached.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail() -> EventDetail {
        EventDetail {
            call_id: 7,
            url: "/collections/all?page=2".to_string(),
            section_id: "main-collection".to_string(),
            slots: vec!["ProductGridContainer".to_string()],
        }
    }

    #[test]
    fn test_event_serializes_with_dom_event_name() {
        let event = HydrationEvent::LoadingStart { detail: detail() };

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "section:loading-start",
                "callId": 7,
                "url": "/collections/all?page=2",
                "sectionId": "main-collection",
                "slots": ["ProductGridContainer"],
            })
        );
    }

    #[test]
    fn test_error_event_serializes_error_message() {
        let event = HydrationEvent::LoadingError {
            detail: detail(),
            error: HydrationError::http_status(500),
        };

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "section:loading-error");
        assert_eq!(json["error"], "Network error: HTTP error! status: 500");
        assert_eq!(event.name(), "section:loading-error");
        assert!(event.is_terminal());
    }

    #[tokio::test]
    async fn test_subscribers_receive_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(HydrationEvent::LoadingStart { detail: detail() });
        bus.publish(HydrationEvent::LoadingEnd { detail: detail() });

        assert_eq!(rx.recv().await.unwrap().name(), "section:loading-start");
        assert_eq!(rx.recv().await.unwrap().name(), "section:loading-end");
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let _kept = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx);
        bus.publish(HydrationEvent::LoadingEnd { detail: detail() });

        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_bounded_subscriber_drops_overflow_but_stays_attached() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_bounded(2);

        bus.publish(HydrationEvent::LoadingStart { detail: detail() });
        bus.publish(HydrationEvent::LoadingSuccess { detail: detail() });
        bus.publish(HydrationEvent::LoadingEnd { detail: detail() });

        assert_eq!(rx.try_recv().unwrap().name(), "section:loading-start");
        assert_eq!(rx.try_recv().unwrap().name(), "section:loading-success");
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(HydrationEvent::LoadingEnd { detail: detail() });
        assert_eq!(rx.try_recv().unwrap().name(), "section:loading-end");

        drop(rx);
        bus.publish(HydrationEvent::LoadingEnd { detail: detail() });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_observer_may_subscribe_during_publish() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let observer_bus = Arc::clone(&bus);
        let observer_seen = Arc::clone(&seen);
        bus.observe(Arc::new(move |event: &HydrationEvent| {
            observer_seen.lock().push(event.name());
            let _late = observer_bus.subscribe();
        }));

        bus.publish(HydrationEvent::LoadingStart { detail: detail() });

        assert_eq!(*seen.lock(), vec!["section:loading-start"]);
    }
}
