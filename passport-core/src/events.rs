//! Terminal outcome notifications.
//!
//! Every entry point already returns a `Result`; events are an additional feed for hosts that
//! drive UI from a single place. Publishing never blocks: slow broadcast subscribers lag and
//! the host listener is called inline with already-computed values.

use std::sync::Arc;

use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Outcome notifications published by [`crate::Passport`].
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Enum)]
pub enum PassportEvent {
    /// The login handshake completed.
    LoginComplete {
        /// Resolved account address.
        address: String,
    },
    /// The login handshake failed and the session is logged out.
    LoginFailed {
        /// Error description.
        reason: String,
    },
    /// A scanned string was classified.
    ScanResolved {
        /// The classified payload.
        payload: crate::scan::ScanPayload,
    },
    /// A routed scan envelope was accepted by the backend.
    PassScanComplete {
        /// Backend response body.
        response: String,
    },
}

/// Host callback for [`PassportEvent`]s.
///
/// Implementations must return quickly; hand work off to the host's own queue.
#[uniffi::export(with_foreign)]
pub trait PassportListener: Send + Sync {
    /// Called once per published event.
    fn on_event(&self, event: PassportEvent);
}

/// Fan-out of [`PassportEvent`]s to a broadcast channel and an optional host listener.
pub struct EventBus {
    sender: broadcast::Sender<PassportEvent>,
    listener: Option<Arc<dyn PassportListener>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl EventBus {
    /// Creates a bus, optionally forwarding to `listener`.
    #[must_use]
    pub fn new(listener: Option<Arc<dyn PassportListener>>) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender, listener }
    }

    /// New receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PassportEvent> {
        self.sender.subscribe()
    }

    /// Publishes `event`. Having no subscribers is not an error.
    pub fn publish(&self, event: PassportEvent) {
        log::debug!("publishing {event:?}");
        if let Some(listener) = &self.listener {
            listener.on_event(event.clone());
        }
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<PassportEvent>>);

    impl PassportListener for Recorder {
        fn on_event(&self, event: PassportEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[tokio::test]
    async fn test_publish_reaches_listener_and_subscribers() {
        let recorder = Arc::new(Recorder::default());
        let bus = EventBus::new(Some(recorder.clone()));
        let mut receiver = bus.subscribe();

        let event = PassportEvent::LoginComplete {
            address: "0x375fa2f7fec390872a04f9c147c943eb8e48c43d".to_string(),
        };
        bus.publish(event.clone());

        assert_eq!(receiver.recv().await.unwrap(), event);
        assert_eq!(recorder.0.lock().unwrap().as_slice(), &[event]);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(None);
        bus.publish(PassportEvent::LoginFailed {
            reason: "nobody listening".to_string(),
        });
    }

    #[test]
    fn test_slow_subscriber_does_not_block() {
        let bus = EventBus::new(None);
        let mut receiver = bus.subscribe();
        for i in 0..(EVENT_CHANNEL_CAPACITY * 2) {
            bus.publish(PassportEvent::PassScanComplete {
                response: i.to_string(),
            });
        }
        assert!(matches!(
            receiver.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
    }
}
