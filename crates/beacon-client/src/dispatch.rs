//! Per-subscription event dispatch.
//!
//! Leader and followers run exactly the same steps for each notification,
//! whether it came off the wire or through the relay:
//!
//! 1. record it as the last event
//! 2. update the operation lock
//! 3. call the subscriber's callback
//! 4. publish it on the context's event bus

use std::sync::Arc;

use beacon_core::Notification;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::lock::OperationLock;

/// Subscriber callback.
pub type EventCallback = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Fans one notification out to every local consumer.
#[derive(Clone)]
pub struct EventDispatcher {
    last_event: Arc<watch::Sender<Option<Arc<Notification>>>>,
    lock: OperationLock,
    on_event: Option<EventCallback>,
    bus: broadcast::Sender<Arc<Notification>>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("lock", &self.lock)
            .field("has_callback", &self.on_event.is_some())
            .finish_non_exhaustive()
    }
}

impl EventDispatcher {
    /// Dispatcher feeding `lock`, `on_event` and `bus`.
    pub fn new(
        lock: OperationLock,
        on_event: Option<EventCallback>,
        bus: broadcast::Sender<Arc<Notification>>,
    ) -> Self {
        let (last_event, _) = watch::channel(None);
        Self {
            last_event: Arc::new(last_event),
            lock,
            on_event,
            bus,
        }
    }

    /// Run the dispatch steps for one notification.
    pub fn dispatch(&self, notification: Arc<Notification>) {
        debug!(kind = %notification.kind, title = %notification.title, "dispatching notification");
        let _ = self.last_event.send_replace(Some(Arc::clone(&notification)));
        self.lock.apply(&notification);
        if let Some(on_event) = &self.on_event {
            on_event(&notification);
        }
        // No bus listeners is fine.
        let _ = self.bus.send(notification);
    }

    /// Most recently dispatched notification.
    pub fn last_event(&self) -> Option<Arc<Notification>> {
        self.last_event.borrow().clone()
    }

    /// Watch the last event.
    pub fn watch_last_event(&self) -> watch::Receiver<Option<Arc<Notification>>> {
        self.last_event.subscribe()
    }

    /// The lock this dispatcher feeds.
    pub fn lock(&self) -> &OperationLock {
        &self.lock
    }
}
