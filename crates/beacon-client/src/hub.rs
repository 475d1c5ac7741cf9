//! # Notification hub
//!
//! [`NotificationHub`] is the explicitly constructed service object that
//! owns everything shared between contexts of one process: the event
//! source, the circuit breaker, the leader registry, the relay and the
//! per-account connectivity flags. Create one at startup, open a
//! [`ClientContext`] per observer (tab, window, worker), and call
//! [`NotificationHub::shutdown`] on exit.
//!
//! Tests build isolated hubs with [`NotificationHub::with_source`].

use std::collections::HashMap;
use std::sync::Arc;

use beacon_core::{AccountId, ContextId, Notification};
use beacon_settings::BeaconSettings;
use beacon_stream::{
    Alert, CircuitBreaker, CircuitBreakerConfig, EventSource, HttpEventSource, StreamSupervisor,
};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::{EventCallback, EventDispatcher};
use crate::errors::Result;
use crate::leader::{LeaderRegistry, Lease, Role};
use crate::lock::OperationLock;
use crate::relay::BroadcastRelay;
use crate::subscription::{Membership, Subscription, SubscriptionTask};

const ALERT_CAPACITY: usize = 16;

struct HubInner {
    settings: BeaconSettings,
    source: Arc<dyn EventSource>,
    breaker: CircuitBreaker,
    registry: Arc<LeaderRegistry>,
    relay: Arc<BroadcastRelay>,
    connectivity: Mutex<HashMap<AccountId, Arc<watch::Sender<bool>>>>,
    alerts: broadcast::Sender<Alert>,
    shutdown: CancellationToken,
}

/// Process-wide notification service. Cheap to clone.
#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationHub")
            .field("breaker", &self.inner.breaker.state())
            .field("relay_channels", &self.inner.relay.channel_count())
            .field("tracked_accounts", &self.tracked_accounts())
            .field("shut_down", &self.inner.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl NotificationHub {
    /// Hub streaming over HTTP as configured by `settings`.
    pub fn new(settings: BeaconSettings) -> Result<Self> {
        settings.validate()?;
        let source = HttpEventSource::new(settings.stream.clone())?;
        Ok(Self::with_source(settings, Arc::new(source)))
    }

    /// Hub streaming from an arbitrary source.
    pub fn with_source(settings: BeaconSettings, source: Arc<dyn EventSource>) -> Self {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::from(&settings.breaker));
        let relay = Arc::new(BroadcastRelay::new(settings.relay.channel_capacity));
        let (alerts, _) = broadcast::channel(ALERT_CAPACITY);
        Self {
            inner: Arc::new(HubInner {
                settings,
                source,
                breaker,
                registry: Arc::new(LeaderRegistry::new()),
                relay,
                connectivity: Mutex::new(HashMap::new()),
                alerts,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Open a new observing context.
    pub fn open_context(&self) -> ClientContext {
        let (bus, _) = broadcast::channel(self.inner.settings.relay.channel_capacity.max(1));
        let context = ClientContext {
            id: ContextId::new(),
            hub: self.clone(),
            bus,
        };
        debug!(context = %context.id, "opened client context");
        context
    }

    /// Receive user-facing alerts from every stream of this hub.
    pub fn alerts(&self) -> broadcast::Receiver<Alert> {
        self.inner.alerts.subscribe()
    }

    /// The shared circuit breaker.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }

    /// The leader registry.
    pub fn registry(&self) -> &LeaderRegistry {
        &self.inner.registry
    }

    /// Settings the hub was built with.
    pub fn settings(&self) -> &BeaconSettings {
        &self.inner.settings
    }

    /// Stop every subscription. Idempotent.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            info!("notification hub shutting down");
        }
        self.inner.shutdown.cancel();
        for flag in self.inner.connectivity.lock().values() {
            clear(flag);
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Accounts with at least one live subscription.
    pub fn tracked_accounts(&self) -> usize {
        self.inner.connectivity.lock().len()
    }

    /// Take a registry lease on `account` together with its connectivity
    /// flag. Both happen under the connectivity lock so [`leave`](Self::leave)
    /// cannot drop the flag between them.
    fn join(&self, account: &AccountId) -> Membership {
        let mut map = self.inner.connectivity.lock();
        let lease = self.inner.registry.lease(account);
        let connected = Arc::clone(
            map.entry(account.clone())
                .or_insert_with(|| Arc::new(watch::channel(false).0)),
        );
        Membership {
            hub: self.clone(),
            lease,
            connected,
        }
    }

    /// Release a lease. A leader's supervisor is already cancelled and no
    /// longer writes the flag, so it is cleared here before anyone else can
    /// take the lead. The flag is forgotten once nobody holds the account.
    pub(crate) fn leave(&self, lease: Lease, connected: &watch::Sender<bool>) {
        let mut map = self.inner.connectivity.lock();
        if lease.role() == Role::Leader {
            clear(connected);
        }
        let account = lease.account().clone();
        drop(lease);
        if self.inner.registry.holders(&account) == 0 {
            debug!(%account, "forgetting account connectivity");
            let _ = map.remove(&account);
        }
    }

    fn supervisor(&self, connected: Arc<watch::Sender<bool>>) -> StreamSupervisor {
        StreamSupervisor::new(
            Arc::clone(&self.inner.source),
            self.inner.breaker.clone(),
            self.inner.settings.reconnect,
        )
        .with_alerts(self.inner.alerts.clone())
        .with_connectivity(connected)
    }
}

/// One observer inside a hub.
///
/// Each context has its own event bus that receives every notification
/// dispatched to any of its subscriptions.
#[derive(Debug)]
pub struct ClientContext {
    id: ContextId,
    hub: NotificationHub,
    bus: broadcast::Sender<Arc<Notification>>,
}

impl ClientContext {
    /// This context's id.
    pub fn id(&self) -> &ContextId {
        &self.id
    }

    /// Listen to the context's event bus.
    pub fn events(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.bus.subscribe()
    }

    /// The context's event bus as a stream. Lagged notifications are skipped.
    pub fn event_stream(&self) -> impl Stream<Item = Arc<Notification>> + Send + 'static {
        BroadcastStream::new(self.bus.subscribe()).filter_map(|item| match item {
            Ok(notification) => Some(notification),
            Err(err) => {
                warn!(error = %err, "event bus receiver lagged");
                None
            }
        })
    }

    /// Observe `account`, calling `on_event` for each notification.
    ///
    /// Must be called from within a Tokio runtime. Unauthenticated ids
    /// (empty or `0`) yield an inactive subscription that never connects.
    pub fn subscribe<F>(&self, account: impl Into<AccountId>, on_event: F) -> Subscription
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let callback: EventCallback = Arc::new(on_event);
        self.subscribe_with(account.into(), Some(callback))
    }

    /// Observe `account` without a callback; consume the event bus instead.
    pub fn watch(&self, account: impl Into<AccountId>) -> Subscription {
        self.subscribe_with(account.into(), None)
    }

    fn subscribe_with(&self, account: AccountId, on_event: Option<EventCallback>) -> Subscription {
        let lock = OperationLock::new();
        let dispatcher = EventDispatcher::new(lock, on_event, self.bus.clone());

        if !account.is_authenticated() || self.hub.is_shut_down() {
            debug!(context = %self.id, %account, "inactive subscription");
            return Subscription::inactive(account, self.id.clone(), dispatcher);
        }

        let inner = &self.hub.inner;
        let membership = self.hub.join(&account);
        let role = membership.lease.role();
        let connected = Arc::clone(&membership.connected);

        info!(context = %self.id, %account, ?role, "subscribing");

        // The leader dispatches its own frames directly; only followers
        // listen to the relay.
        let (supervisor, relay_rx) = match role {
            Role::Leader => (Some(self.hub.supervisor(Arc::clone(&connected))), None),
            Role::Follower | Role::Inactive => (None, Some(inner.relay.subscribe(&account))),
        };
        let task = SubscriptionTask {
            account,
            origin: self.id.clone(),
            supervisor,
            relay: Arc::clone(&inner.relay),
            relay_rx,
            connectivity: connected.subscribe(),
            dispatcher: dispatcher.clone(),
            cancel: inner.shutdown.child_token(),
        };
        Subscription::spawn(task, membership, dispatcher)
    }
}

fn clear(flag: &watch::Sender<bool>) {
    let _ = flag.send_if_modified(|connected| std::mem::replace(connected, false));
}
