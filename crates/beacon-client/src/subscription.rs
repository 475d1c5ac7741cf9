//! Subscription handles and the task behind them.
//!
//! A [`Subscription`] is what application code holds while it observes an
//! account. Behind it runs one task that, depending on the role:
//!
//! - **leader**: drives a [`StreamSupervisor`], publishing each notification
//!   to the relay and dispatching it locally
//! - **follower**: dispatches whatever the relay delivers
//!
//! and, for both, resets the operation lock whenever the account's
//! connectivity drops. Dropping the handle cancels the task and leaves the
//! hub: a departing leader clears the account's connectivity flag before its
//! lease is released, so the next leader starts from a clean flag.

use std::sync::Arc;

use beacon_core::{AccountId, ContextId, Notification};
use beacon_stream::{StopReason, StreamSupervisor};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::dispatch::EventDispatcher;
use crate::hub::NotificationHub;
use crate::leader::{Lease, Role};
use crate::lock::OperationLock;
use crate::relay::{BroadcastRelay, RelayMessage};

/// Everything the background task of one subscription needs.
pub(crate) struct SubscriptionTask {
    pub(crate) account: AccountId,
    pub(crate) origin: ContextId,
    pub(crate) supervisor: Option<StreamSupervisor>,
    pub(crate) relay: Arc<BroadcastRelay>,
    pub(crate) relay_rx: Option<broadcast::Receiver<RelayMessage>>,
    pub(crate) connectivity: watch::Receiver<bool>,
    pub(crate) dispatcher: EventDispatcher,
    pub(crate) cancel: CancellationToken,
}

impl SubscriptionTask {
    async fn run(self, stop: watch::Sender<Option<StopReason>>) {
        let Self {
            account,
            origin,
            supervisor,
            relay,
            relay_rx,
            connectivity,
            dispatcher,
            cancel,
        } = self;

        let lead = async {
            let Some(supervisor) = supervisor else {
                return;
            };
            let deliver = |notification: Notification| {
                let notification = Arc::new(notification);
                let _ = relay.publish(&account, &origin, Arc::clone(&notification));
                dispatcher.dispatch(notification);
            };
            let reason = supervisor.run(&account, &cancel, deliver).await;
            debug!(%account, ?reason, "leader stream stopped");
            let _ = stop.send_replace(Some(reason));
        };
        let follow = async {
            if let Some(rx) = relay_rx {
                listen_relay(rx, &dispatcher, &cancel).await;
            }
        };
        let reset = reset_lock_on_disconnect(connectivity, dispatcher.lock(), &cancel);

        let ((), (), ()) = tokio::join!(lead, follow, reset);
        relay.prune(&account);
    }
}

async fn listen_relay(
    mut rx: broadcast::Receiver<RelayMessage>,
    dispatcher: &EventDispatcher,
    cancel: &CancellationToken,
) {
    loop {
        let received = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            received = rx.recv() => received,
        };
        match received {
            Ok(message) => dispatcher.dispatch(message.notification),
            Err(RecvError::Lagged(n)) => {
                warn!(lagged = n, "relay receiver lagged, notifications dropped");
                metrics::counter!("beacon_frames_dropped_total", "reason" => "lagged").increment(n);
            }
            Err(RecvError::Closed) => return,
        }
    }
}

async fn reset_lock_on_disconnect(
    mut connectivity: watch::Receiver<bool>,
    lock: &OperationLock,
    cancel: &CancellationToken,
) {
    loop {
        let changed = tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            changed = connectivity.changed() => changed,
        };
        if changed.is_err() {
            return;
        }
        if !*connectivity.borrow_and_update() {
            lock.on_disconnect();
        }
    }
}

/// An active subscription's stake in the hub.
#[derive(Debug)]
pub(crate) struct Membership {
    pub(crate) hub: NotificationHub,
    pub(crate) lease: Lease,
    pub(crate) connected: Arc<watch::Sender<bool>>,
}

/// Handle for one context observing one account.
///
/// Exposes connectivity, the last event and the operation lock; stream
/// errors are never surfaced here. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    account: AccountId,
    context: ContextId,
    role: Role,
    membership: Option<Membership>,
    connected: watch::Receiver<bool>,
    stop: watch::Receiver<Option<StopReason>>,
    dispatcher: EventDispatcher,
    cancel: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn spawn(
        task: SubscriptionTask,
        membership: Membership,
        dispatcher: EventDispatcher,
    ) -> Self {
        let (stop_tx, stop) = watch::channel(None);
        let connected = membership.connected.subscribe();
        let account = task.account.clone();
        let context = task.origin.clone();
        let cancel = task.cancel.clone();
        let handle = tokio::spawn(task.run(stop_tx));
        Self {
            account,
            context,
            role: membership.lease.role(),
            membership: Some(membership),
            connected,
            stop,
            dispatcher,
            cancel: Some(cancel),
            task: Some(handle),
        }
    }

    pub(crate) fn inactive(
        account: AccountId,
        context: ContextId,
        dispatcher: EventDispatcher,
    ) -> Self {
        Self {
            account,
            context,
            role: Role::Inactive,
            membership: None,
            connected: watch::channel(false).1,
            stop: watch::channel(None).1,
            dispatcher,
            cancel: None,
            task: None,
        }
    }

    /// Account being observed.
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Owning context.
    pub fn context_id(&self) -> &ContextId {
        &self.context
    }

    /// Role granted at subscription time.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether the account's stream is open (the leader's, for followers).
    pub fn is_connected(&self) -> bool {
        self.is_active() && *self.connected.borrow()
    }

    /// Watch the account's connectivity flag.
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Most recent notification dispatched to this subscription.
    pub fn last_event(&self) -> Option<Arc<Notification>> {
        self.dispatcher.last_event()
    }

    /// Watch the last event.
    pub fn watch_last_event(&self) -> watch::Receiver<Option<Arc<Notification>>> {
        self.dispatcher.watch_last_event()
    }

    /// The advisory operation lock fed by this subscription.
    pub fn operation_lock(&self) -> &OperationLock {
        self.dispatcher.lock()
    }

    /// Why the leader stream stopped, once it has. Always `None` for
    /// followers and inactive subscriptions.
    pub fn stop_reason(&self) -> Option<StopReason> {
        *self.stop.borrow()
    }

    /// Wait until the leader stream stops. Returns `None` if the task ends
    /// without a leader stream (follower, inactive, unsubscribed).
    pub async fn stopped(&mut self) -> Option<StopReason> {
        match self.stop.wait_for(Option::is_some).await {
            Ok(reason) => *reason,
            Err(_) => None,
        }
    }

    /// Whether the subscription is still running.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    /// Stop observing. Idempotent.
    pub fn unsubscribe(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };
        debug!(context = %self.context, account = %self.account, "unsubscribing");
        cancel.cancel();
        if let Some(Membership {
            hub,
            lease,
            connected,
        }) = self.membership.take()
        {
            hub.leave(lease, &connected);
        }
        self.dispatcher.lock().on_disconnect();
    }

    /// Unsubscribe and wait for the background task to finish.
    pub async fn close(mut self) {
        self.unsubscribe();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
