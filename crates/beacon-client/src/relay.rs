//! Cross-context relay.
//!
//! One [`broadcast`] channel per account, named after
//! [`AccountId::channel_name`]. The leader publishes every parsed
//! notification and dispatches it locally itself; only followers listen.
//! Each message records the publishing context as its origin.
//!
//! Delivery is best-effort: no replay for late subscribers, and a receiver
//! that falls more than `capacity` messages behind loses the overflow.

use std::collections::HashMap;
use std::sync::Arc;

use beacon_core::{AccountId, ContextId, Notification};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// A relayed notification and the context that published it.
#[derive(Clone, Debug)]
pub struct RelayMessage {
    /// Publishing context.
    pub origin: ContextId,
    /// The notification, shared between all receivers.
    pub notification: Arc<Notification>,
}

/// Account-keyed publish/subscribe bus.
#[derive(Debug)]
pub struct BroadcastRelay {
    capacity: usize,
    channels: Mutex<HashMap<AccountId, broadcast::Sender<RelayMessage>>>,
}

impl BroadcastRelay {
    /// Relay whose per-account channels hold `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Listen to `account`'s channel, creating it if needed.
    pub fn subscribe(&self, account: &AccountId) -> broadcast::Receiver<RelayMessage> {
        let mut channels = self.channels.lock();
        if let Some(tx) = channels.get(account) {
            return tx.subscribe();
        }
        debug!(channel = %account.channel_name(), "opening relay channel");
        let (tx, rx) = broadcast::channel(self.capacity);
        let _ = channels.insert(account.clone(), tx);
        rx
    }

    /// Publish to every listener of `account`. Returns the receiver count.
    pub fn publish(
        &self,
        account: &AccountId,
        origin: &ContextId,
        notification: Arc<Notification>,
    ) -> usize {
        let channels = self.channels.lock();
        let Some(tx) = channels.get(account) else {
            return 0;
        };
        let message = RelayMessage {
            origin: origin.clone(),
            notification,
        };
        let receivers = tx.send(message).unwrap_or(0);
        trace!(%account, receivers, "relayed notification");
        receivers
    }

    /// Drop `account`'s channel if nobody listens any more.
    pub fn prune(&self, account: &AccountId) {
        let mut channels = self.channels.lock();
        if channels
            .get(account)
            .is_some_and(|tx| tx.receiver_count() == 0)
        {
            debug!(channel = %account.channel_name(), "closing relay channel");
            let _ = channels.remove(account);
        }
    }

    /// Number of open channels.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::NotificationKind;
    use tokio::sync::broadcast::error::TryRecvError;

    fn note(message: &str) -> Arc<Notification> {
        Arc::new(Notification::new(NotificationKind::BalanceUpdated, "Saldo", message))
    }

    #[test]
    fn publish_without_channel_is_dropped() {
        let relay = BroadcastRelay::new(8);
        assert_eq!(relay.publish(&AccountId::from(1u64), &ContextId::new(), note("x")), 0);
        assert_eq!(relay.channel_count(), 0);
    }

    #[test]
    fn subscribers_receive_in_order() {
        let relay = BroadcastRelay::new(8);
        let account = AccountId::from(1u64);
        let origin = ContextId::new();
        let mut a = relay.subscribe(&account);
        let mut b = relay.subscribe(&account);

        for i in 0..3 {
            assert_eq!(relay.publish(&account, &origin, note(&i.to_string())), 2);
        }
        for rx in [&mut a, &mut b] {
            for i in 0..3 {
                let msg = rx.try_recv().unwrap();
                assert_eq!(msg.origin, origin);
                assert_eq!(msg.notification.message, i.to_string());
            }
        }
    }

    #[test]
    fn accounts_are_isolated() {
        let relay = BroadcastRelay::new(8);
        let mut one = relay.subscribe(&AccountId::from(1u64));
        let _ = relay.publish(&AccountId::from(2u64), &ContextId::new(), note("x"));
        assert_eq!(one.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn late_subscriber_sees_no_history() {
        let relay = BroadcastRelay::new(8);
        let account = AccountId::from(1u64);
        let _early = relay.subscribe(&account);
        let _ = relay.publish(&account, &ContextId::new(), note("before"));

        let mut late = relay.subscribe(&account);
        assert_eq!(late.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[test]
    fn slow_receiver_lags() {
        let relay = BroadcastRelay::new(2);
        let account = AccountId::from(1u64);
        let mut rx = relay.subscribe(&account);
        for i in 0..5 {
            let _ = relay.publish(&account, &ContextId::new(), note(&i.to_string()));
        }
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Lagged(3));
        assert_eq!(rx.try_recv().unwrap().notification.message, "3");
    }

    #[test]
    fn prune_removes_idle_channels_only() {
        let relay = BroadcastRelay::new(8);
        let account = AccountId::from(1u64);
        let rx = relay.subscribe(&account);
        relay.prune(&account);
        assert_eq!(relay.channel_count(), 1);
        drop(rx);
        relay.prune(&account);
        assert_eq!(relay.channel_count(), 0);
    }
}
