//! Leader election for account streams.
//!
//! A per-hub counter keyed by account id. The first context to acquire an
//! account becomes its leader and owns the upstream connection; later ones
//! are followers and only listen to the relay. There is no handoff: when the
//! leader releases, existing followers stay followers.

use std::collections::HashMap;
use std::sync::Arc;

use beacon_core::AccountId;
use parking_lot::Mutex;
use tracing::{debug, info};

/// Role a context holds for an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Owns the upstream stream connection.
    Leader,
    /// Receives relayed events only.
    Follower,
    /// Not observing anything (unauthenticated account). Never handed out by
    /// the registry.
    Inactive,
}

/// Per-account acquisition counter.
#[derive(Debug, Default)]
pub struct LeaderRegistry {
    counts: Mutex<HashMap<AccountId, usize>>,
}

impl LeaderRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter for `account`; leader iff it was zero.
    pub fn acquire(&self, account: &AccountId) -> Role {
        let mut counts = self.counts.lock();
        let count = counts.entry(account.clone()).or_insert(0);
        let role = if *count == 0 {
            Role::Leader
        } else {
            Role::Follower
        };
        *count += 1;
        info!(%account, ?role, holders = *count, "acquired account role");
        role
    }

    /// Decrement the counter for `account`. No-op at zero.
    pub fn release(&self, account: &AccountId) {
        let mut counts = self.counts.lock();
        let Some(count) = counts.get_mut(account) else {
            return;
        };
        *count = count.saturating_sub(1);
        debug!(%account, holders = *count, "released account role");
        if *count == 0 {
            let _ = counts.remove(account);
        }
    }

    /// Current holders for `account`.
    pub fn holders(&self, account: &AccountId) -> usize {
        self.counts.lock().get(account).copied().unwrap_or(0)
    }

    /// Acquire and wrap the result in a guard that releases on drop.
    pub fn lease(self: &Arc<Self>, account: &AccountId) -> Lease {
        let role = self.acquire(account);
        Lease {
            registry: Arc::clone(self),
            account: account.clone(),
            role,
        }
    }
}

/// RAII registry entry. Dropping it releases the account.
#[derive(Debug)]
pub struct Lease {
    registry: Arc<LeaderRegistry>,
    account: AccountId,
    role: Role,
}

impl Lease {
    /// Role granted at acquisition.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Account this lease is for.
    pub fn account(&self) -> &AccountId {
        &self.account
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.registry.release(&self.account);
    }
}
