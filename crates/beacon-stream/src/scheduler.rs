//! Reconnect scheduling.
//!
//! The delay for consecutive attempt `k` (zero-based) is
//! `min(base * 2^k, max)`. The counter advances each time a delay is handed
//! out and goes back to zero after a successful connect.

use std::time::Duration;

use beacon_core::ReconnectPolicy;
use tokio_util::sync::CancellationToken;

/// Per-connection reconnect attempt counter.
#[derive(Clone, Debug, Default)]
pub struct ReconnectScheduler {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl ReconnectScheduler {
    /// Scheduler starting at attempt 0.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Delay before the next attempt; advances the counter.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Back to attempt 0.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// Returns `true` if the full delay elapsed.
pub(crate) async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => true,
        () = cancel.cancelled() => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
