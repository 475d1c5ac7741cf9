//! Circuit breaker gating stream connection attempts.
//!
//! State transitions:
//! - Closed → Open: consecutive failures reach `failure_threshold`
//! - Open → Closed: the first [`CircuitBreaker::check`] after `cooldown`
//!   has elapsed since the last failure; the consecutive count resets
//! - Open → PermanentlyDisabled: `failure_threshold * max_open_cycles`
//!   failures without an intervening success. Terminal for the lifetime
//!   of the breaker.
//! - any success → consecutive and cycle counts reset (unless disabled)
//!
//! One breaker is shared by every stream a hub opens, so a rate-limited
//! backend sees bounded pressure no matter how many accounts or contexts
//! are active.

use std::sync::Arc;
use std::time::Duration;

use beacon_settings::BreakerSettings;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

/// Breaker thresholds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open after the last failure.
    pub cooldown: Duration,
    /// Open cycles without success before permanent disable.
    pub max_open_cycles: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from(&BreakerSettings::default())
    }
}

impl From<&BreakerSettings> for CircuitBreakerConfig {
    fn from(settings: &BreakerSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold.max(1),
            cooldown: Duration::from_millis(settings.cooldown_ms),
            max_open_cycles: settings.max_open_cycles.max(1),
        }
    }
}

impl CircuitBreakerConfig {
    /// Failures without success that disable the breaker for good.
    pub fn disable_after(&self) -> u32 {
        self.failure_threshold.saturating_mul(self.max_open_cycles)
    }
}

/// Coarse breaker state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakerState {
    /// Attempts allowed.
    Closed,
    /// Attempts blocked until cooldown expires.
    Open,
    /// Attempts blocked until the process restarts.
    PermanentlyDisabled,
}

/// Answer to "may I connect now?".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Go ahead.
    Allowed,
    /// Wait out the rest of the cooldown first.
    Open {
        /// Time until the breaker will close.
        remaining: Duration,
    },
    /// Never again.
    Disabled,
}

/// What a recorded failure did to the breaker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Counted; breaker state unchanged.
    Counted,
    /// This failure opened the breaker.
    Opened {
        /// Cooldown now running.
        cooldown: Duration,
    },
    /// This failure (or an earlier one) disabled the breaker permanently.
    Disabled,
}

/// Point-in-time copy of the breaker fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BreakerSnapshot {
    /// Consecutive failures in the current cycle.
    pub failure_count: u32,
    /// Failures since the last success, across cycles.
    pub failures_since_success: u32,
    /// When the last failure was recorded.
    pub last_failure: Option<Instant>,
    /// Whether attempts are currently blocked by cooldown.
    pub is_open: bool,
    /// Terminal flag.
    pub permanently_disabled: bool,
}

#[derive(Debug, Default)]
struct Inner {
    failure_count: u32,
    failures_since_success: u32,
    last_failure: Option<Instant>,
    is_open: bool,
    permanently_disabled: bool,
}

/// Shared circuit breaker. Clones share state.
#[derive(Clone, Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<Inner>>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Thresholds in effect.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Evaluate whether an attempt may proceed, closing the breaker if its
    /// cooldown has elapsed.
    pub fn check(&self) -> Admission {
        let mut inner = self.inner.lock();

        if inner.permanently_disabled {
            return Admission::Disabled;
        }
        if !inner.is_open {
            return Admission::Allowed;
        }

        let elapsed = inner
            .last_failure
            .map_or(self.config.cooldown, |t| t.elapsed());
        if elapsed >= self.config.cooldown {
            info!(
                failures_since_success = inner.failures_since_success,
                "circuit breaker: Open → Closed"
            );
            inner.is_open = false;
            inner.failure_count = 0;
            record_transition("closed");
            Admission::Allowed
        } else {
            Admission::Open {
                remaining: self.config.cooldown - elapsed,
            }
        }
    }

    /// Record a successful connection.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.permanently_disabled {
            return;
        }
        inner.failure_count = 0;
        inner.failures_since_success = 0;
        inner.is_open = false;
    }

    /// Record a failed attempt.
    pub fn record_failure(&self) -> FailureOutcome {
        let mut inner = self.inner.lock();
        if inner.permanently_disabled {
            return FailureOutcome::Disabled;
        }

        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.failures_since_success = inner.failures_since_success.saturating_add(1);
        inner.last_failure = Some(Instant::now());

        if inner.failures_since_success >= self.config.disable_after() {
            warn!(
                failures = inner.failures_since_success,
                "circuit breaker: permanently disabled"
            );
            inner.is_open = true;
            inner.permanently_disabled = true;
            record_transition("disabled");
            return FailureOutcome::Disabled;
        }

        if !inner.is_open && inner.failure_count >= self.config.failure_threshold {
            warn!(
                failures = inner.failure_count,
                cooldown_ms = u64::try_from(self.config.cooldown.as_millis()).unwrap_or(u64::MAX),
                "circuit breaker: Closed → Open"
            );
            inner.is_open = true;
            record_transition("open");
            return FailureOutcome::Opened {
                cooldown: self.config.cooldown,
            };
        }

        FailureOutcome::Counted
    }

    /// Current state without side effects (does not close an expired cooldown).
    pub fn state(&self) -> BreakerState {
        let inner = self.inner.lock();
        if inner.permanently_disabled {
            BreakerState::PermanentlyDisabled
        } else if inner.is_open {
            BreakerState::Open
        } else {
            BreakerState::Closed
        }
    }

    /// Copy of all counters.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            failure_count: inner.failure_count,
            failures_since_success: inner.failures_since_success,
            last_failure: inner.last_failure,
            is_open: inner.is_open,
            permanently_disabled: inner.permanently_disabled,
        }
    }
}

fn record_transition(to: &'static str) {
    metrics::counter!("beacon_breaker_transitions_total", "to" => to).increment(1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
