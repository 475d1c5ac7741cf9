//! # Stream supervisor
//!
//! Owns the connect / read / reconnect loop for one account:
//!
//! 1. Ask the [`CircuitBreaker`] for admission. Open means wait out the
//!    remaining cooldown and ask again; disabled means stop for good.
//! 2. Open the stream. On success reset the reconnect counter and the
//!    breaker's failure counts, and mark the account connected.
//! 3. Deliver each notification in arrival order until the stream ends,
//!    fails, or the cancellation token fires.
//! 4. Classify the outcome and either stop or sleep the backoff delay.
//!
//! | Outcome | Breaker | Next |
//! |---|---|---|
//! | cancelled | untouched | stop ([`StopReason::Cancelled`]) |
//! | 403 | untouched | stop silently ([`StopReason::Unauthorized`]) |
//! | server closed the stream | untouched | reconnect |
//! | 429 | failure + [`Alert::RateLimited`] | reconnect |
//! | any other failure | failure | reconnect |
//!
//! Errors never leave this loop. Callers see connectivity through a
//! [`watch`] channel, user-facing problems through [`Alert`]s, and the
//! terminal [`StopReason`].
//!
//! A cancelled run never writes a connectivity flag it shares with other
//! supervisors (see [`StreamSupervisor::with_connectivity`]): the next
//! leader may already own it, so clearing it is up to whoever cancelled.

use std::sync::Arc;
use std::time::Duration;

use beacon_core::{AccountId, Notification, ReconnectPolicy};
use futures::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::alert::Alert;
use crate::breaker::{Admission, CircuitBreaker, FailureOutcome};
use crate::error::StreamError;
use crate::scheduler::{ReconnectScheduler, sleep_or_cancel};
use crate::source::EventSource;

/// Default capacity of the alert channel created by [`StreamSupervisor::new`].
const ALERT_CAPACITY: usize = 16;

/// Why a supervisor loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The cancellation token fired.
    Cancelled,
    /// The session may not read this account's stream (403).
    Unauthorized,
    /// The circuit breaker is permanently disabled.
    Disabled,
}

/// How one connection attempt ended.
enum Outcome {
    Cancelled,
    Unauthorized,
    Closed,
    Failed(StreamError),
}

/// Connect / read / reconnect loop for a single account.
#[derive(Clone)]
pub struct StreamSupervisor {
    source: Arc<dyn EventSource>,
    breaker: CircuitBreaker,
    policy: ReconnectPolicy,
    alerts: broadcast::Sender<Alert>,
    connected: Arc<watch::Sender<bool>>,
    owns_connectivity: bool,
}

impl std::fmt::Debug for StreamSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSupervisor")
            .field("breaker", &self.breaker)
            .field("policy", &self.policy)
            .field("connected", &*self.connected.borrow())
            .finish_non_exhaustive()
    }
}

impl StreamSupervisor {
    /// Supervisor with its own alert channel and connectivity flag.
    pub fn new(
        source: Arc<dyn EventSource>,
        breaker: CircuitBreaker,
        policy: ReconnectPolicy,
    ) -> Self {
        let (alerts, _) = broadcast::channel(ALERT_CAPACITY);
        let (connected, _) = watch::channel(false);
        Self {
            source,
            breaker,
            policy,
            alerts,
            connected: Arc::new(connected),
            owns_connectivity: true,
        }
    }

    /// Publish alerts on a shared channel instead.
    #[must_use]
    pub fn with_alerts(mut self, alerts: broadcast::Sender<Alert>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Publish connectivity on a shared flag instead.
    ///
    /// Once the run is cancelled the flag is left untouched; the caller
    /// that cancels is responsible for clearing it.
    #[must_use]
    pub fn with_connectivity(mut self, connected: Arc<watch::Sender<bool>>) -> Self {
        self.connected = connected;
        self.owns_connectivity = false;
        self
    }

    /// Receive alerts raised from now on.
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<Alert> {
        self.alerts.subscribe()
    }

    /// Watch the connectivity flag.
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// Whether a stream is currently open.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// The breaker gating this supervisor.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run until cancelled, unauthorized, or the breaker is disabled.
    ///
    /// `deliver` is called once per notification, in arrival order.
    pub async fn run<F>(
        &self,
        account: &AccountId,
        cancel: &CancellationToken,
        mut deliver: F,
    ) -> StopReason
    where
        F: FnMut(Notification) + Send,
    {
        let mut scheduler = ReconnectScheduler::new(self.policy);

        loop {
            if cancel.is_cancelled() {
                return StopReason::Cancelled;
            }

            match self.breaker.check() {
                Admission::Allowed => {}
                Admission::Open { remaining } => {
                    info!(
                        %account,
                        remaining_ms = millis(remaining),
                        "circuit breaker open, waiting for cooldown"
                    );
                    if !sleep_or_cancel(remaining, cancel).await {
                        return StopReason::Cancelled;
                    }
                    continue;
                }
                Admission::Disabled => {
                    debug!(%account, "circuit breaker disabled, not connecting");
                    return StopReason::Disabled;
                }
            }

            let outcome = self
                .connect_and_read(account, cancel, &mut scheduler, &mut deliver)
                .await;
            self.set_connected(false, cancel);

            let mut retry_after = None;
            match outcome {
                Outcome::Cancelled => {
                    debug!(%account, "notification stream cancelled");
                    if self.owns_connectivity {
                        let _ = self.connected.send_replace(false);
                    }
                    return StopReason::Cancelled;
                }
                Outcome::Unauthorized => {
                    debug!(%account, "stream not authorized for this session");
                    return StopReason::Unauthorized;
                }
                Outcome::Closed => {
                    info!(%account, "notification stream closed by server");
                }
                Outcome::Failed(err) => {
                    if let StreamError::RateLimited { retry_after_ms } = &err {
                        retry_after = retry_after_ms.map(Duration::from_millis);
                    }
                    if let Some(reason) = self.on_failure(account, &err) {
                        return reason;
                    }
                }
            }

            let backoff = scheduler.next_delay();
            let delay = retry_after.map_or(backoff, |hint| backoff.max(hint));
            metrics::counter!("beacon_reconnects_total").increment(1);
            info!(
                %account,
                attempt = scheduler.attempt(),
                delay_ms = millis(delay),
                "scheduling reconnect"
            );
            if !sleep_or_cancel(delay, cancel).await {
                return StopReason::Cancelled;
            }
        }
    }

    async fn connect_and_read<F>(
        &self,
        account: &AccountId,
        cancel: &CancellationToken,
        scheduler: &mut ReconnectScheduler,
        deliver: &mut F,
    ) -> Outcome
    where
        F: FnMut(Notification) + Send,
    {
        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => return Outcome::Cancelled,
            result = self.source.open(account) => result,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(StreamError::Unauthorized) => return Outcome::Unauthorized,
            Err(StreamError::Cancelled) => return Outcome::Cancelled,
            Err(err) => return Outcome::Failed(err),
        };

        scheduler.reset();
        self.breaker.record_success();
        self.set_connected(true, cancel);
        info!(%account, "notification stream connected");

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Outcome::Cancelled,
                item = stream.next() => item,
            };
            match next {
                Some(Ok(notification)) => {
                    trace!(%account, kind = %notification.kind, "notification received");
                    deliver(notification);
                }
                Some(Err(StreamError::Cancelled)) => return Outcome::Cancelled,
                Some(Err(err)) => return Outcome::Failed(err),
                None => return Outcome::Closed,
            }
        }
    }

    /// Count a failure; returns a stop reason if the breaker is now disabled.
    fn on_failure(&self, account: &AccountId, err: &StreamError) -> Option<StopReason> {
        warn!(
            %account,
            error = %err,
            category = %err.category(),
            retryable = err.category().is_retryable(),
            "notification stream failed"
        );

        if matches!(err, StreamError::RateLimited { .. }) {
            self.alert(Alert::RateLimited {
                account: account.clone(),
            });
        }
        if !err.counts_against_breaker() {
            return None;
        }

        match self.breaker.record_failure() {
            FailureOutcome::Counted => None,
            FailureOutcome::Opened { cooldown } => {
                self.alert(Alert::breaker_opened(cooldown));
                None
            }
            FailureOutcome::Disabled => {
                self.alert(Alert::PermanentlyDisabled);
                Some(StopReason::Disabled)
            }
        }
    }

    fn alert(&self, alert: Alert) {
        // No receivers is fine.
        let _ = self.alerts.send(alert);
    }

    /// Checked under the watch lock, so a write can never land after the
    /// token fired.
    fn set_connected(&self, value: bool, cancel: &CancellationToken) {
        let _ = self.connected.send_if_modified(|current| {
            if cancel.is_cancelled() || *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
