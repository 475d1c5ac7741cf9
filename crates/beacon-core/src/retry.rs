//! Reconnect backoff configuration and calculation.
//!
//! The async scheduling lives in `beacon-stream`; this module holds the
//! portable building blocks:
//!
//! - [`ReconnectPolicy`]: base and cap delays
//! - [`calculate_backoff_delay`]: `min(base * 2^attempt, cap)`

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 3_000;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 120_000;

/// Exponential backoff parameters for reconnecting a dropped stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Delay before the first retry, in ms (default: 3000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single delay, in ms (default: 120000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay to wait before retry number `attempt` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(calculate_backoff_delay(
            attempt,
            self.base_delay_ms,
            self.max_delay_ms,
        ))
    }
}

/// Calculate the exponential backoff delay for a zero-based attempt.
///
/// Formula: `min(base_delay_ms * 2^attempt, max_delay_ms)`. Saturates
/// instead of overflowing for large attempts.
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    exponential.min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_schedule() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (0..8)
            .map(|k| u64::try_from(policy.delay_for(k).as_millis()).unwrap())
            .collect();
        assert_eq!(
            delays,
            vec![3_000, 6_000, 12_000, 24_000, 48_000, 96_000, 120_000, 120_000]
        );
    }

    #[test]
    fn huge_attempt_saturates_at_cap() {
        assert_eq!(calculate_backoff_delay(u32::MAX, 3_000, 120_000), 120_000);
        assert_eq!(calculate_backoff_delay(63, u64::MAX / 2, u64::MAX), u64::MAX);
    }

    #[test]
    fn policy_deserializes_with_defaults() {
        let policy: ReconnectPolicy = serde_json::from_str("{\"baseDelayMs\": 10}").unwrap();
        assert_eq!(policy.base_delay_ms, 10);
        assert_eq!(policy.max_delay_ms, DEFAULT_MAX_DELAY_MS);
    }

    proptest! {
        #[test]
        fn delay_matches_formula(k in 0u32..20) {
            let expected = (3_000u64 * 2u64.pow(k)).min(120_000);
            prop_assert_eq!(calculate_backoff_delay(k, 3_000, 120_000), expected);
        }

        #[test]
        fn delay_is_monotonic(k in 0u32..40, base in 1u64..10_000, cap in 1u64..1_000_000) {
            prop_assert!(
                calculate_backoff_delay(k, base, cap) <= calculate_backoff_delay(k + 1, base, cap)
            );
        }
    }
}
