//! User-facing alerts.
//!
//! Alerts are the only failure signal that leaves the stream layer. They are
//! broadcast to whoever listens (a UI toast layer, the CLI) and carry a
//! ready-to-show message.

use std::time::Duration;

use beacon_core::AccountId;
use serde::{Deserialize, Serialize};

/// Something the user should be told about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Alert {
    /// The backend answered 429 for this account's stream.
    RateLimited {
        /// Account whose stream was throttled.
        account: AccountId,
    },
    /// Too many consecutive failures; reconnects paused for `cooldown_ms`.
    BreakerOpened {
        /// Pause length.
        cooldown_ms: u64,
    },
    /// Reconnects stopped for the rest of the process lifetime.
    PermanentlyDisabled,
}

impl Alert {
    /// Alert for a freshly opened breaker.
    pub fn breaker_opened(cooldown: Duration) -> Self {
        Self::BreakerOpened {
            cooldown_ms: u64::try_from(cooldown.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> String {
        match self {
            Self::RateLimited { .. } => {
                "Too many connection attempts. Real-time notifications will retry shortly.".into()
            }
            Self::BreakerOpened { cooldown_ms } => {
                let minutes = cooldown_ms.div_ceil(60_000);
                format!(
                    "Real-time notifications are temporarily paused. Retrying in {minutes} min."
                )
            }
            Self::PermanentlyDisabled => {
                "Real-time notifications are disabled. Restart to reconnect.".into()
            }
        }
    }

    /// Whether this alert means no further reconnects will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::PermanentlyDisabled)
    }
}
