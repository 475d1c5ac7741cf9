//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so partial
//! JSON files are accepted; missing fields take their [`Default`] value.

use beacon_core::ReconnectPolicy;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "stream": { "baseUrl": "https://shop.example.com" },
///   "breaker": { "cooldownMs": 60000 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeaconSettings {
    /// Upstream event endpoint.
    pub stream: StreamSettings,
    /// Reconnect backoff.
    pub reconnect: ReconnectPolicy,
    /// Circuit breaker gating reconnects.
    pub breaker: BreakerSettings,
    /// Cross-context relay.
    pub relay: RelaySettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl BeaconSettings {
    /// Reject combinations the runtime cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.stream.base_url.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "stream.baseUrl must not be empty".into(),
            ));
        }
        if self.reconnect.base_delay_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "reconnect.baseDelayMs must be > 0".into(),
            ));
        }
        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(SettingsError::InvalidValue(format!(
                "reconnect.maxDelayMs ({}) is below baseDelayMs ({})",
                self.reconnect.max_delay_ms, self.reconnect.base_delay_ms
            )));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(SettingsError::InvalidValue(
                "breaker.failureThreshold must be > 0".into(),
            ));
        }
        if self.breaker.max_open_cycles == 0 {
            return Err(SettingsError::InvalidValue(
                "breaker.maxOpenCycles must be > 0".into(),
            ));
        }
        if self.relay.channel_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "relay.channelCapacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Where and how to open the account stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSettings {
    /// Scheme, host and port of the backend.
    pub base_url: String,
    /// Path prefix; the account id is appended as the last segment.
    pub path: String,
    /// Timeout for establishing the connection (not the stream lifetime).
    pub connect_timeout_ms: u64,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            path: "/api/notifications/stream".to_string(),
            connect_timeout_ms: 10_000,
            user_agent: concat!("beacon/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl StreamSettings {
    /// Full stream URL for an account.
    #[must_use]
    pub fn url_for(&self, account: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.path.trim_matches('/'),
            account
        )
    }
}

/// Circuit breaker thresholds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BreakerSettings {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// How long the breaker stays open, in ms.
    pub cooldown_ms: u64,
    /// Open cycles without a success before the breaker disables itself for good.
    pub max_open_cycles: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_ms: 300_000,
            max_open_cycles: 3,
        }
    }
}

/// Cross-context relay sizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Buffered messages per account channel before slow receivers lag.
    pub channel_capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_for_joins_segments() {
        let stream = StreamSettings {
            base_url: "https://shop.example.com/".into(),
            path: "/api/notifications/stream/".into(),
            ..Default::default()
        };
        assert_eq!(
            stream.url_for("42"),
            "https://shop.example.com/api/notifications/stream/42"
        );
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: BeaconSettings =
            serde_json::from_str(r#"{"breaker": {"cooldownMs": 1000}}"#).unwrap();
        assert_eq!(settings.breaker.cooldown_ms, 1000);
        assert_eq!(settings.breaker.failure_threshold, 3);
        assert_eq!(settings.reconnect, ReconnectPolicy::default());
    }

    #[test]
    fn roundtrip_camel_case() {
        let v = serde_json::to_value(BeaconSettings::default()).unwrap();
        assert!(v["stream"]["baseUrl"].is_string());
        assert!(v["breaker"]["failureThreshold"].is_number());
        assert!(v["relay"]["channelCapacity"].is_number());
    }

    #[test]
    fn validate_rejects_inverted_delays() {
        let mut settings = BeaconSettings::default();
        settings.reconnect.max_delay_ms = 10;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("maxDelayMs"));
    }

    #[test]
    fn validate_rejects_zero_threshold() {
        let mut settings = BeaconSettings::default();
        settings.breaker.failure_threshold = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn validate_rejects_empty_base_url() {
        let mut settings = BeaconSettings::default();
        settings.stream.base_url = " ".into();
        assert!(settings.validate().is_err());
    }
}
