//! # beacon-settings
//!
//! Configuration for the Beacon notification client, loaded from three
//! layers (in priority order):
//! 1. **Compiled defaults** — [`BeaconSettings::default()`]
//! 2. **User file** — `~/.beacon/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `BEACON_*` overrides (highest priority)
//!
//! Settings are handed to the hub explicitly; there is no process-wide
//! singleton.
//!
//! # Usage
//!
//! ```no_run
//! let settings = beacon_settings::load_settings().unwrap_or_default();
//! println!("stream base: {}", settings.stream.base_url);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = BeaconSettings::default();
        let _path = settings_path();
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = BeaconSettings::default();
        assert_eq!(settings.stream.path, "/api/notifications/stream");
        assert_eq!(settings.reconnect.base_delay_ms, 3_000);
        assert_eq!(settings.reconnect.max_delay_ms, 120_000);
        assert_eq!(settings.breaker.failure_threshold, 3);
        assert_eq!(settings.breaker.cooldown_ms, 300_000);
        assert_eq!(settings.breaker.max_open_cycles, 3);
        assert!(settings.validate().is_ok());
    }
}
