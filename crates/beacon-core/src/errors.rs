//! Error classification shared across crates.
//!
//! Concrete error enums live next to the code that produces them
//! (`SettingsError`, `StreamError`). They all map onto [`ErrorCategory`]
//! so logs and retry decisions speak one vocabulary.

use serde::{Deserialize, Serialize};

/// Error category for classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The session may not read this stream (403).
    Authorization,
    /// Rate limit exceeded (429).
    RateLimit,
    /// Network connectivity issues or a dropped body.
    Network,
    /// Server-side errors (5xx).
    Server,
    /// Other non-success status (4xx).
    InvalidRequest,
    /// Malformed payload.
    Parse,
    /// Aborted by the local side.
    Cancelled,
    /// Unrecognized error.
    Unknown,
}

impl ErrorCategory {
    /// Whether errors of this category are worth retrying.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Network | Self::Server | Self::InvalidRequest | Self::Unknown
        )
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authorization => write!(f, "authorization"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Network => write!(f, "network"),
            Self::Server => write!(f, "server"),
            Self::InvalidRequest => write!(f, "invalid_request"),
            Self::Parse => write!(f, "parse"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify an HTTP status code.
#[must_use]
pub fn categorize_status(status: u16) -> ErrorCategory {
    match status {
        401 | 403 => ErrorCategory::Authorization,
        429 => ErrorCategory::RateLimit,
        500..=599 => ErrorCategory::Server,
        400..=499 => ErrorCategory::InvalidRequest,
        _ => ErrorCategory::Unknown,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
