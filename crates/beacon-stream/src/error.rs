//! Stream error taxonomy.

use beacon_core::errors::{ErrorCategory, categorize_status};

/// Result type alias for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors produced while opening or reading an account stream.
///
/// None of these escape the supervisor; they drive breaker and retry
/// decisions and end up in logs.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The request never produced a response (DNS, refused, timeout).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The session is not allowed to read this account's stream (403).
    #[error("not authorized for this stream")]
    Unauthorized,

    /// The backend is rate limiting stream connections (429).
    #[error("rate limited")]
    RateLimited {
        /// `Retry-After` hint, if the server sent one.
        retry_after_ms: Option<u64>,
    },

    /// Any other non-success status.
    #[error("stream request failed with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The response body failed mid-stream.
    #[error("stream body read failed: {message}")]
    Body {
        /// Error description.
        message: String,
    },

    /// Aborted locally by cancellation.
    #[error("stream cancelled")]
    Cancelled,
}

impl StreamError {
    /// Error category for logs.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Http(_) | Self::Body { .. } => ErrorCategory::Network,
            Self::Unauthorized => ErrorCategory::Authorization,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Status { status } => categorize_status(*status),
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    /// Whether this error increments the circuit breaker's failure count.
    ///
    /// Authorization mismatches and local cancellation are not backend
    /// health signals.
    pub fn counts_against_breaker(&self) -> bool {
        !matches!(self, Self::Unauthorized | Self::Cancelled)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
