//! # Event sources
//!
//! [`EventSource`] is the seam between the supervisor and the transport.
//! [`HttpEventSource`] is the production implementation: a chunked
//! `GET {base}/{path}/{account}` with `Accept: text/event-stream`.
//!
//! Status classification happens here, before any body is read:
//!
//! | Status | Result |
//! |---|---|
//! | 2xx | [`NotificationStream`] over the body |
//! | 403 | [`StreamError::Unauthorized`] |
//! | 429 | [`StreamError::RateLimited`] |
//! | other | [`StreamError::Status`] |

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use beacon_core::{AccountId, Notification};
use beacon_settings::StreamSettings;
use futures::Stream;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CACHE_CONTROL, HeaderMap, RETRY_AFTER};
use tracing::debug;

use crate::error::{StreamError, StreamResult};
use crate::frame::decode_notifications;

/// Lazy, non-restartable sequence of parsed notifications from one connection.
///
/// Dropping it aborts the underlying request.
pub type NotificationStream =
    Pin<Box<dyn Stream<Item = Result<Notification, StreamError>> + Send>>;

/// Something that can open an account's notification stream.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open the stream for `account`.
    ///
    /// Resolves once response headers are in; the body is read lazily
    /// through the returned stream.
    async fn open(&self, account: &AccountId) -> StreamResult<NotificationStream>;
}

/// reqwest-backed [`EventSource`].
///
/// Credentials (cookies, auth headers) belong to the [`reqwest::Client`];
/// pass a preconfigured one through [`HttpEventSource::with_client`].
#[derive(Clone, Debug)]
pub struct HttpEventSource {
    client: reqwest::Client,
    settings: StreamSettings,
}

impl HttpEventSource {
    /// Build a source with its own client (connect timeout and user agent
    /// taken from `settings`).
    pub fn new(settings: StreamSettings) -> StreamResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(settings.connect_timeout_ms))
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { client, settings })
    }

    /// Build a source around an existing client.
    pub fn with_client(client: reqwest::Client, settings: StreamSettings) -> Self {
        Self { client, settings }
    }

    /// URL of the stream for `account`.
    pub fn url_for(&self, account: &AccountId) -> String {
        self.settings.url_for(account.as_str())
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn open(&self, account: &AccountId) -> StreamResult<NotificationStream> {
        let url = self.url_for(account);
        debug!(%account, %url, "opening notification stream");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        classify_status(response.status(), response.headers())?;

        let stream = decode_notifications(response.bytes_stream());
        Ok(Box::pin(stream))
    }
}

/// Map a response status onto the stream error taxonomy.
fn classify_status(status: StatusCode, headers: &HeaderMap) -> StreamResult<()> {
    if status.is_success() {
        return Ok(());
    }
    Err(match status {
        StatusCode::FORBIDDEN => StreamError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => StreamError::RateLimited {
            retry_after_ms: parse_retry_after(headers),
        },
        other => StreamError::Status {
            status: other.as_u16(),
        },
    })
}

/// Parse a delta-seconds `Retry-After` header.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    let secs: u64 = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(secs.saturating_mul(1000))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
