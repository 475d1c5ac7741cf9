//! Client construction errors.

use beacon_settings::SettingsError;
use beacon_stream::StreamError;

/// Errors from building a [`NotificationHub`](crate::NotificationHub).
///
/// Once a hub exists nothing it does returns an error; stream failures are
/// reported through connectivity, alerts and stop reasons instead.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Settings failed validation.
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),

    /// The HTTP client could not be built.
    #[error("stream setup failed: {0}")]
    Stream(#[from] StreamError),
}

/// Result type alias for client construction.
pub type Result<T> = std::result::Result<T, ClientError>;
