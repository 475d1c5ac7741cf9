//! # beacon-core
//!
//! Foundation types shared by every Beacon crate:
//!
//! - **Event record**: [`Notification`] with the closed [`NotificationKind`] sum type
//! - **Branded IDs**: [`AccountId`] and [`ContextId`] newtypes
//! - **Backoff math**: [`retry::calculate_backoff_delay`] and [`ReconnectPolicy`]
//! - **Error taxonomy**: [`errors::ErrorCategory`] used for logging and retry decisions
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` stack

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod ids;
pub mod logging;
pub mod retry;
pub mod text;

pub use errors::ErrorCategory;
pub use events::{Notification, NotificationKind, OperationKind, Severity};
pub use ids::{AccountId, ContextId};
pub use retry::ReconnectPolicy;
