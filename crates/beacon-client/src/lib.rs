//! # beacon-client
//!
//! Fan-out side of Beacon. Many contexts in one process can observe the
//! same account while only one upstream connection per account is opened:
//!
//! - [`leader`]: [`LeaderRegistry`] decides which context owns the connection
//! - [`relay`]: [`BroadcastRelay`] carries parsed notifications to followers
//! - [`dispatch`]: [`EventDispatcher`] runs the same local steps for every context
//! - [`lock`]: [`OperationLock`], the advisory cross-device operation flag
//! - [`hub`]: [`NotificationHub`] service object and [`ClientContext`]
//! - [`subscription`]: the [`Subscription`] handle
//!
//! ```no_run
//! # async fn demo() -> beacon_client::Result<()> {
//! let hub = beacon_client::NotificationHub::new(beacon_settings::BeaconSettings::default())?;
//! let tab = hub.open_context();
//! let sub = tab.subscribe(42u64, |n| println!("{}: {}", n.title, n.message));
//! assert!(!sub.operation_lock().is_locked());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod dispatch;
pub mod errors;
pub mod hub;
pub mod leader;
pub mod lock;
pub mod relay;
pub mod subscription;

pub use dispatch::{EventCallback, EventDispatcher};
pub use errors::{ClientError, Result};
pub use hub::{ClientContext, NotificationHub};
pub use leader::{LeaderRegistry, Lease, Role};
pub use lock::{LockState, OperationLock};
pub use relay::{BroadcastRelay, RelayMessage};
pub use subscription::Subscription;

pub use beacon_stream::{Alert, StopReason};
