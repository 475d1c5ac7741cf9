//! # beacon-stream
//!
//! The leader side of Beacon: one long-lived streaming GET per account and
//! everything that keeps it healthy without hammering the backend.
//!
//! - [`frame`]: `data: <json>\n\n` frame decoder tolerant of arbitrary chunk splits
//! - [`source`]: [`EventSource`] trait and the reqwest-backed [`HttpEventSource`]
//! - [`breaker`]: three-state [`CircuitBreaker`] (closed, open, permanently disabled)
//! - [`scheduler`]: [`ReconnectScheduler`] with capped exponential backoff
//! - [`supervisor`]: [`StreamSupervisor`], the connect / read / reconnect loop
//! - [`alert`]: user-facing [`Alert`]s raised by rate limiting and the breaker

#![deny(unsafe_code)]

pub mod alert;
pub mod breaker;
pub mod error;
pub mod frame;
pub mod scheduler;
pub mod source;
pub mod supervisor;

pub use alert::Alert;
pub use breaker::{Admission, BreakerSnapshot, BreakerState, CircuitBreaker, CircuitBreakerConfig, FailureOutcome};
pub use error::{StreamError, StreamResult};
pub use frame::{FrameDecoder, decode_notifications, parse_notification};
pub use scheduler::ReconnectScheduler;
pub use source::{EventSource, HttpEventSource, NotificationStream};
pub use supervisor::{StopReason, StreamSupervisor};
