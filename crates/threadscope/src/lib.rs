//! threadscope - scoped, thread-isolated value carrier
//!
//! A [`Carrier`] passes a value down the call stack without threading it
//! through every function signature in between:
//!
//! ```rust
//! use threadscope::Carrier;
//!
//! static REQUEST_ID: Carrier<u64> = Carrier::new();
//!
//! fn handle() -> u64 {
//!     log_line()
//! }
//!
//! fn log_line() -> u64 {
//!     REQUEST_ID.get().unwrap_or(0)
//! }
//!
//! let seen = REQUEST_ID.provide(7, handle).unwrap();
//! assert_eq!(seen, 7);
//! assert!(!REQUEST_ID.is_provided());
//! ```
//!
//! # Rules
//!
//! - A value is visible only on the thread that provided it, only while the
//!   `provide` call is running.
//! - Providing twice on the same carrier and thread is an error
//!   ([`CarrierError::AlreadyProvided`]); values do not stack.
//! - The value is released when the block returns or panics.
//! - [`Carrier::origin_of_provide`] reports where the active value came
//!   from, for debugging unexpected state.
//! - [`unchecked::Unchecked`] bypasses all of the above and must be imported
//!   explicitly.
//!
//! # Async code
//!
//! Isolation is per OS thread. A value provided before an `.await` is not
//! guaranteed to be visible after it: a work-stealing executor may resume
//! the task on a different thread, and other tasks polled on the same thread
//! in between will see the value. Keep `provide` blocks free of suspension
//! points.

pub mod carrier;
mod slots;
pub mod unchecked;

pub use carrier::Carrier;
pub use threadscope_core::{
    CaptureMode, CarrierConfig, CarrierError, CarrierResult, ConfigError, Frame, Origin, VERSION,
};
