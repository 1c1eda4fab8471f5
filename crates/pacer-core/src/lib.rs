#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Exponential backoff sequences for reconnect and retry loops.
//!
//! This crate provides a single retry-timing primitive, [`ExponentialBackoff`]:
//!
//! - **Blocking and async steps** via `step_blocking` and `step_suspending`
//!   - Exponential growth with an upper clamp
//!   - Optional jitter of up to +50%
//!   - Token-based cancellation that never counts an aborted wait
//! - **Scoped reset** via [`ResetGuard`], `scoped` and `scoped_async`
//! - **Iteration** via `Iterator` and `futures::Stream`
//! - **File configuration** via the serde-enabled [`BackoffConfig`]
//!
//! It does no I/O of its own: callers decide what to retry and when to stop
//! early.
//!
//! # Examples
//!
//! Using the prelude for convenient imports:
//!
//! ```rust
//! use pacer_core::prelude::*;
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoff::builder()
//!     .base_delay(Duration::from_millis(1))
//!     .max_retries(3)
//!     .build()
//!     .unwrap();
//!
//! for step in backoff.iter() {
//!     // try again here
//!     assert!(step.delay <= Duration::from_millis(4));
//! }
//! assert!(backoff.step_blocking().unwrap_err().is_exhausted());
//! ```
//!
//! [`ExponentialBackoff`]: backoff::ExponentialBackoff
//! [`ResetGuard`]: backoff::ResetGuard
//! [`BackoffConfig`]: config::BackoffConfig

pub mod backoff;
pub mod config;
pub mod deprecation;
pub mod error;

/// Convenient re-exports of commonly used items.
///
/// Import all core abstractions with:
///
/// ```rust
/// use pacer_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::backoff::{ExponentialBackoff, ExponentialBackoffBuilder, ResetGuard, Step};
    pub use crate::config::BackoffConfig;
    pub use crate::deprecation::Deprecation;
    pub use crate::error::{BackoffError, Result};
}
