//! Exponential backoff sequences.
//!
//! # Key Types
//!
//! - [`ExponentialBackoff`] - Stateful backoff sequence with blocking and async steps
//! - [`ExponentialBackoffBuilder`] - Fluent configuration
//! - [`ResetGuard`] - Resets the sequence when it goes out of scope
//! - [`Iter`] - Blocking iterator over the remaining steps
//!
//! # Examples
//!
//! ```rust
//! use pacer_core::backoff::ExponentialBackoff;
//! use std::time::Duration;
//!
//! # async fn connect() -> Result<(), std::io::Error> { Ok(()) }
//! # async fn example() -> pacer_core::error::Result<()> {
//! let mut backoff = ExponentialBackoff::builder()
//!     .base_delay(Duration::from_millis(100))
//!     .max_delay(Duration::from_secs(30))
//!     .jitter(true)
//!     .build()?;
//!
//! let mut guard = backoff.guard();
//! loop {
//!     if connect().await.is_ok() {
//!         break;
//!     }
//!     guard.step_suspending().await?;
//! }
//! # Ok(())
//! # }
//! ```

mod exponential;
mod guard;
mod iter;

pub use exponential::{DEFAULT_LOG_NAME, ExponentialBackoff, ExponentialBackoffBuilder, Step};
pub use guard::ResetGuard;
pub use iter::Iter;
