//! Scoped reset of a backoff sequence.

use super::exponential::ExponentialBackoff;
use std::ops::{Deref, DerefMut};

/// Mutable borrow of an [`ExponentialBackoff`] that resets it on drop.
///
/// Created by [`ExponentialBackoff::guard`]. Keeps a retry loop's counter from
/// leaking into the next, unrelated loop.
///
/// # Examples
///
/// ```rust
/// use pacer_core::backoff::ExponentialBackoff;
/// use std::time::Duration;
///
/// let mut backoff = ExponentialBackoff::builder()
///     .base_delay(Duration::from_millis(1))
///     .max_retries(2)
///     .build()
///     .unwrap();
///
/// {
///     let mut guard = backoff.guard();
///     guard.step_blocking().unwrap();
///     assert_eq!(guard.retries(), 1);
/// }
///
/// assert_eq!(backoff.retries(), 0);
/// ```
#[derive(Debug)]
pub struct ResetGuard<'a> {
    backoff: &'a mut ExponentialBackoff,
}

impl<'a> ResetGuard<'a> {
    pub(crate) fn new(backoff: &'a mut ExponentialBackoff) -> Self {
        Self { backoff }
    }
}

impl Deref for ResetGuard<'_> {
    type Target = ExponentialBackoff;

    fn deref(&self) -> &Self::Target {
        self.backoff
    }
}

impl DerefMut for ResetGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.backoff
    }
}

impl Drop for ResetGuard<'_> {
    fn drop(&mut self) {
        self.backoff.reset();
    }
}
