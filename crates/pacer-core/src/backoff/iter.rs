//! Iterator and stream adapters over a backoff sequence.

use super::exponential::{ExponentialBackoff, Step};
use futures::stream::{self, Stream, StreamExt};
use std::iter::FusedIterator;

/// Blocking iterator over the remaining steps of an [`ExponentialBackoff`].
///
/// Each call to `next` performs one [`ExponentialBackoff::step_blocking`].
/// The iterator ends once the sequence is exhausted; it starts over only after
/// the sequence is reset.
///
/// # Examples
///
/// ```rust
/// use pacer_core::backoff::ExponentialBackoff;
/// use std::time::Duration;
///
/// let mut backoff = ExponentialBackoff::builder()
///     .base_delay(Duration::from_millis(1))
///     .max_retries(3)
///     .build()
///     .unwrap();
///
/// let attempts: Vec<u32> = backoff.iter().map(|step| step.attempt).collect();
/// assert_eq!(attempts, vec![1, 2, 3]);
/// ```
#[derive(Debug)]
pub struct Iter<'a> {
    backoff: &'a mut ExponentialBackoff,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(backoff: &'a mut ExponentialBackoff) -> Self {
        Self { backoff }
    }
}

impl Iterator for Iter<'_> {
    type Item = Step;

    fn next(&mut self) -> Option<Self::Item> {
        match self.backoff.step_blocking() {
            Ok(step) => Some(step),
            Err(err) => {
                debug_assert!(err.is_exhausted());
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.backoff.remaining() as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl FusedIterator for Iter<'_> {}

impl ExponentialBackoff {
    /// Stream over the remaining steps, sleeping on the tokio timer between
    /// items.
    ///
    /// The stream is not `Unpin`; pin it before polling.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use futures::StreamExt;
    /// use pacer_core::backoff::ExponentialBackoff;
    /// use std::time::Duration;
    ///
    /// # async fn example() {
    /// let mut backoff = ExponentialBackoff::builder()
    ///     .base_delay(Duration::from_millis(10))
    ///     .max_retries(3)
    ///     .build()
    ///     .unwrap();
    ///
    /// let mut steps = std::pin::pin!(backoff.stream());
    /// while let Some(step) = steps.next().await {
    ///     println!("retry {} after {:?}", step.attempt, step.delay);
    /// }
    /// # }
    /// ```
    pub fn stream(&mut self) -> impl Stream<Item = Step> + '_ {
        stream::unfold(self, |backoff| async move {
            match backoff.step_suspending().await {
                Ok(step) => Some((step, backoff)),
                Err(_) => None,
            }
        })
        .fuse()
    }
}
