//! Exponential backoff sequence with optional jitter.

use crate::error::{BackoffError, Result};
use std::future::Future;
use std::ops::AsyncFnOnce;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use super::guard::ResetGuard;
use super::iter::Iter;

/// Default name recorded on the diagnostics span when no `log` is configured.
pub const DEFAULT_LOG_NAME: &str = "pacer_core::backoff";

pub(crate) const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub(crate) const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(300);
pub(crate) const DEFAULT_FACTOR: f64 = 2.0;
pub(crate) const DEFAULT_MAX_RETRIES: u32 = 10;

/// Marker returned by a completed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Completed steps since the last reset, including this one
    pub attempt: u32,
    /// How long the step waited
    pub delay: Duration,
}

/// A finite exponential backoff sequence.
///
/// Each step waits for the current delay and then advances the retry count by
/// one. Once `max_retries` steps have completed since the last reset, further
/// steps fail with [`BackoffError::Exhausted`].
///
/// # Mathematical Formula
///
/// For `n` completed retries:
/// ```text
/// value = base_delay * (factor ^ n)
/// value = value + random(0, value / 2)      (only when jitter is enabled)
/// delay = min(value, max_delay)
/// ```
///
/// Jitter is drawn before the clamp, so a jittered delay can be clamped back
/// down to `max_delay`.
///
/// # Examples
///
/// ```rust
/// use pacer_core::backoff::ExponentialBackoff;
/// use std::time::Duration;
///
/// # async fn example() -> pacer_core::error::Result<()> {
/// let mut backoff = ExponentialBackoff::builder()
///     .base_delay(Duration::from_millis(100))
///     .max_retries(3)
///     .build()?;
///
/// while let Ok(step) = backoff.step_suspending().await {
///     // reconnect here, break on success
///     println!("attempt {} after {:?}", step.attempt, step.delay);
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Concurrency
///
/// Steps take `&mut self`, so one instance drives exactly one sequence. Share
/// it between tasks only behind a lock owned by the caller.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    factor: f64,
    max_retries: u32,
    jitter: bool,
    span: Span,
    retries: u32,
}

impl ExponentialBackoff {
    /// Create a new builder for configuring exponential backoff.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pacer_core::backoff::ExponentialBackoff;
    /// use std::time::Duration;
    ///
    /// let backoff = ExponentialBackoff::builder()
    ///     .max_retries(5)
    ///     .base_delay(Duration::from_millis(100))
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder() -> ExponentialBackoffBuilder {
        ExponentialBackoffBuilder::default()
    }

    /// Starting delay.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound on any computed delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Multiplicative growth per completed step.
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Step budget before the sequence is exhausted.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether random noise is added to each delay.
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// Steps completed since the last reset.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Steps left before the sequence is exhausted.
    pub fn remaining(&self) -> u32 {
        self.max_retries.saturating_sub(self.retries)
    }

    /// Whether the next step would signal [`BackoffError::Exhausted`].
    pub fn is_exhausted(&self) -> bool {
        self.retries >= self.max_retries
    }

    /// Span that diagnostics of this sequence are attached to.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Reset the retry count to zero.
    pub fn reset(&mut self) {
        tracing::debug!(
            parent: &self.span,
            from = self.retries,
            "Reset backoff retries to zero"
        );
        self.retries = 0;
    }

    /// The delay the next step would wait for.
    ///
    /// Does not change the retry count. With jitter enabled every call draws
    /// fresh noise, so repeated calls return different values.
    pub fn current_delay(&self) -> Duration {
        let delay = self.compute_delay();
        tracing::debug!(
            parent: &self.span,
            delay_secs = delay.as_secs_f64(),
            base_delay_secs = self.base_delay.as_secs_f64(),
            factor = self.factor,
            retries = self.retries,
            "Current backoff delay"
        );
        delay
    }

    fn compute_delay(&self) -> Duration {
        let exponent = i32::try_from(self.retries).unwrap_or(i32::MAX);
        let mut value = self.base_delay.as_secs_f64() * self.factor.powi(exponent);
        if self.jitter && value.is_finite() {
            value += rand::random::<f64>() * (value / 2.0);
        }

        // value is infinite once factor^n overflows
        if value >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(value)
    }

    fn begin_step(&self) -> Result<Duration> {
        if self.is_exhausted() {
            tracing::debug!(
                parent: &self.span,
                retries = self.retries,
                max_retries = self.max_retries,
                "Backoff exhausted"
            );
            return Err(BackoffError::Exhausted {
                retries: self.retries,
                max_retries: self.max_retries,
            });
        }

        let delay = self.current_delay();
        tracing::debug!(
            parent: &self.span,
            delay_secs = delay.as_secs_f64(),
            "Sleeping before next retry"
        );
        Ok(delay)
    }

    fn complete_step(&mut self, delay: Duration) -> Step {
        self.retries += 1;
        Step {
            attempt: self.retries,
            delay,
        }
    }

    /// Advance the sequence, using `wait` to pass the delay.
    ///
    /// The delay is computed once and handed to `wait`; the retry count only
    /// advances after `wait` returns.
    pub fn step_with<F>(&mut self, wait: F) -> Result<Step>
    where
        F: FnOnce(Duration),
    {
        let delay = self.begin_step()?;
        wait(delay);
        Ok(self.complete_step(delay))
    }

    /// Advance the sequence, awaiting the future returned by `wait`.
    ///
    /// Dropping the returned future before `wait` completes leaves the retry
    /// count untouched.
    pub async fn step_with_async<F, Fut>(&mut self, wait: F) -> Result<Step>
    where
        F: FnOnce(Duration) -> Fut,
        Fut: Future<Output = ()>,
    {
        let delay = self.begin_step()?;
        wait(delay).await;
        Ok(self.complete_step(delay))
    }

    /// Block the current thread for the current delay, then advance.
    ///
    /// # Errors
    ///
    /// [`BackoffError::Exhausted`] once `max_retries` steps have completed.
    pub fn step_blocking(&mut self) -> Result<Step> {
        self.step_with(std::thread::sleep)
    }

    /// Sleep on the tokio timer for the current delay, then advance.
    ///
    /// Cancel it by dropping the future (for example through
    /// `tokio::time::timeout` or `select!`); an aborted wait does not count as
    /// a retry.
    ///
    /// # Errors
    ///
    /// [`BackoffError::Exhausted`] once `max_retries` steps have completed.
    pub async fn step_suspending(&mut self) -> Result<Step> {
        self.step_with_async(tokio::time::sleep).await
    }

    /// Like [`step_suspending`](Self::step_suspending), but aborts the wait
    /// when `token` is cancelled.
    ///
    /// # Errors
    ///
    /// - [`BackoffError::Exhausted`] once `max_retries` steps have completed
    /// - [`BackoffError::Cancelled`] if `token` fires first; the retry count is unchanged
    pub async fn step_cancellable(&mut self, token: &CancellationToken) -> Result<Step> {
        let delay = self.begin_step()?;
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(
                    parent: &self.span,
                    retries = self.retries,
                    "Backoff wait cancelled"
                );
                Err(BackoffError::Cancelled { retries: self.retries })
            }
            _ = tokio::time::sleep(delay) => Ok(self.complete_step(delay)),
        }
    }

    /// Borrow the sequence behind a guard that resets it when dropped.
    ///
    /// The guard dereferences to the sequence and resets it on every exit
    /// path: normal scope end, early `?` return, panic, or a dropped future.
    pub fn guard(&mut self) -> ResetGuard<'_> {
        ResetGuard::new(self)
    }

    /// Run `f` with the sequence and reset it afterwards.
    pub fn scoped<F, T>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Self) -> T,
    {
        let mut guard = self.guard();
        f(&mut *guard)
    }

    /// Run the async closure `f` with the sequence and reset it afterwards,
    /// including when the returned future is dropped early.
    pub async fn scoped_async<F, T>(&mut self, f: F) -> T
    where
        F: AsyncFnOnce(&mut Self) -> T,
    {
        let mut guard = self.guard();
        f(&mut *guard).await
    }

    /// Iterate over the remaining steps, blocking between items.
    pub fn iter(&mut self) -> Iter<'_> {
        Iter::new(self)
    }
}

impl Default for ExponentialBackoff {
    /// Create an exponential backoff with the default settings.
    ///
    /// Defaults:
    /// - `base_delay`: 1s
    /// - `max_delay`: 300s
    /// - `factor`: 2.0
    /// - `max_retries`: 10
    /// - `jitter`: off
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            factor: DEFAULT_FACTOR,
            max_retries: DEFAULT_MAX_RETRIES,
            jitter: false,
            span: log_span(DEFAULT_LOG_NAME),
            retries: 0,
        }
    }
}

impl<'a> IntoIterator for &'a mut ExponentialBackoff {
    type Item = Step;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        Iter::new(self)
    }
}

fn log_span(name: &str) -> Span {
    tracing::debug_span!("backoff", name = %name)
}

#[derive(Debug)]
enum LogTarget {
    Name(String),
    Span(Span),
}

/// Builder for configuring `ExponentialBackoff`.
///
/// # Examples
///
/// ```rust
/// use pacer_core::backoff::ExponentialBackoff;
/// use std::time::Duration;
///
/// let backoff = ExponentialBackoff::builder()
///     .base_delay(Duration::from_secs(1))
///     .max_delay(Duration::from_secs(30))
///     .factor(2.0)
///     .max_retries(5)
///     .jitter(true)
///     .log("matrix.sync")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct ExponentialBackoffBuilder {
    base_delay: Option<Duration>,
    max_delay: Option<Duration>,
    factor: Option<f64>,
    max_retries: Option<u32>,
    jitter: Option<bool>,
    log: Option<LogTarget>,
}

impl ExponentialBackoffBuilder {
    /// Set the starting delay.
    ///
    /// Default: 1s
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Set the maximum delay.
    ///
    /// Default: 300s
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set the growth factor.
    ///
    /// Factors in `(0, 1]` are accepted and give constant or shrinking delays.
    ///
    /// Default: 2.0
    pub fn factor(mut self, factor: f64) -> Self {
        self.factor = Some(factor);
        self
    }

    /// Set the number of steps before the sequence is exhausted.
    ///
    /// Default: 10
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Enable or disable jitter of up to +50% per delay.
    ///
    /// Default: false
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Name recorded on the diagnostics span.
    ///
    /// Events keep the `pacer_core::backoff::exponential` target; the name
    /// is the `name` field of the enclosing `backoff` span. Filter on it with
    /// a span directive such as `RUST_LOG="[backoff{name=matrix.sync}]=debug"`.
    ///
    /// Default: [`DEFAULT_LOG_NAME`]
    pub fn log(mut self, name: impl Into<String>) -> Self {
        self.log = Some(LogTarget::Name(name.into()));
        self
    }

    /// Attach diagnostics to an existing span instead of a named one.
    pub fn log_span(mut self, span: Span) -> Self {
        self.log = Some(LogTarget::Span(span));
        self
    }

    /// Build the `ExponentialBackoff` instance.
    ///
    /// Uses default values for any unset parameters.
    ///
    /// # Errors
    ///
    /// [`BackoffError::InvalidConfig`] when `base_delay` is zero, `max_delay`
    /// is below `base_delay`, or `factor` is not a finite positive number.
    pub fn build(self) -> Result<ExponentialBackoff> {
        let base_delay = self.base_delay.unwrap_or(DEFAULT_BASE_DELAY);
        let max_delay = self.max_delay.unwrap_or(DEFAULT_MAX_DELAY);
        let factor = self.factor.unwrap_or(DEFAULT_FACTOR);

        if base_delay.is_zero() {
            return Err(BackoffError::InvalidConfig(
                "base_delay must be greater than zero".to_string(),
            ));
        }
        if max_delay < base_delay {
            return Err(BackoffError::InvalidConfig(format!(
                "max_delay ({max_delay:?}) must not be less than base_delay ({base_delay:?})"
            )));
        }
        if !factor.is_finite() || factor <= 0.0 {
            return Err(BackoffError::InvalidConfig(format!(
                "factor must be a finite positive number, got {factor}"
            )));
        }

        let span = match self.log {
            Some(LogTarget::Name(name)) => log_span(&name),
            Some(LogTarget::Span(span)) => span,
            None => log_span(DEFAULT_LOG_NAME),
        };

        if factor <= 1.0 {
            tracing::warn!(
                parent: &span,
                factor,
                "Backoff factor <= 1.0 gives non-increasing delays"
            );
        }

        Ok(ExponentialBackoff {
            base_delay,
            max_delay,
            factor,
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            jitter: self.jitter.unwrap_or(false),
            span,
            retries: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn backoff(max_delay: Duration) -> ExponentialBackoff {
        ExponentialBackoff::builder()
            .base_delay(Duration::from_secs(1))
            .max_delay(max_delay)
            .factor(2.0)
            .max_retries(4)
            .build()
            .unwrap()
    }

    #[test]
    fn test_exponential_delay_calculation() {
        let mut backoff = backoff(Duration::from_secs(300));

        let mut delays = Vec::new();
        loop {
            let expected = backoff.current_delay();
            match backoff.step_with(|_| {}) {
                Ok(step) => {
                    assert_eq!(step.delay, expected);
                    delays.push(step.delay);
                }
                Err(err) => {
                    assert!(err.is_exhausted());
                    break;
                }
            }
        }

        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
        assert_eq!(backoff.retries(), 4);
    }

    #[test]
    fn test_max_delay_cap() {
        let mut backoff = backoff(Duration::from_secs(5));
        for _ in 0..3 {
            backoff.step_with(|_| {}).unwrap();
        }

        // 1 * 2^3 = 8s before the clamp
        assert_eq!(backoff.retries(), 3);
        assert_eq!(backoff.current_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_huge_exponent_clamps_to_max_delay() {
        let mut backoff = ExponentialBackoff::builder()
            .factor(1e10)
            .max_retries(u32::MAX)
            .jitter(true)
            .build()
            .unwrap();
        for _ in 0..50 {
            backoff.step_with(|_| {}).unwrap();
        }

        assert_eq!(backoff.current_delay(), DEFAULT_MAX_DELAY);
    }

    #[test]
    fn test_exhausted_leaves_retries_unchanged() {
        let mut backoff = backoff(Duration::from_secs(300));
        for _ in 0..4 {
            backoff.step_with(|_| {}).unwrap();
        }

        let waited = RefCell::new(false);
        let err = backoff.step_with(|_| *waited.borrow_mut() = true).unwrap_err();

        assert_eq!(
            err,
            BackoffError::Exhausted {
                retries: 4,
                max_retries: 4
            }
        );
        assert!(!*waited.borrow());
        assert_eq!(backoff.retries(), 4);
        assert!(backoff.is_exhausted());
    }

    #[test]
    fn test_zero_max_retries_is_exhausted_immediately() {
        let mut backoff = ExponentialBackoff::builder().max_retries(0).build().unwrap();

        assert!(backoff.step_with(|_| {}).unwrap_err().is_exhausted());
        assert_eq!(backoff.retries(), 0);
    }

    #[test]
    fn test_reset_restores_base_delay() {
        let mut backoff = backoff(Duration::from_secs(300));
        for _ in 0..4 {
            backoff.step_with(|_| {}).unwrap();
        }

        backoff.reset();

        assert_eq!(backoff.retries(), 0);
        assert_eq!(backoff.remaining(), 4);
        assert_eq!(backoff.current_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_step_waits_for_computed_delay() {
        let mut backoff = backoff(Duration::from_secs(300));
        backoff.step_with(|_| {}).unwrap();

        let waited = RefCell::new(None);
        let step = backoff
            .step_with(|delay| *waited.borrow_mut() = Some(delay))
            .unwrap();

        assert_eq!(*waited.borrow(), Some(Duration::from_secs(2)));
        assert_eq!(
            step,
            Step {
                attempt: 2,
                delay: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn test_step_blocking_sleeps() {
        let mut backoff = ExponentialBackoff::builder()
            .base_delay(Duration::from_millis(5))
            .max_retries(1)
            .build()
            .unwrap();

        let start = std::time::Instant::now();
        let step = backoff.step_blocking().unwrap();

        assert!(start.elapsed() >= Duration::from_millis(5));
        assert_eq!(step.attempt, 1);
        assert!(backoff.step_blocking().unwrap_err().is_exhausted());
    }

    #[test]
    fn test_jitter_variation() {
        let backoff = ExponentialBackoff::builder()
            .base_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(60))
            .jitter(true)
            .build()
            .unwrap();

        let delays: Vec<_> = (0..20).map(|_| backoff.current_delay()).collect();

        for delay in &delays {
            assert!(
                *delay >= Duration::from_secs(1) && *delay <= Duration::from_millis(1500),
                "Delay with jitter should be in range [1s, 1.5s], got {:?}",
                delay
            );
        }

        let all_same = delays.windows(2).all(|w| w[0] == w[1]);
        assert!(!all_same, "With randomization, delays should vary");
    }

    #[test]
    fn test_jitter_is_clamped_to_max_delay() {
        let backoff = ExponentialBackoff::builder()
            .base_delay(Duration::from_secs(10))
            .max_delay(Duration::from_secs(10))
            .jitter(true)
            .build()
            .unwrap();

        for _ in 0..20 {
            assert_eq!(backoff.current_delay(), Duration::from_secs(10));
        }
    }

    #[test]
    fn test_builder_defaults() {
        let backoff = ExponentialBackoff::builder().build().unwrap();

        assert_eq!(backoff.base_delay(), Duration::from_secs(1));
        assert_eq!(backoff.max_delay(), Duration::from_secs(300));
        assert_eq!(backoff.factor(), 2.0);
        assert_eq!(backoff.max_retries(), 10);
        assert!(!backoff.jitter());
        assert_eq!(backoff.retries(), 0);

        let default = ExponentialBackoff::default();
        assert_eq!(default.base_delay(), backoff.base_delay());
        assert_eq!(default.max_retries(), backoff.max_retries());
    }

    #[test]
    fn test_builder_rejects_invalid_values() {
        let zero_base = ExponentialBackoff::builder()
            .base_delay(Duration::ZERO)
            .build();
        assert!(matches!(zero_base, Err(BackoffError::InvalidConfig(_))));

        let inverted = ExponentialBackoff::builder()
            .base_delay(Duration::from_secs(10))
            .max_delay(Duration::from_secs(5))
            .build();
        assert!(matches!(inverted, Err(BackoffError::InvalidConfig(_))));

        for factor in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            let result = ExponentialBackoff::builder().factor(factor).build();
            assert!(
                matches!(result, Err(BackoffError::InvalidConfig(_))),
                "factor {factor} should be rejected"
            );
        }
    }

    #[test]
    fn test_non_increasing_factor_is_accepted() {
        let mut backoff = ExponentialBackoff::builder()
            .base_delay(Duration::from_secs(4))
            .factor(0.5)
            .max_retries(3)
            .build()
            .unwrap();

        backoff.step_with(|_| {}).unwrap();
        assert_eq!(backoff.current_delay(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_suspending_advances_virtual_time() {
        let mut backoff = backoff(Duration::from_secs(300));

        let start = tokio::time::Instant::now();
        for expected in [1, 2, 4, 8] {
            let step = backoff.step_suspending().await.unwrap();
            assert_eq!(step.delay, Duration::from_secs(expected));
        }

        assert_eq!(start.elapsed(), Duration::from_secs(15));
        assert!(backoff.step_suspending().await.unwrap_err().is_exhausted());
        assert_eq!(backoff.retries(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_suspending_is_pending_until_delay_elapses() {
        let mut backoff = backoff(Duration::from_secs(300));

        {
            let mut step = tokio_test::task::spawn(backoff.step_suspending());
            tokio_test::assert_pending!(step.poll());

            tokio::time::advance(Duration::from_millis(999)).await;
            tokio_test::assert_pending!(step.poll());

            tokio::time::advance(Duration::from_millis(1)).await;
            let step = tokio_test::assert_ready_ok!(step.poll());
            assert_eq!(step.attempt, 1);
        }

        assert_eq!(backoff.retries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_wait_does_not_count() {
        let mut backoff = backoff(Duration::from_secs(300));

        let result =
            tokio::time::timeout(Duration::from_millis(500), backoff.step_suspending()).await;

        assert!(result.is_err());
        assert_eq!(backoff.retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_token_aborts_wait() {
        let mut backoff = backoff(Duration::from_secs(300));
        backoff.step_suspending().await.unwrap();

        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = backoff.step_cancellable(&token).await.unwrap_err();

        assert_eq!(err, BackoffError::Cancelled { retries: 1 });
        assert_eq!(backoff.retries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellable_step_completes_without_cancel() {
        let mut backoff = backoff(Duration::from_secs(300));
        let token = CancellationToken::new();

        let step = backoff.step_cancellable(&token).await.unwrap();

        assert_eq!(step.attempt, 1);
        assert_eq!(backoff.retries(), 1);
    }
}
