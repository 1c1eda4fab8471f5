//! Serializable backoff configuration.
//!
//! Lets an application keep its reconnect policy alongside the rest of its
//! settings, with delays written as fractional seconds:
//!
//! ```toml
//! base_delay = 0.5
//! max_delay = 60.0
//! factor = 2.0
//! max_retries = 8
//! jitter = true
//! log = "matrix.sync"
//! ```

use crate::backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use crate::error::{BackoffError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff settings as they appear in a configuration file.
///
/// Missing fields take the same defaults as [`ExponentialBackoff::builder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Starting delay, in seconds
    pub base_delay: f64,
    /// Upper bound on any delay, in seconds
    pub max_delay: f64,
    /// Growth per completed step
    pub factor: f64,
    /// Steps before the sequence is exhausted
    pub max_retries: u32,
    /// Add up to +50% random noise to each delay
    pub jitter: bool,
    /// Name recorded on the diagnostics span
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: 1.0,
            max_delay: 300.0,
            factor: 2.0,
            max_retries: 10,
            jitter: false,
            log: None,
        }
    }
}

impl BackoffConfig {
    /// Convert into a builder, so callers can still override the log span.
    ///
    /// # Errors
    ///
    /// [`BackoffError::InvalidConfig`] when a delay is negative, NaN or too large
    /// to represent.
    pub fn to_builder(&self) -> Result<ExponentialBackoffBuilder> {
        let mut builder = ExponentialBackoff::builder()
            .base_delay(seconds("base_delay", self.base_delay)?)
            .max_delay(seconds("max_delay", self.max_delay)?)
            .factor(self.factor)
            .max_retries(self.max_retries)
            .jitter(self.jitter);
        if let Some(log) = &self.log {
            builder = builder.log(log.clone());
        }
        Ok(builder)
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| BackoffError::InvalidConfig(format!("{field} = {value}: {e}")))
}

impl ExponentialBackoff {
    /// Build a sequence from a [`BackoffConfig`], validating it.
    pub fn from_config(config: &BackoffConfig) -> Result<Self> {
        config.to_builder()?.build()
    }
}

impl TryFrom<&BackoffConfig> for ExponentialBackoff {
    type Error = BackoffError;

    fn try_from(config: &BackoffConfig) -> Result<Self> {
        Self::from_config(config)
    }
}
