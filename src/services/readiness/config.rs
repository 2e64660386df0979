use std::time::Duration;

use super::types::ConfigError;

pub const DEFAULT_MAX_WAIT_SECS: f64 = 120.0;
pub const DEFAULT_RETRY_INTERVAL_SECS: f64 = 5.0;
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);
/// Shortest retry interval that leaves room for a non-zero attempt timeout
pub const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(2);

/// Time budgets for one poll session
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Total time allowed for the target to become ready
    pub max_wait: Duration,
    /// Delay between the end of one attempt and the start of the next
    pub retry_interval: Duration,
    /// Upper bound on a single probe; always below `retry_interval`
    pub attempt_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        let retry_interval = Duration::from_secs_f64(DEFAULT_RETRY_INTERVAL_SECS);
        Self {
            max_wait: Duration::from_secs_f64(DEFAULT_MAX_WAIT_SECS),
            retry_interval,
            attempt_timeout: default_attempt_timeout(retry_interval),
        }
    }
}

impl PollConfig {
    pub fn new(max_wait: Duration, retry_interval: Duration) -> Result<Self, ConfigError> {
        let config = Self {
            max_wait,
            retry_interval,
            attempt_timeout: default_attempt_timeout(retry_interval),
        };
        config.validate()?;
        Ok(config)
    }

    /// Build from decimal seconds as given on the command line.
    ///
    /// Zero, negative and NaN values are rejected as non-positive. Positive
    /// values that `Duration` cannot hold are rejected as out of range.
    pub fn from_secs(
        max_wait: f64,
        retry_interval: f64,
        attempt_timeout: Option<f64>,
    ) -> Result<Self, ConfigError> {
        let max_wait = seconds("Maximum wait", max_wait, ConfigError::NonPositiveMaxWait)?;
        let retry_interval = seconds("Retry interval", retry_interval, ConfigError::NonPositiveRetryInterval)?;

        let config = Self::new(max_wait, retry_interval)?;
        match attempt_timeout {
            Some(secs) => {
                let timeout = seconds("Attempt timeout", secs, ConfigError::NonPositiveAttemptTimeout)?;
                config.with_attempt_timeout(timeout)
            }
            None => Ok(config),
        }
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Result<Self, ConfigError> {
        self.attempt_timeout = attempt_timeout;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_wait.is_zero() {
            return Err(ConfigError::NonPositiveMaxWait(0.0));
        }
        if self.retry_interval.is_zero() {
            return Err(ConfigError::NonPositiveRetryInterval(0.0));
        }
        if self.retry_interval < MIN_RETRY_INTERVAL {
            return Err(ConfigError::RetryIntervalTooShort(self.retry_interval));
        }
        if self.attempt_timeout.is_zero() {
            return Err(ConfigError::NonPositiveAttemptTimeout(0.0));
        }
        if self.attempt_timeout >= self.retry_interval {
            return Err(ConfigError::AttemptTimeoutTooLong {
                attempt_timeout: self.attempt_timeout,
                retry_interval: self.retry_interval,
            });
        }
        Ok(())
    }

    /// Attempts made against a target that fails instantly; slower failures
    /// make fewer
    pub fn max_attempts(&self) -> u64 {
        let ratio = self.max_wait.as_secs_f64() / self.retry_interval.as_secs_f64();
        (ratio.ceil() as u64).max(1)
    }
}

/// Half the retry interval, capped at `DEFAULT_ATTEMPT_TIMEOUT`
pub fn default_attempt_timeout(retry_interval: Duration) -> Duration {
    (retry_interval / 2).min(DEFAULT_ATTEMPT_TIMEOUT)
}

fn seconds(
    name: &'static str,
    secs: f64,
    non_positive: fn(f64) -> ConfigError,
) -> Result<Duration, ConfigError> {
    if secs.is_nan() || secs <= 0.0 {
        return Err(non_positive(secs));
    }
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or(ConfigError::OutOfRange { name, secs })
}
