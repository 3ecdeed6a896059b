use crate::base::constant::*;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// `CommandConfig` holds the tunables of one command key.
/// All of them can be changed at runtime through `CommandRegistry::register_command`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// `timeout_ms` is the deadline of `work`, measured from the moment the bulkhead permit is acquired.
    pub timeout_ms: u64,
    /// `max_concurrency` is the number of bulkhead permits.
    pub max_concurrency: u32,
    /// `queue_capacity` is the number of callers allowed to wait for a permit, 0 disables queueing.
    pub queue_capacity: u32,
    /// `queue_timeout_ms` bounds how long a queued caller waits before it is rejected.
    pub queue_timeout_ms: u64,
    /// `rolling_window_ms` is the time span covered by the metrics window.
    pub rolling_window_ms: u32,
    /// `rolling_window_buckets` is the bucket count of the metrics window.
    /// The following must be true: `rolling_window_ms % rolling_window_buckets == 0`.
    pub rolling_window_buckets: u32,
    /// `error_threshold_percentage` is the error percentage (0-100) at or above which the breaker opens.
    pub error_threshold_percentage: u32,
    /// `min_request_volume` is the minimum number of requests in the window
    /// before the breaker is allowed to open.
    pub min_request_volume: u64,
    /// `sleep_window_ms` is how long the breaker stays open before one probe is let through.
    pub sleep_window_ms: u64,
    /// `force_open` short-circuits every request.
    pub force_open: bool,
    /// `force_closed` admits every request, outcomes are still recorded.
    pub force_closed: bool,
}

impl Default for CommandConfig {
    fn default() -> Self {
        CommandConfig {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_timeout_ms: DEFAULT_QUEUE_TIMEOUT_MS,
            rolling_window_ms: DEFAULT_ROLLING_WINDOW_MS,
            rolling_window_buckets: DEFAULT_ROLLING_WINDOW_BUCKETS,
            error_threshold_percentage: DEFAULT_ERROR_THRESHOLD_PERCENTAGE,
            min_request_volume: DEFAULT_MIN_REQUEST_VOLUME,
            sleep_window_ms: DEFAULT_SLEEP_WINDOW_MS,
            force_open: false,
            force_closed: false,
        }
    }
}

impl CommandConfig {
    pub fn is_valid(&self) -> crate::Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::msg("invalid timeout_ms"));
        }
        if self.max_concurrency == 0 {
            return Err(Error::msg("invalid max_concurrency"));
        }
        if self.rolling_window_ms == 0 {
            return Err(Error::msg("invalid rolling_window_ms"));
        }
        if self.rolling_window_buckets == 0 {
            return Err(Error::msg("invalid rolling_window_buckets"));
        }
        if self.rolling_window_ms % self.rolling_window_buckets != 0 {
            return Err(Error::msg(format!(
                "rolling_window_ms {} is not evenly divided by rolling_window_buckets {}",
                self.rolling_window_ms, self.rolling_window_buckets
            )));
        }
        if self.error_threshold_percentage > 100 {
            return Err(Error::msg(
                "invalid error_threshold_percentage (valid range: [0, 100])",
            ));
        }
        if self.sleep_window_ms == 0 {
            return Err(Error::msg("invalid sleep_window_ms"));
        }
        if self.force_open && self.force_closed {
            return Err(Error::msg("force_open and force_closed are mutually exclusive"));
        }
        Ok(())
    }

    /// `is_stat_reusable` checks whether the metrics window built for `other` can be kept.
    pub fn is_stat_reusable(&self, other: &Self) -> bool {
        self.rolling_window_ms == other.rolling_window_ms
            && self.rolling_window_buckets == other.rolling_window_buckets
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Display for CommandConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CommandConfig{{timeout_ms={}, max_concurrency={}, queue_capacity={}, queue_timeout_ms={}, \
             rolling_window_ms={}, rolling_window_buckets={}, error_threshold_percentage={}, \
             min_request_volume={}, sleep_window_ms={}, force_open={}, force_closed={}}}",
            self.timeout_ms,
            self.max_concurrency,
            self.queue_capacity,
            self.queue_timeout_ms,
            self.rolling_window_ms,
            self.rolling_window_buckets,
            self.error_threshold_percentage,
            self.min_request_volume,
            self.sleep_window_ms,
            self.force_open,
            self.force_closed
        )
    }
}
