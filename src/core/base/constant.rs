// default command settings
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_MAX_CONCURRENCY: u32 = 10;
pub const DEFAULT_QUEUE_CAPACITY: u32 = 0;
pub const DEFAULT_QUEUE_TIMEOUT_MS: u64 = 1000;

// default 10s (total length), 10 buckets of 1s
pub const DEFAULT_ROLLING_WINDOW_MS: u32 = 10000;
pub const DEFAULT_ROLLING_WINDOW_BUCKETS: u32 = 10;

pub const DEFAULT_ERROR_THRESHOLD_PERCENTAGE: u32 = 50;
pub const DEFAULT_MIN_REQUEST_VOLUME: u64 = 20;
pub const DEFAULT_SLEEP_WINDOW_MS: u64 = 5000;

pub const WORKER_THREAD_PREFIX: &str = "bulwark";

// events waiting for delivery to the notifiers of one registry, newer events are dropped beyond it
pub const EVENT_QUEUE_CAPACITY: usize = 1024;
