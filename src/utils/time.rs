use lazy_static::lazy_static;
use time::{macros::format_description, Duration, OffsetDateTime};

lazy_static! {
    static ref UNIX_TIME_UNIT_OFFSET: i128 = (Duration::MILLISECOND / Duration::NANOSECOND) as i128;
}

#[inline]
pub fn sleep_for_ms(ms: u64) {
    std::thread::sleep(std::time::Duration::from_millis(ms));
}

/// `deadline_after_ms` is now plus `ms`, capped for timeouts too large for `Instant`.
pub fn deadline_after_ms(ms: u64) -> std::time::Instant {
    let now = std::time::Instant::now();
    now.checked_add(std::time::Duration::from_millis(ms))
        .or_else(|| now.checked_add(std::time::Duration::from_secs(u32::MAX as u64)))
        .unwrap_or(now)
}

/// Wall-clock milliseconds since the unix epoch, used to place outcomes into time buckets
/// and to stamp execution events.
#[inline]
pub fn curr_time_millis() -> u64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / (*UNIX_TIME_UNIT_OFFSET)) as u64
}

#[inline]
pub fn milli2nano<T: Into<i128>>(t: T) -> i128 {
    *UNIX_TIME_UNIT_OFFSET * t.into()
}

/// Formats a millisecond timestamp as `hour:minute:second.millis`, falls back to the raw number
/// for timestamps out of range.
pub fn format_time_millis(ts_millis: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(milli2nano(ts_millis))
        .ok()
        .and_then(|t| {
            t.format(format_description!(
                "[hour]:[minute]:[second].[subsecond digits:3]"
            ))
            .ok()
        })
        .unwrap_or_else(|| ts_millis.to_string())
}
