use super::{LeapArray, OutcomeBucket};
use crate::base::Outcome;
use crate::utils::curr_time_millis;
use crate::{logging, Result};
use enum_map::EnumMap;
use serde::Serialize;
use std::fmt;

/// a specialization of `LeapArray<T>` with `OutcomeBucket`
pub type OutcomeLeapArray = LeapArray<OutcomeBucket>;

/// `HealthSnapshot` aggregates the outcomes of all live buckets of a `MetricsWindow`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthSnapshot {
    /// per-outcome counts, including outcomes which do not count as volume
    pub counts: EnumMap<Outcome, u64>,
    /// SUCCESS + FAILURE + TIMEOUT + REJECTED
    pub total: u64,
    /// FAILURE + TIMEOUT + REJECTED
    pub error_count: u64,
    /// `error_count / total * 100`, 0 when `total` is 0
    pub error_percentage: f64,
}

impl HealthSnapshot {
    fn from_counts(counts: EnumMap<Outcome, u64>) -> Self {
        let mut total = 0;
        let mut error_count = 0;
        for (outcome, count) in &counts {
            if outcome.is_health_volume() {
                total += count;
            }
            if outcome.is_error() {
                error_count += count;
            }
        }
        let error_percentage = if total == 0 {
            0.0
        } else {
            error_count as f64 / total as f64 * 100.0
        };
        HealthSnapshot {
            counts,
            total,
            error_count,
            error_percentage,
        }
    }

    pub fn count(&self, outcome: Outcome) -> u64 {
        self.counts[outcome]
    }
}

impl fmt::Display for HealthSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total: {}, errors: {}, error percentage: {:.2}%",
            self.total, self.error_count, self.error_percentage
        )
    }
}

/// `MetricsWindow` keeps time-bucketed counters of execution outcomes over a sliding interval.
/// Writers never block each other, counters are atomic per outcome per bucket.
#[derive(Debug)]
pub struct MetricsWindow {
    data: OutcomeLeapArray,
}

impl MetricsWindow {
    pub fn new(bucket_count: u32, interval_ms: u32) -> Result<Self> {
        Ok(MetricsWindow {
            data: LeapArray::new(bucket_count, interval_ms)?,
        })
    }

    pub fn interval_ms(&self) -> u32 {
        self.data.interval_ms()
    }

    pub fn bucket_count(&self) -> u32 {
        self.data.sample_count()
    }

    /// `is_reusable` checks whether the window has the given shape, so that its
    /// accumulated counts can be kept when the configuration changes.
    pub fn is_reusable(&self, bucket_count: u32, interval_ms: u32) -> bool {
        self.bucket_count() == bucket_count && self.interval_ms() == interval_ms
    }

    pub fn record(&self, outcome: Outcome) {
        self.record_with_time(curr_time_millis(), outcome)
    }

    pub fn record_with_time(&self, now: u64, outcome: Outcome) {
        match self.data.get_bucket_of_time(now) {
            Ok(bucket) => bucket.value().add(outcome, 1),
            Err(err) => logging::warn!(
                "[MetricsWindow] Fail to get the bucket of time {}, outcome {} is dropped: {:?}",
                now,
                outcome,
                err
            ),
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        self.snapshot_with_time(curr_time_millis())
    }

    pub fn snapshot_with_time(&self, now: u64) -> HealthSnapshot {
        let mut counts: EnumMap<Outcome, u64> = EnumMap::default();
        for bucket in self.data.get_valid_values(now) {
            for (outcome, count) in counts.iter_mut() {
                *count += bucket.value().get(outcome);
            }
        }
        HealthSnapshot::from_counts(counts)
    }

    /// Clears the accumulated history of every bucket.
    pub fn reset(&self) {
        self.data.reset_all();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;

    const SAMPLE_COUNT: u32 = 10;
    const BUCKET_LEN_MS: u32 = 1000;
    const INTERVAL_MS: u32 = BUCKET_LEN_MS * SAMPLE_COUNT;

    #[test]
    fn empty_snapshot() {
        let window = MetricsWindow::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let snapshot = window.snapshot();
        assert_eq!(snapshot.total, 0);
        assert_eq!(snapshot.error_percentage, 0.0);
    }

    #[test]
    fn error_percentage() {
        let window = MetricsWindow::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1976296040000u64;
        for _ in 0..6 {
            window.record_with_time(now, Outcome::Success);
        }
        window.record_with_time(now + 1000, Outcome::Failure);
        window.record_with_time(now + 2000, Outcome::Timeout);
        window.record_with_time(now + 3000, Outcome::Rejected);
        window.record_with_time(now + 3000, Outcome::Rejected);
        // not part of the health volume
        window.record_with_time(now + 3000, Outcome::ShortCircuited);
        window.record_with_time(now + 3000, Outcome::FallbackSuccess);

        let snapshot = window.snapshot_with_time(now + 3500);
        assert_eq!(snapshot.total, 10);
        assert_eq!(snapshot.error_count, 4);
        assert!((snapshot.error_percentage - 40.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.count(Outcome::ShortCircuited), 1);
        assert_eq!(snapshot.count(Outcome::FallbackSuccess), 1);
    }

    #[test]
    fn rolling() {
        let window = MetricsWindow::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        let now = 1976296040000u64;
        window.record_with_time(now, Outcome::Failure);
        window.record_with_time(now + 5000, Outcome::Success);
        assert_eq!(window.snapshot_with_time(now + 9999).total, 2);
        // the failure ages out of the window
        let snapshot = window.snapshot_with_time(now + INTERVAL_MS as u64 + 1);
        assert_eq!(snapshot.total, 1);
        assert_eq!(snapshot.error_count, 0);
        // a write on the recycled slot starts from zero
        window.record_with_time(now + INTERVAL_MS as u64, Outcome::Success);
        assert_eq!(
            window
                .snapshot_with_time(now + INTERVAL_MS as u64 + 1)
                .count(Outcome::Failure),
            0
        );
    }

    #[test]
    fn reset() {
        let window = MetricsWindow::new(SAMPLE_COUNT, INTERVAL_MS).unwrap();
        for _ in 0..5 {
            window.record(Outcome::Failure);
        }
        assert_eq!(window.snapshot().error_count, 5);
        window.reset();
        assert_eq!(window.snapshot().total, 0);
    }

    #[test]
    fn concurrent() {
        let window = Arc::new(MetricsWindow::new(SAMPLE_COUNT, INTERVAL_MS).unwrap());
        let now = 1976296040000u64;
        let counter = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::new();
        for _ in 0..3000 {
            handles.push(thread::spawn({
                let window = window.clone();
                let counter = counter.clone();
                move || {
                    let timestamp = rand::random::<u64>() % INTERVAL_MS as u64;
                    window.record_with_time(now + timestamp, Outcome::Success);
                    window.record_with_time(now + timestamp, Outcome::Failure);
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3000);
        let snapshot = window.snapshot_with_time(now + INTERVAL_MS as u64 - 1);
        assert_eq!(snapshot.count(Outcome::Success), 3000);
        assert_eq!(snapshot.count(Outcome::Failure), 3000);
        assert_eq!(snapshot.total, 6000);
    }
}
