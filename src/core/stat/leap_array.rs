use crate::utils::curr_time_millis;
use crate::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const DEFAULT_TIME: u64 = 0;

/// use atomic types to ensure the bucket's internal mutability,
/// otherwise an exclusive Mutex would be necessary on the whole LeapArray
pub trait MetricTrait: fmt::Debug + Default + Send + Sync {
    fn reset(&self);
}

/// BucketWrap represents a slot to record metrics.
/// The scope of time is [start_stamp, start_stamp+bucket_len_ms)
#[derive(Debug, Default)]
pub struct BucketWrap<T: MetricTrait> {
    // The start timestamp of this statistic bucket wrapper.
    start_stamp: AtomicU64,
    // The actual data structure to record the metrics.
    value: T,
}

impl<T: MetricTrait> BucketWrap<T> {
    pub fn new(start_stamp: u64) -> Self {
        BucketWrap {
            start_stamp: AtomicU64::new(start_stamp),
            value: T::default(),
        }
    }

    pub fn start_stamp(&self) -> u64 {
        self.start_stamp.load(Ordering::SeqCst)
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn reset_start_stamp(&self, start_stamp: u64) {
        self.start_stamp.store(start_stamp, Ordering::SeqCst);
    }

    pub fn reset_value(&self) {
        self.value.reset();
    }

    /// A bucket is deprecated once `now` reaches the end of the interval starting at it,
    /// the window covers `(now - interval, now]`.
    pub fn is_deprecated(&self, now: u64, interval: u64) -> bool {
        let start = self.start_stamp.load(Ordering::SeqCst);
        now > start && now - start >= interval
    }
}

/// The BucketWrap leap array,
/// it treats the inner array as a ring.
/// `sample_count` is the number of BucketWrap, `interval_ms` the time span they cover together.
/// For example, bucket_len_ms is 1000ms, interval_ms is 10000ms, so sample_count is 10.
/// Expired buckets are recycled lazily, when a write lands on their slot.
#[derive(Debug)]
pub struct LeapArray<T: MetricTrait> {
    bucket_len_ms: u32,
    sample_count: u32,
    interval_ms: u32,
    pub(crate) array: Vec<Arc<BucketWrap<T>>>,
    // guards the reset of one slot, only taken when the slot is deprecated
    mutex: Vec<Mutex<()>>,
}

impl<T: MetricTrait> LeapArray<T> {
    pub fn new(sample_count: u32, interval_ms: u32) -> Result<Self> {
        if sample_count == 0 || interval_ms == 0 || interval_ms % sample_count != 0 {
            return Err(Error::msg(
                "Invalid sample count or interval_ms. Time span needs to be evenly divided",
            ));
        }
        let mut array = Vec::with_capacity(sample_count as usize);
        let mut mutex = Vec::with_capacity(sample_count as usize);
        for _ in 0..sample_count {
            array.push(Arc::new(BucketWrap::default()));
            mutex.push(Mutex::new(()));
        }
        Ok(LeapArray {
            bucket_len_ms: interval_ms / sample_count,
            sample_count,
            interval_ms,
            array,
            mutex,
        })
    }

    pub fn bucket_len_ms(&self) -> u32 {
        self.bucket_len_ms
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn reset_bucket(&self, idx: usize, start_stamp: u64) {
        self.array[idx].reset_start_stamp(start_stamp);
        self.array[idx].reset_value();
    }

    pub fn current_bucket(&self) -> Result<Arc<BucketWrap<T>>> {
        self.get_bucket_of_time(curr_time_millis())
    }

    pub fn get_bucket_of_time(&self, now: u64) -> Result<Arc<BucketWrap<T>>> {
        let idx = self.time2idx(now) as usize;
        let target_start = self.calculate_start_stamp(now);
        /*
        Get bucket item at given time from the array.
        - (1) Bucket is absent, then just claim it for the target window.
        - (2) Bucket is up-to-date, then just return the bucket.
        - (3) Bucket is deprecated, then reset it under the slot lock.
        */
        let bucket = Arc::clone(&self.array[idx]);
        loop {
            let start = bucket.start_stamp();
            if start == target_start {
                return Ok(bucket);
            } else if start == DEFAULT_TIME || target_start > start {
                /*
                     B0       B1      B2     B3      B4
                ||_______|_______|_______|_______|_______||___
                200     400     600     800     1000    1200  timestamp
                                             ^
                                          time=888
                  slot 3 is either empty or still holds an older window,
                  reset it to [800, 1000) before recording.
                The reset and clean-up operations are not atomic together,
                the slot lock is only taken in this branch and the stamp is re-checked under it,
                so a concurrent writer which already recycled the slot is not wiped out.
                */
                if let Ok(_guard) = self.mutex[idx].try_lock() {
                    let start = bucket.start_stamp();
                    if start == DEFAULT_TIME || target_start > start {
                        bucket.reset_value();
                        bucket.reset_start_stamp(target_start);
                    }
                    continue;
                } else {
                    // another thread is recycling this slot
                    std::thread::yield_now();
                }
            } else {
                return Err(Error::msg("invalid time stamp, cannot find bucket"));
            }
        }
    }

    /// compute the start timestamp of current bucket
    pub(crate) fn calculate_start_stamp(&self, now: u64) -> u64 {
        now - now % (self.bucket_len_ms as u64)
    }

    pub(crate) fn time2idx(&self, now: u64) -> u64 {
        let idx = now / (self.bucket_len_ms as u64);
        idx % (self.sample_count as u64)
    }

    pub fn get_current_values(&self) -> Vec<Arc<BucketWrap<T>>> {
        self.get_valid_values(curr_time_millis())
    }

    ///  Get all BucketWrap between [current time - leap array interval, current time]
    pub fn get_valid_values(&self, now: u64) -> Vec<Arc<BucketWrap<T>>> {
        let mut res = Vec::with_capacity(self.array.len());
        for bucket in &self.array {
            let start = bucket.start_stamp();
            if start != DEFAULT_TIME
                && start <= now
                && !bucket.is_deprecated(now, self.interval_ms as u64)
            {
                res.push(Arc::clone(bucket));
            }
        }
        res
    }

    /// Resets every bucket regardless of its age.
    pub fn reset_all(&self) {
        for (idx, bucket) in self.array.iter().enumerate() {
            let _guard = self.mutex[idx].lock().unwrap();
            bucket.reset_value();
        }
    }
}
