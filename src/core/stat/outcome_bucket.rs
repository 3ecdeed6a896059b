use super::MetricTrait;
use crate::base::Outcome;
use enum_map::EnumMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// OutcomeBucket records the outcomes of executions in one time bucket.
/// Note that all operations of the OutcomeBucket are required to be thread-safe.
#[derive(Debug, Default)]
pub struct OutcomeBucket {
    // EnumMap should work as fast as arrays
    counter: EnumMap<Outcome, AtomicU64>,
}

impl MetricTrait for OutcomeBucket {
    fn reset(&self) {
        for (_, item) in &self.counter {
            item.store(0, Ordering::SeqCst);
        }
    }
}

impl OutcomeBucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, outcome: Outcome, count: u64) {
        self.counter[outcome].fetch_add(count, Ordering::SeqCst);
    }

    pub fn get(&self, outcome: Outcome) -> u64 {
        self.counter[outcome].load(Ordering::SeqCst)
    }
}
