//! Execution isolation: a counting limiter with a bounded wait queue per command key.

mod bulkhead;

pub use bulkhead::*;
