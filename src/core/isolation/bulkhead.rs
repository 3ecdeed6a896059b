use crate::base::CommandKey;
use crate::command::CommandConfig;
use crate::{logging, utils};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

/// `BulkheadMetrics` is a point-in-time view of a bulkhead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkheadMetrics {
    pub max_concurrency: u32,
    pub queue_capacity: u32,
    /// permits acquired and not yet released
    pub active: u32,
    /// callers waiting for a permit
    pub queued: u32,
}

#[derive(Debug)]
struct BulkheadState {
    active: u32,
    queued: u32,
    max_concurrency: u32,
    queue_capacity: u32,
    queue_timeout_ms: u64,
}

/// `Bulkhead` bounds how many attempts of one command key run at the same time.
/// Callers above `max_concurrency` may wait in a queue of `queue_capacity` slots
/// for at most `queue_timeout_ms`, the rest are rejected at once.
pub struct Bulkhead {
    key: CommandKey,
    state: Mutex<BulkheadState>,
    permit_available: Condvar,
}

impl fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bulkhead")
            .field("key", &self.key)
            .field("metrics", &self.metrics())
            .finish()
    }
}

impl Bulkhead {
    pub fn new(key: CommandKey, config: &CommandConfig) -> Self {
        Bulkhead {
            key,
            state: Mutex::new(BulkheadState {
                active: 0,
                queued: 0,
                max_concurrency: config.max_concurrency,
                queue_capacity: config.queue_capacity,
                queue_timeout_ms: config.queue_timeout_ms,
            }),
            permit_available: Condvar::new(),
        }
    }

    pub fn key(&self) -> &CommandKey {
        &self.key
    }

    /// `acquire` returns a permit, or `None` when the attempt must be rejected.
    /// The permit goes back to the bulkhead when it is dropped.
    pub fn acquire(self: &Arc<Self>) -> Option<Permit> {
        let mut state = self.state.lock().unwrap();
        if state.active < state.max_concurrency {
            state.active += 1;
            return Some(Permit::new(Arc::clone(self)));
        }
        if state.queued >= state.queue_capacity {
            logging::debug!(
                "[Bulkhead] {} rejected, active: {}, queued: {}",
                self.key,
                state.active,
                state.queued
            );
            return None;
        }

        let deadline = utils::deadline_after_ms(state.queue_timeout_ms);
        state.queued += 1;
        loop {
            if state.active < state.max_concurrency {
                state.queued -= 1;
                state.active += 1;
                return Some(Permit::new(Arc::clone(self)));
            }
            let now = Instant::now();
            if now >= deadline {
                state.queued -= 1;
                logging::debug!("[Bulkhead] {} rejected after waiting in queue", self.key);
                return None;
            }
            let (guard, _) = self
                .permit_available
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = guard;
        }
    }

    fn release(&self) {
        let mut state = self.state.lock().unwrap();
        state.active = state.active.saturating_sub(1);
        drop(state);
        self.permit_available.notify_one();
    }

    /// `update` applies new limits. Permits already handed out are never revoked,
    /// new acquisitions wait until the count drops under a lowered limit.
    pub fn update(&self, config: &CommandConfig) {
        let mut state = self.state.lock().unwrap();
        let grown = config.max_concurrency > state.max_concurrency;
        state.max_concurrency = config.max_concurrency;
        state.queue_capacity = config.queue_capacity;
        state.queue_timeout_ms = config.queue_timeout_ms;
        drop(state);
        if grown {
            self.permit_available.notify_all();
        }
    }

    pub fn metrics(&self) -> BulkheadMetrics {
        let state = self.state.lock().unwrap();
        BulkheadMetrics {
            max_concurrency: state.max_concurrency,
            queue_capacity: state.queue_capacity,
            active: state.active,
            queued: state.queued,
        }
    }
}

/// `Permit` is one unit of bulkhead capacity, held for the lifetime of one attempt.
#[derive(Debug)]
pub struct Permit {
    bulkhead: Arc<Bulkhead>,
}

impl Permit {
    fn new(bulkhead: Arc<Bulkhead>) -> Self {
        Permit { bulkhead }
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.bulkhead.release();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::Rng;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;
    use std::time::Duration;

    fn bulkhead(max_concurrency: u32, queue_capacity: u32, queue_timeout_ms: u64) -> Arc<Bulkhead> {
        Arc::new(Bulkhead::new(
            "remote".into(),
            &CommandConfig {
                max_concurrency,
                queue_capacity,
                queue_timeout_ms,
                ..Default::default()
            },
        ))
    }

    #[test]
    fn acquire_and_release() {
        let bulkhead = bulkhead(2, 0, 0);
        let first = bulkhead.acquire().unwrap();
        let second = bulkhead.acquire().unwrap();
        assert_eq!(bulkhead.metrics().active, 2);
        assert!(bulkhead.acquire().is_none());
        drop(first);
        assert_eq!(bulkhead.metrics().active, 1);
        let third = bulkhead.acquire();
        assert!(third.is_some());
        drop(second);
        drop(third);
        assert_eq!(bulkhead.metrics().active, 0);
    }

    #[test]
    fn queued_waiter_gets_released_permit() {
        let bulkhead = bulkhead(1, 1, 1000);
        let permit = bulkhead.acquire().unwrap();
        let waiter = thread::spawn({
            let bulkhead = Arc::clone(&bulkhead);
            move || bulkhead.acquire().is_some()
        });
        while bulkhead.metrics().queued == 0 {
            thread::yield_now();
        }
        // the queue is full, no waiting for this one
        let start = Instant::now();
        assert!(bulkhead.acquire().is_none());
        assert!(start.elapsed() < Duration::from_millis(100));

        drop(permit);
        assert!(waiter.join().unwrap());
        assert_eq!(bulkhead.metrics(), BulkheadMetrics {
            max_concurrency: 1,
            queue_capacity: 1,
            active: 0,
            queued: 0,
        });
    }

    #[test]
    fn unbounded_queue_wait() {
        let bulkhead = bulkhead(1, 1, u64::MAX);
        let permit = bulkhead.acquire().unwrap();
        let waiter = thread::spawn({
            let bulkhead = Arc::clone(&bulkhead);
            move || bulkhead.acquire().is_some()
        });
        while bulkhead.metrics().queued == 0 {
            thread::yield_now();
        }
        thread::sleep(Duration::from_millis(10));
        assert_eq!(bulkhead.metrics().queued, 1);
        drop(permit);
        assert!(waiter.join().unwrap());
        assert_eq!(bulkhead.metrics().queued, 0);
    }

    #[test]
    fn queue_wait_elapses() {
        let bulkhead = bulkhead(1, 1, 30);
        let _permit = bulkhead.acquire().unwrap();
        let start = Instant::now();
        assert!(bulkhead.acquire().is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(bulkhead.metrics().queued, 0);
    }

    #[test]
    fn update_limits() {
        let bulkhead = bulkhead(1, 1, 1000);
        let permit = bulkhead.acquire().unwrap();
        let waiter = thread::spawn({
            let bulkhead = Arc::clone(&bulkhead);
            move || bulkhead.acquire()
        });
        while bulkhead.metrics().queued == 0 {
            thread::yield_now();
        }
        bulkhead.update(&CommandConfig {
            max_concurrency: 2,
            queue_capacity: 1,
            ..Default::default()
        });
        let second = waiter.join().unwrap();
        assert!(second.is_some());
        assert_eq!(bulkhead.metrics().active, 2);

        // lowering the limit does not revoke permits
        bulkhead.update(&CommandConfig {
            max_concurrency: 1,
            queue_capacity: 0,
            ..Default::default()
        });
        assert_eq!(bulkhead.metrics().active, 2);
        drop(permit);
        assert!(bulkhead.acquire().is_none());
        drop(second);
        assert!(bulkhead.acquire().is_some());
    }

    #[test]
    fn concurrency_never_exceeds_limit() {
        const MAX_CONCURRENCY: u32 = 4;
        let bulkhead = bulkhead(MAX_CONCURRENCY, 8, 5);
        let in_flight = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for _ in 0..64 {
            let bulkhead = Arc::clone(&bulkhead);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            handles.push(thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..20 {
                    if let Some(permit) = bulkhead.acquire() {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        assert!(bulkhead.metrics().active <= MAX_CONCURRENCY);
                        thread::sleep(Duration::from_micros(rng.gen_range(0..500)));
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        drop(permit);
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= MAX_CONCURRENCY);
        assert_eq!(bulkhead.metrics().active, 0);
        assert_eq!(bulkhead.metrics().queued, 0);
    }
}
