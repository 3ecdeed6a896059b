use super::*;
use crate::base::{CommandKey, Outcome};
use crate::command::CommandConfig;
use crate::stat::MetricsWindow;
use crate::{logging, utils};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// `CircuitBreaker` gates the attempts of one command key.
/// It exclusively owns the rolling metrics window of that key.
pub struct CircuitBreaker {
    key: CommandKey,
    /// state is the state machine of circuit breaker, encoded by `State::as_u8`
    state: AtomicU8,
    /// next_retry_timestamp_ms is the time circuit breaker could probe
    next_retry_timestamp_ms: AtomicU64,
    stat: RwLock<Arc<MetricsWindow>>,
    listeners: StateChangeListeners,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("key", &self.key)
            .field("state", &self.current_state())
            .field("next_retry_timestamp_ms", &self.next_retry_timestamp_ms())
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(key: CommandKey, stat: MetricsWindow, listeners: StateChangeListeners) -> Self {
        CircuitBreaker {
            key,
            state: AtomicU8::new(State::default().as_u8()),
            next_retry_timestamp_ms: AtomicU64::new(0),
            stat: RwLock::new(Arc::new(stat)),
            listeners,
        }
    }

    pub fn key(&self) -> &CommandKey {
        &self.key
    }

    /// `current_state` returns current state of the circuit breaker.
    #[inline]
    pub fn current_state(&self) -> State {
        State::from_u8(self.state.load(Ordering::SeqCst))
    }

    #[inline]
    pub fn next_retry_timestamp_ms(&self) -> u64 {
        self.next_retry_timestamp_ms.load(Ordering::SeqCst)
    }

    /// `stat` returns the rolling window currently bound to the breaker.
    pub fn stat(&self) -> Arc<MetricsWindow> {
        Arc::clone(&self.stat.read().unwrap())
    }

    /// `replace_stat` binds a new rolling window, the accumulated counts are discarded.
    pub fn replace_stat(&self, stat: MetricsWindow) {
        *self.stat.write().unwrap() = Arc::new(stat);
    }

    pub fn reset_metric(&self) {
        self.stat().reset();
    }

    pub fn retry_timeout_arrived(&self) -> bool {
        utils::curr_time_millis() >= self.next_retry_timestamp_ms()
    }

    fn update_next_retry_timestamp(&self, sleep_window_ms: u64) {
        self.next_retry_timestamp_ms.store(
            utils::curr_time_millis().saturating_add(sleep_window_ms),
            Ordering::SeqCst,
        );
    }

    /// `try_pass` is consulted once per attempt, before any bulkhead capacity is taken.
    /// It never blocks, a denied attempt costs a couple of atomic loads.
    pub fn try_pass(&self, config: &CommandConfig) -> Admission {
        if config.force_open {
            return Admission::Deny;
        }
        if config.force_closed {
            return Admission::Pass;
        }
        match self.current_state() {
            State::Closed => Admission::Pass,
            State::Open => {
                if self.retry_timeout_arrived() && self.from_open_to_half_open() {
                    Admission::Probe
                } else {
                    Admission::Deny
                }
            }
            State::HalfOpen => Admission::Deny,
        }
    }

    /// `record` counts an outcome without evaluating the state machine,
    /// used for short-circuited attempts and fallback outcomes.
    pub fn record(&self, outcome: Outcome) {
        self.stat().record(outcome);
    }

    /// `on_request_complete` records the primary outcome of an admitted attempt
    /// and handles state transformation of the circuit breaker.
    pub fn on_request_complete(&self, outcome: Outcome, admission: Admission, config: &CommandConfig) {
        let stat = self.stat();
        stat.record(outcome);
        match admission {
            Admission::Probe => {
                if outcome == Outcome::Success {
                    self.from_half_open_to_closed();
                } else {
                    self.from_half_open_to_open(config.sleep_window_ms);
                }
            }
            Admission::Pass => {
                if config.force_closed || self.current_state() != State::Closed {
                    return;
                }
                let snapshot = stat.snapshot();
                if snapshot.total >= config.min_request_volume
                    && snapshot.error_percentage >= config.error_threshold_percentage as f64
                {
                    self.from_closed_to_open(config.sleep_window_ms, Arc::new(snapshot));
                }
            }
            Admission::Deny => {
                logging::warn!(
                    "[CircuitBreaker] Completion reported for a denied attempt of {}, outcome: {}",
                    self.key,
                    outcome
                );
            }
        }
    }

    fn compare_and_set(&self, current: State, new: State) -> bool {
        self.state
            .compare_exchange(current.as_u8(), new.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn notify<F>(&self, f: F)
    where
        F: Fn(&dyn StateChangeListener),
    {
        let listeners = self.listeners.read().unwrap();
        for listener in &*listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))).is_err() {
                logging::error!(
                    "[CircuitBreaker] State change listener panicked, key: {}",
                    self.key
                );
            }
        }
    }

    /// from_closed_to_open updates circuit breaker state machine from closed to open.
    /// Return true only if current thread successfully accomplished the transformation.
    pub fn from_closed_to_open(&self, sleep_window_ms: u64, snapshot: Arc<HealthSnapshot>) -> bool {
        if self.current_state() != State::Closed {
            return false;
        }
        // published before the state, a concurrent `try_pass` must not see Open with a stale retry time
        self.update_next_retry_timestamp(sleep_window_ms);
        if self.compare_and_set(State::Closed, State::Open) {
            logging::warn!(
                "[CircuitBreaker] {} transformed from Closed to Open, {}",
                self.key,
                snapshot
            );
            self.notify(|listener| {
                listener.on_transform_to_open(
                    State::Closed,
                    self.key.clone(),
                    Some(Arc::clone(&snapshot)),
                )
            });
            true
        } else {
            false
        }
    }

    /// from_open_to_half_open updates circuit breaker state machine from open to half-open.
    /// Return true only if current thread successfully accomplished the transformation,
    /// the winner owns the single probe.
    pub fn from_open_to_half_open(&self) -> bool {
        if self.compare_and_set(State::Open, State::HalfOpen) {
            logging::info!("[CircuitBreaker] {} transformed from Open to HalfOpen", self.key);
            self.notify(|listener| listener.on_transform_to_half_open(State::Open, self.key.clone()));
            true
        } else {
            false
        }
    }

    /// from_half_open_to_open updates circuit breaker state machine from half-open to open,
    /// and restarts the sleep window.
    /// Return true only if current thread successfully accomplished the transformation.
    pub fn from_half_open_to_open(&self, sleep_window_ms: u64) -> bool {
        if self.current_state() != State::HalfOpen {
            return false;
        }
        self.update_next_retry_timestamp(sleep_window_ms);
        if self.compare_and_set(State::HalfOpen, State::Open) {
            logging::warn!("[CircuitBreaker] {} transformed from HalfOpen to Open", self.key);
            self.notify(|listener| {
                listener.on_transform_to_open(State::HalfOpen, self.key.clone(), None)
            });
            true
        } else {
            false
        }
    }

    /// from_half_open_to_closed updates circuit breaker state machine from half-open to closed,
    /// and starts the closed state with an empty window.
    /// Return true only if current thread successfully accomplished the transformation.
    pub fn from_half_open_to_closed(&self) -> bool {
        if self.current_state() != State::HalfOpen {
            return false;
        }
        // cleared while still half-open, outcomes of attempts admitted once closed are kept
        self.reset_metric();
        if self.compare_and_set(State::HalfOpen, State::Closed) {
            logging::info!("[CircuitBreaker] {} transformed from HalfOpen to Closed", self.key);
            self.notify(|listener| {
                listener.on_transform_to_closed(State::HalfOpen, self.key.clone())
            });
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
pub(crate) use test::MockStateListener;
