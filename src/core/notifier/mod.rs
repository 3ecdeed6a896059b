//! Observers of execution events.
//!
//! Notifiers are invoked after the outcomes of an attempt have been recorded,
//! on a delivery thread owned by the registry rather than on the caller's thread.
//! Delivery is best-effort: events are dropped while the queue is full, and a
//! panicking notifier is logged and skipped.

use crate::base::{
    constant::{EVENT_QUEUE_CAPACITY, WORKER_THREAD_PREFIX},
    CommandKey, Outcome,
};
use crate::circuitbreaker::{State, StateChangeListener};
use crate::logging;
use crate::stat::HealthSnapshot;
use crate::utils;
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// `ExecutionEvent` describes one execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionEvent {
    pub id: Uuid,
    pub key: String,
    /// the primary outcome, as recorded into the rolling window
    pub outcome: Outcome,
    /// `FallbackSuccess` or `FallbackFailure` when the fallback ran
    pub fallback_outcome: Option<Outcome>,
    /// time spent in the executor, fallback included
    pub duration: Duration,
    /// start of the attempt, in milliseconds since the epoch
    pub timestamp_ms: u64,
}

impl ExecutionEvent {
    pub fn new(
        key: &CommandKey,
        outcome: Outcome,
        fallback_outcome: Option<Outcome>,
        duration: Duration,
        timestamp_ms: u64,
    ) -> Self {
        ExecutionEvent {
            id: Uuid::new_v4(),
            key: key.name().to_owned(),
            outcome,
            fallback_outcome,
            duration,
            timestamp_ms,
        }
    }
}

impl fmt::Display for ExecutionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} in {} ms",
            utils::format_time_millis(self.timestamp_ms),
            self.key,
            self.outcome,
            self.duration.as_millis()
        )?;
        if let Some(fallback) = self.fallback_outcome {
            write!(f, ", {}", fallback)?;
        }
        Ok(())
    }
}

/// `EventNotifier` is called on every attempt outcome.
pub trait EventNotifier: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// The notifiers shared by every command of one registry.
pub type EventNotifiers = Arc<RwLock<Vec<Arc<dyn EventNotifier>>>>;

pub(crate) fn notify_all(notifiers: &[Arc<dyn EventNotifier>], event: &ExecutionEvent) {
    for notifier in notifiers {
        if panic::catch_unwind(AssertUnwindSafe(|| notifier.on_event(event))).is_err() {
            logging::error!("[EventNotifier] Notifier panicked on event {}", event.id);
        }
    }
}

/// `EventDispatcher` hands events over to a delivery thread through a bounded queue.
/// The thread exits once the dispatcher is dropped and the queue is drained.
#[derive(Debug)]
pub(crate) struct EventDispatcher {
    sender: SyncSender<ExecutionEvent>,
}

impl EventDispatcher {
    pub(crate) fn new(notifiers: EventNotifiers) -> Self {
        Self::with_capacity(notifiers, EVENT_QUEUE_CAPACITY)
    }

    pub(crate) fn with_capacity(notifiers: EventNotifiers, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::sync_channel::<ExecutionEvent>(capacity);
        let spawned = thread::Builder::new()
            .name(format!("{}-notifier", WORKER_THREAD_PREFIX))
            .spawn(move || {
                for event in receiver {
                    // the lock is not held during delivery, notifiers may (un)register notifiers
                    let current = notifiers.read().unwrap().clone();
                    notify_all(&current, &event);
                }
            });
        if let Err(err) = spawned {
            // the receiver is gone with the closure, every dispatch is dropped
            logging::error!("[EventNotifier] Fail to spawn the delivery thread: {:?}", err);
        }
        EventDispatcher { sender }
    }

    /// `dispatch` never blocks, the event is dropped if the queue is full.
    pub(crate) fn dispatch(&self, event: ExecutionEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => logging::warn!(
                "[EventNotifier] Event queue full, event {} of {} dropped",
                event.id,
                event.key
            ),
            Err(TrySendError::Disconnected(event)) => logging::debug!(
                "[EventNotifier] No delivery thread, event {} of {} dropped",
                event.id,
                event.key
            ),
        }
    }
}

/// `LoggingNotifier` writes execution events and breaker transitions to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

impl EventNotifier for LoggingNotifier {
    fn on_event(&self, event: &ExecutionEvent) {
        logging::debug!("[Execution] {}", event);
    }
}

impl StateChangeListener for LoggingNotifier {
    fn on_transform_to_closed(&self, prev: State, key: CommandKey) {
        logging::info!("[Execution] {} breaker {} -> {}", key, prev, State::Closed);
    }

    fn on_transform_to_open(&self, prev: State, key: CommandKey, snapshot: Option<Arc<HealthSnapshot>>) {
        match snapshot {
            Some(snapshot) => logging::warn!(
                "[Execution] {} breaker {} -> {}, {}",
                key,
                prev,
                State::Open,
                snapshot
            ),
            None => logging::warn!("[Execution] {} breaker {} -> {}", key, prev, State::Open),
        }
    }

    fn on_transform_to_half_open(&self, prev: State, key: CommandKey) {
        logging::info!("[Execution] {} breaker {} -> {}", key, prev, State::HalfOpen);
    }
}

#[cfg(test)]
pub(crate) use test::MockNotifier;

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use mockall::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    mock! {
        pub(crate) Notifier {}
        impl EventNotifier for Notifier {
            fn on_event(&self, event: &ExecutionEvent);
        }
    }

    struct PanickingNotifier;

    impl EventNotifier for PanickingNotifier {
        fn on_event(&self, _event: &ExecutionEvent) {
            panic!("broken notifier");
        }
    }

    struct CountingNotifier(AtomicUsize);

    impl EventNotifier for CountingNotifier {
        fn on_event(&self, _event: &ExecutionEvent) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn event_display() {
        let event = ExecutionEvent::new(
            &"remote".into(),
            Outcome::Timeout,
            Some(Outcome::FallbackSuccess),
            Duration::from_millis(12),
            0,
        );
        let text = event.to_string();
        assert!(text.contains("remote TIMEOUT in 12 ms, FALLBACK_SUCCESS"));
    }

    #[test]
    fn every_notifier_called() {
        let mut mock = MockNotifier::new();
        mock.expect_on_event()
            .withf(|event: &ExecutionEvent| event.key == "remote" && event.outcome == Outcome::Success)
            .times(1)
            .return_const(());
        let counting = Arc::new(CountingNotifier(AtomicUsize::new(0)));
        let list: Vec<Arc<dyn EventNotifier>> = vec![
            Arc::new(PanickingNotifier),
            Arc::new(mock),
            counting.clone(),
            Arc::new(LoggingNotifier),
        ];
        notify_all(&list, &event_of("remote"));
        assert_eq!(counting.0.load(Ordering::SeqCst), 1);
    }

    fn event_of(key: &str) -> ExecutionEvent {
        ExecutionEvent::new(
            &key.into(),
            Outcome::Success,
            None,
            Duration::from_millis(1),
            utils::curr_time_millis(),
        )
    }

    fn wait_for(counter: &AtomicUsize, expected: usize) {
        for _ in 0..500 {
            if counter.load(Ordering::SeqCst) >= expected {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
    }

    struct SlowNotifier(AtomicUsize);

    impl EventNotifier for SlowNotifier {
        fn on_event(&self, _event: &ExecutionEvent) {
            thread::sleep(Duration::from_millis(100));
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn dispatch_does_not_wait_for_delivery() {
        let slow = Arc::new(SlowNotifier(AtomicUsize::new(0)));
        let list: Vec<Arc<dyn EventNotifier>> = vec![slow.clone()];
        let dispatcher = EventDispatcher::with_capacity(Arc::new(RwLock::new(list)), 2);
        let start = std::time::Instant::now();
        // one in delivery, two queued, the rest dropped
        for _ in 0..10 {
            dispatcher.dispatch(event_of("remote"));
        }
        assert!(start.elapsed() < Duration::from_millis(50));
        wait_for(&slow.0, 3);
        thread::sleep(Duration::from_millis(150));
        let delivered = slow.0.load(Ordering::SeqCst);
        assert!(delivered >= 2 && delivered <= 3);
    }

    struct ClearingNotifier {
        notifiers: EventNotifiers,
        calls: AtomicUsize,
    }

    impl EventNotifier for ClearingNotifier {
        fn on_event(&self, _event: &ExecutionEvent) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.notifiers.write().unwrap().clear();
        }
    }

    #[test]
    fn notifier_may_update_the_list() {
        let notifiers: EventNotifiers = Arc::new(RwLock::new(Vec::new()));
        let clearing = Arc::new(ClearingNotifier {
            notifiers: Arc::clone(&notifiers),
            calls: AtomicUsize::new(0),
        });
        notifiers.write().unwrap().push(clearing.clone());
        let dispatcher = EventDispatcher::new(Arc::clone(&notifiers));
        dispatcher.dispatch(event_of("remote"));
        wait_for(&clearing.calls, 1);
        assert_eq!(clearing.calls.load(Ordering::SeqCst), 1);
        // the list was cleared from within delivery, later events reach nobody
        dispatcher.dispatch(event_of("remote"));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(clearing.calls.load(Ordering::SeqCst), 1);
        assert!(notifiers.read().unwrap().is_empty());
    }
}
