use anyhow::Error;
use bulwark::circuitbreaker::{State, StateChangeListener};
use bulwark::stat::HealthSnapshot;
use bulwark::utils::sleep_for_ms;
use bulwark::{
    Command, CommandConfig, CommandKey, EventNotifier, ExecutionContext, ExecutionError,
    ExecutionEvent, Outcome,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<ExecutionEvent>>,
    transitions: Mutex<Vec<(CommandKey, State)>>,
}

impl Recorder {
    fn events_of(&self, key: &str) -> Vec<ExecutionEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.key == key)
            .cloned()
            .collect()
    }

    // events are delivered on the notifier thread
    fn wait_for_events(&self, key: &str, expected: usize) -> Vec<ExecutionEvent> {
        for _ in 0..500 {
            let events = self.events_of(key);
            if events.len() >= expected {
                return events;
            }
            sleep_for_ms(2);
        }
        self.events_of(key)
    }

    fn transitions_of(&self, key: &str) -> Vec<State> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.name() == key)
            .map(|(_, s)| *s)
            .collect()
    }
}

impl EventNotifier for Recorder {
    fn on_event(&self, event: &ExecutionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

impl StateChangeListener for Recorder {
    fn on_transform_to_closed(&self, _prev: State, key: CommandKey) {
        self.transitions.lock().unwrap().push((key, State::Closed));
    }
    fn on_transform_to_open(
        &self,
        _prev: State,
        key: CommandKey,
        _snapshot: Option<Arc<HealthSnapshot>>,
    ) {
        self.transitions.lock().unwrap().push((key, State::Open));
    }
    fn on_transform_to_half_open(&self, _prev: State, key: CommandKey) {
        self.transitions.lock().unwrap().push((key, State::HalfOpen));
    }
}

#[test]
fn execute_with_fallback() {
    let recorder = Arc::new(Recorder::default());
    bulwark::register_event_notifiers(vec![recorder.clone() as Arc<dyn EventNotifier>]);

    let key: CommandKey = "api_fallback".into();
    bulwark::register_command(
        key.clone(),
        CommandConfig {
            timeout_ms: 50,
            ..Default::default()
        },
    )
    .unwrap();

    let value = bulwark::execute(Command::new(key.clone(), |_ctx| Ok(String::from("remote"))));
    assert_eq!(value.unwrap(), "remote");

    let value = bulwark::execute(
        Command::new(key.clone(), |_ctx| Err(Error::msg("503"))).with_fallback(|err| {
            assert_eq!(err.outcome(), Outcome::Failure);
            Ok(String::from("cached"))
        }),
    );
    assert_eq!(value.unwrap(), "cached");

    let (value, outcome) = bulwark::run(
        Command::new(key.clone(), |_ctx| {
            sleep_for_ms(200);
            Ok(String::from("late"))
        })
        .with_fallback(|err| {
            assert!(err.is_timeout());
            Ok(String::from("cached"))
        }),
    );
    assert_eq!(outcome, Outcome::Timeout);
    assert_eq!(value.unwrap(), "cached");

    let snapshot = bulwark::metrics_snapshot(&key).unwrap();
    assert_eq!(snapshot.count(Outcome::Success), 1);
    assert_eq!(snapshot.count(Outcome::Failure), 1);
    assert_eq!(snapshot.count(Outcome::Timeout), 1);
    assert_eq!(snapshot.count(Outcome::FallbackSuccess), 2);

    let events = recorder.wait_for_events("api_fallback", 3);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].outcome, Outcome::Success);
    assert_eq!(events[0].fallback_outcome, None);
    assert_eq!(events[1].outcome, Outcome::Failure);
    assert_eq!(events[1].fallback_outcome, Some(Outcome::FallbackSuccess));
    assert_eq!(events[2].outcome, Outcome::Timeout);
    assert!(events[2].duration < Duration::from_millis(150));
}

#[test]
fn async_cancel() {
    let key: CommandKey = "api_async".into();
    bulwark::register_command(
        key.clone(),
        CommandConfig {
            timeout_ms: 5_000,
            max_concurrency: 1,
            queue_capacity: 0,
            ..Default::default()
        },
    )
    .unwrap();

    let mut handle = bulwark::execute_async(Command::new(key.clone(), |ctx: &ExecutionContext| {
        while !ctx.is_cancelled() {
            sleep_for_ms(2);
        }
        Ok(0)
    }));
    assert!(handle.get(Duration::from_millis(20)).is_none());
    assert_eq!(bulwark::bulkhead_metrics(&key).unwrap().active, 1);
    // the permit is held, a second caller is rejected
    let rejected = bulwark::execute(Command::new(key.clone(), |_ctx| Ok(1)));
    assert!(matches!(rejected, Err(ExecutionError::NoFallbackAvailable { .. })));
    assert!(rejected.unwrap_err().is_rejected());

    handle.cancel();
    assert!(handle.is_cancelled());
    let result = handle.get(Duration::from_secs(1)).unwrap();
    assert!(matches!(result, Err(ExecutionError::Cancelled)));
    assert_eq!(handle.outcome(), Some(Outcome::Cancelled));
    // taken already
    assert!(handle.get(Duration::from_millis(1)).is_none());

    for _ in 0..100 {
        if bulwark::bulkhead_metrics(&key).unwrap().active == 0 {
            break;
        }
        sleep_for_ms(5);
    }
    assert_eq!(bulwark::bulkhead_metrics(&key).unwrap().active, 0);

    let handle = bulwark::execute_async(Command::new(key.clone(), |_ctx| Ok(7)));
    assert_eq!(handle.join().unwrap(), 7);
    let snapshot = bulwark::metrics_snapshot(&key).unwrap();
    assert_eq!(snapshot.count(Outcome::Cancelled), 1);
    assert_eq!(snapshot.count(Outcome::Rejected), 1);
    assert_eq!(snapshot.count(Outcome::Success), 1);
}

#[test]
fn listeners_see_the_cycle() {
    let recorder = Arc::new(Recorder::default());
    bulwark::register_state_change_listeners(vec![recorder.clone() as Arc<dyn StateChangeListener>]);

    let key: CommandKey = "api_cycle".into();
    bulwark::register_command(
        key.clone(),
        CommandConfig {
            min_request_volume: 4,
            error_threshold_percentage: 50,
            sleep_window_ms: 100,
            ..Default::default()
        },
    )
    .unwrap();

    let mut handlers = Vec::new();
    for _ in 0..4 {
        let key = key.clone();
        handlers.push(thread::spawn(move || {
            bulwark::execute(Command::<()>::new(key, |_ctx| Err(Error::msg("down"))))
        }));
    }
    for h in handlers {
        assert!(h.join().unwrap().is_err());
    }
    assert_eq!(bulwark::breaker_state(&key), Some(State::Open));
    let short = bulwark::execute(Command::new(key.clone(), |_ctx| Ok(())));
    assert!(short.unwrap_err().is_short_circuited());

    sleep_for_ms(120);
    assert!(bulwark::execute(Command::new(key.clone(), |_ctx| Ok(()))).is_ok());
    assert_eq!(bulwark::breaker_state(&key), Some(State::Closed));
    assert_eq!(
        recorder.transitions_of("api_cycle"),
        vec![State::Open, State::HalfOpen, State::Closed]
    );
}
