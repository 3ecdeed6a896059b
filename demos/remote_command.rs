use bulwark::circuitbreaker::{State, StateChangeListener};
use bulwark::notifier::LoggingNotifier;
use bulwark::stat::HealthSnapshot;
use bulwark::utils::{curr_time_millis, sleep_for_ms};
use bulwark::{Command, CommandConfig, CommandKey, EventNotifier, ExecutionContext};
use rand::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// A remote dependency with a tunable response time.
struct Backend {
    response_time_ms: AtomicU64,
}

impl Backend {
    fn call(&self, ctx: &ExecutionContext) -> anyhow::Result<String> {
        let deadline = curr_time_millis() + self.response_time_ms.load(Ordering::SeqCst);
        while curr_time_millis() < deadline {
            if ctx.is_cancelled() {
                return Err(anyhow::Error::msg("call abandoned"));
            }
            sleep_for_ms(5);
        }
        Ok(String::from("OK"))
    }

    fn set_response_time(&self, response_time_ms: u64) {
        println!("[Backend] response time set to {} ms", response_time_ms);
        self.response_time_ms.store(response_time_ms, Ordering::SeqCst);
    }
}

struct PrintingListener;

impl StateChangeListener for PrintingListener {
    fn on_transform_to_closed(&self, prev: State, key: CommandKey) {
        println!("{}: {} from {} to Closed", curr_time_millis(), key, prev);
    }
    fn on_transform_to_open(&self, prev: State, key: CommandKey, snapshot: Option<Arc<HealthSnapshot>>) {
        println!(
            "{}: {} from {} to Open, snapshot: {:?}",
            curr_time_millis(),
            key,
            prev,
            snapshot.map(|s| s.to_string())
        );
    }
    fn on_transform_to_half_open(&self, prev: State, key: CommandKey) {
        println!("{}: {} from {} to Half-Open", curr_time_millis(), key, prev);
    }
}

/// The caller only goes remote for a fraction of its requests.
fn demo(backend: &Arc<Backend>, remote_ratio: f64) -> String {
    if thread_rng().gen::<f64>() > remote_ratio {
        return String::from("OK");
    }
    let backend = Arc::clone(backend);
    let command = Command::new("remoteCommand".into(), move |ctx| backend.call(ctx))
        .with_fallback(|_err| Ok(String::from("N/A")));
    match bulwark::execute(command) {
        Ok(value) => value,
        Err(err) => format!("error: {}", err),
    }
}

fn main() {
    bulwark::init_default().unwrap_or_else(|err| bulwark::logging::error!("{:?}", err));
    let listeners: Vec<Arc<dyn StateChangeListener>> = vec![Arc::new(PrintingListener)];
    bulwark::register_state_change_listeners(listeners);
    let notifiers: Vec<Arc<dyn EventNotifier>> = vec![Arc::new(LoggingNotifier)];
    bulwark::register_event_notifiers(notifiers);

    let key: CommandKey = "remoteCommand".into();
    let config = CommandConfig {
        timeout_ms: 1000,
        min_request_volume: 10,
        sleep_window_ms: 2000,
        ..Default::default()
    };
    bulwark::register_command(key.clone(), config.clone()).unwrap();

    let backend = Arc::new(Backend {
        response_time_ms: AtomicU64::new(200),
    });

    let mut handlers = Vec::new();
    for _ in 0..8 {
        let backend = Arc::clone(&backend);
        handlers.push(thread::spawn(move || {
            let mut fallbacks = 0u64;
            for _ in 0..400 {
                if demo(&backend, 0.1) == "N/A" {
                    fallbacks += 1;
                }
                sleep_for_ms(10);
            }
            fallbacks
        }));
    }

    sleep_for_ms(1000);
    // the backend slows down beyond the command timeout
    backend.set_response_time(1500);
    sleep_for_ms(3000);
    // tune the timeout at runtime, the breaker state and the metrics are kept
    println!("[Tuning] timeout set to 2000 ms, state: {:?}", bulwark::breaker_state(&key));
    bulwark::register_command(
        key.clone(),
        CommandConfig {
            timeout_ms: 2000,
            ..config
        },
    )
    .unwrap();

    let fallbacks: u64 = handlers
        .into_iter()
        .map(|h| h.join().expect("Couldn't join on the associated thread"))
        .sum();
    println!(
        "fallbacks: {}, state: {:?}, metrics: {:?}",
        fallbacks,
        bulwark::breaker_state(&key),
        bulwark::metrics_snapshot(&key).map(|s| s.to_string())
    );
}
