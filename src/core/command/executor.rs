use super::{
    CancelToken, Command, CommandConfig, CommandRegistry, CommandState, ExecutionContext,
    ExecutionHandle, Work,
};
use crate::base::{constant::WORKER_THREAD_PREFIX, CommandKey, ExecutionError, ExecutionResult, Outcome};
use crate::circuitbreaker::Admission;
use crate::isolation::Permit;
use crate::notifier::ExecutionEvent;
use crate::{logging, utils, Error};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Messages received by the thread driving one attempt.
pub(crate) enum Signal<T> {
    /// `work` returned, the permit travels back so that it is released after the outcome is recorded
    Completed(crate::Result<T>, Permit),
    /// the async handle was cancelled
    Cancelled,
}

/// `CommandExecutor` runs commands against the per-key state of one registry.
/// It is cheap to clone and safe to share between threads.
#[derive(Clone)]
pub struct CommandExecutor {
    registry: Arc<CommandRegistry>,
}

impl CommandExecutor {
    pub fn new(registry: Arc<CommandRegistry>) -> Self {
        CommandExecutor { registry }
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// `execute` runs the command and blocks until a value or a typed error is available.
    pub fn execute<T: Send + 'static>(&self, command: Command<T>) -> ExecutionResult<T> {
        self.run(command).0
    }

    /// `run` is `execute`, also returning the primary outcome of the attempt.
    pub fn run<T: Send + 'static>(&self, command: Command<T>) -> (ExecutionResult<T>, Outcome) {
        let (signal_tx, signal_rx) = mpsc::channel();
        run_attempt(&self.registry, command, CancelToken::new(), signal_tx, signal_rx)
    }

    /// `execute_async` returns at once, the attempt runs on its own thread.
    /// Dropping the handle without cancelling it lets the attempt run to completion.
    pub fn execute_async<T: Send + 'static>(&self, command: Command<T>) -> ExecutionHandle<T> {
        let key = command.key().clone();
        let token = CancelToken::new();
        let (signal_tx, signal_rx) = mpsc::channel();
        let (result_tx, result_rx) = mpsc::sync_channel(1);
        let handle = ExecutionHandle::new(key.clone(), token.clone(), signal_tx.clone(), result_rx);

        let registry = Arc::clone(&self.registry);
        let spawned = thread::Builder::new()
            .name(format!("{}-async-{}", WORKER_THREAD_PREFIX, key))
            .spawn(move || {
                let result = run_attempt(&registry, command, token, signal_tx, signal_rx);
                // nobody listens once the handle is dropped
                let _ = result_tx.send(result);
            });
        if let Err(err) = spawned {
            logging::error!(
                "[CommandExecutor] Fail to spawn the execution thread of {}: {:?}",
                key,
                err
            );
        }
        handle
    }
}

fn run_attempt<T: Send + 'static>(
    registry: &CommandRegistry,
    command: Command<T>,
    token: CancelToken,
    signal_tx: Sender<Signal<T>>,
    signal_rx: Receiver<Signal<T>>,
) -> (ExecutionResult<T>, Outcome) {
    let (key, work, fallback) = command.into_parts();
    let start = Instant::now();
    let timestamp_ms = utils::curr_time_millis();
    let state = match registry.command_state(&key) {
        Ok(state) => state,
        Err(err) => {
            logging::error!("[CommandExecutor] Fail to create the state of {}: {:?}", key, err);
            return (Err(ExecutionError::WorkFailure(err)), Outcome::Failure);
        }
    };

    let primary = run_primary(&state, work, &token, signal_tx, signal_rx);
    let primary_outcome = match &primary {
        Ok(_) => Outcome::Success,
        Err(err) => err.outcome(),
    };

    let mut fallback_outcome = None;
    let result = match primary {
        Ok(value) => Ok(value),
        Err(err) if !primary_outcome.needs_fallback() => Err(err),
        Err(err) => match fallback {
            None => Err(ExecutionError::no_fallback(err)),
            Some(fallback) => {
                let fallback_result = panic::catch_unwind(AssertUnwindSafe(|| fallback(&err)))
                    .unwrap_or_else(|payload| Err(panic_to_error(payload)));
                match fallback_result {
                    Ok(value) => {
                        fallback_outcome = Some(Outcome::FallbackSuccess);
                        Ok(value)
                    }
                    Err(error) => {
                        fallback_outcome = Some(Outcome::FallbackFailure);
                        Err(ExecutionError::fallback_failed(err, error))
                    }
                }
            }
        },
    };
    if let Some(outcome) = fallback_outcome {
        state.breaker().record(outcome);
    }

    let event = ExecutionEvent::new(
        &key,
        primary_outcome,
        fallback_outcome,
        start.elapsed(),
        timestamp_ms,
    );
    registry.dispatch_event(event);
    (result, primary_outcome)
}

/// Runs the breaker and bulkhead checks and `work`, and records the primary outcome.
/// The signal receiver is dropped on return, a worker finishing later releases its permit itself.
fn run_primary<T: Send + 'static>(
    state: &CommandState,
    work: Work<T>,
    token: &CancelToken,
    signal_tx: Sender<Signal<T>>,
    signal_rx: Receiver<Signal<T>>,
) -> ExecutionResult<T> {
    let config = state.config();
    let breaker = state.breaker();
    let admission = breaker.try_pass(&config);
    if admission == Admission::Deny {
        breaker.record(Outcome::ShortCircuited);
        return Err(ExecutionError::ShortCircuited);
    }

    let (result, permit) = match state.bulkhead().acquire() {
        Some(permit) => run_work(
            state.key(),
            &config,
            work,
            permit,
            token,
            signal_tx,
            &signal_rx,
        ),
        None => (Err(ExecutionError::BulkheadRejected), None),
    };
    let outcome = match &result {
        Ok(_) => Outcome::Success,
        Err(err) => err.outcome(),
    };
    breaker.on_request_complete(outcome, admission, &config);
    drop(permit);
    result
}

fn run_work<T: Send + 'static>(
    key: &CommandKey,
    config: &CommandConfig,
    work: Work<T>,
    permit: Permit,
    token: &CancelToken,
    signal_tx: Sender<Signal<T>>,
    signal_rx: &Receiver<Signal<T>>,
) -> (ExecutionResult<T>, Option<Permit>) {
    if token.is_cancelled() {
        return (Err(ExecutionError::Cancelled), Some(permit));
    }
    let timeout = config.timeout();
    let deadline = utils::deadline_after_ms(config.timeout_ms);
    let ctx = ExecutionContext::new(key.clone(), deadline, token.clone());

    let spawned = thread::Builder::new()
        .name(format!("{}-{}", WORKER_THREAD_PREFIX, key))
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| work(&ctx)))
                .unwrap_or_else(|payload| Err(panic_to_error(payload)));
            // fails once the attempt was abandoned, the permit is then released here
            let _ = signal_tx.send(Signal::Completed(result, permit));
        });
    if let Err(err) = spawned {
        logging::error!("[CommandExecutor] Fail to spawn the worker of {}: {:?}", key, err);
        return (
            Err(ExecutionError::WorkFailure(
                Error::new(err).context("fail to spawn worker thread"),
            )),
            None,
        );
    }

    match signal_rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(Signal::Completed(Ok(value), permit)) => (Ok(value), Some(permit)),
        Ok(Signal::Completed(Err(err), permit)) => {
            (Err(ExecutionError::WorkFailure(err)), Some(permit))
        }
        Ok(Signal::Cancelled) => {
            token.cancel();
            logging::debug!("[CommandExecutor] {} cancelled, worker abandoned", key);
            (Err(ExecutionError::Cancelled), None)
        }
        Err(RecvTimeoutError::Timeout) => {
            token.cancel();
            logging::debug!(
                "[CommandExecutor] {} timed out after {} ms, worker abandoned",
                key,
                config.timeout_ms
            );
            (Err(ExecutionError::Timeout(timeout)), None)
        }
        Err(RecvTimeoutError::Disconnected) => (
            Err(ExecutionError::WorkFailure(Error::msg(
                "worker terminated without a result",
            ))),
            None,
        ),
    }
}

fn panic_to_error(payload: Box<dyn Any + Send>) -> Error {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic payload")
    };
    Error::msg(format!("panicked: {}", message))
}
