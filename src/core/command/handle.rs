use super::executor::Signal;
use super::CancelToken;
use crate::base::{CommandKey, ExecutionError, ExecutionResult, Outcome};
use crate::Error;
use std::fmt;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// `ExecutionHandle` refers to a command running on its own thread.
pub struct ExecutionHandle<T> {
    key: CommandKey,
    token: CancelToken,
    signal_tx: Sender<Signal<T>>,
    result_rx: Receiver<(ExecutionResult<T>, Outcome)>,
    outcome: Option<Outcome>,
}

impl<T> fmt::Debug for ExecutionHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionHandle")
            .field("key", &self.key)
            .field("cancelled", &self.token.is_cancelled())
            .field("outcome", &self.outcome)
            .finish()
    }
}

impl<T> ExecutionHandle<T> {
    pub(crate) fn new(
        key: CommandKey,
        token: CancelToken,
        signal_tx: Sender<Signal<T>>,
        result_rx: Receiver<(ExecutionResult<T>, Outcome)>,
    ) -> Self {
        ExecutionHandle {
            key,
            token,
            signal_tx,
            result_rx,
            outcome: None,
        }
    }

    pub fn key(&self) -> &CommandKey {
        &self.key
    }

    /// `cancel` abandons the execution the same way a timeout does: the executor stops
    /// waiting for `work`, records `Cancelled` and the context handed to `work` reports
    /// `is_cancelled()`. The bulkhead permit is released once `work` returns.
    /// Cancelling a finished execution has no effect.
    pub fn cancel(&self) {
        self.token.cancel();
        // the execution may have finished already
        let _ = self.signal_tx.send(Signal::Cancelled);
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// `get` waits at most `timeout` for the result. It returns `None` if the execution has
    /// not finished in time (it keeps running), or if the result was already taken.
    pub fn get(&mut self, timeout: Duration) -> Option<ExecutionResult<T>> {
        if self.outcome.is_some() {
            return None;
        }
        match self.result_rx.recv_timeout(timeout) {
            Ok((result, outcome)) => {
                self.outcome = Some(outcome);
                Some(result)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.outcome = Some(Outcome::Failure);
                Some(Err(terminated()))
            }
        }
    }

    /// `outcome` is the primary outcome, known once the result has been taken.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// `join` blocks until the execution resolves.
    pub fn join(self) -> ExecutionResult<T> {
        if self.outcome.is_some() {
            return Err(ExecutionError::WorkFailure(Error::msg(
                "the result has already been taken",
            )));
        }
        match self.result_rx.recv() {
            Ok((result, _)) => result,
            Err(_) => Err(terminated()),
        }
    }
}

fn terminated() -> ExecutionError {
    ExecutionError::WorkFailure(Error::msg("execution terminated before completing"))
}
