use crate::base::CommandKey;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// `CancelToken` is a cooperative cancellation flag shared between the executor and `work`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// `ExecutionContext` is handed to `work`. Long-running work should check
/// `is_cancelled()` between steps and return early once it is set:
/// the executor stops waiting at the deadline or on cancellation, whether `work` stops or not.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    key: CommandKey,
    deadline: Instant,
    token: CancelToken,
}

impl ExecutionContext {
    pub fn new(key: CommandKey, deadline: Instant, token: CancelToken) -> Self {
        ExecutionContext {
            key,
            deadline,
            token,
        }
    }

    pub fn key(&self) -> &CommandKey {
        &self.key
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// `is_cancelled` is true once the execution has been abandoned,
    /// by a timeout or by the owner of an async handle.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.deadline
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}
