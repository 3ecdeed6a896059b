use super::Outcome;
use crate::Error;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// The result of one command execution.
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// `ExecutionError` is what a command execution resolves to when neither `work`
/// nor `fallback` produced a value.
///
/// The primary outcome and, where there is one, the original error of `work`
/// stay reachable: through `outcome()`/`work_error()`, and through the
/// `std::error::Error::source` chain.
#[derive(Debug)]
pub enum ExecutionError {
    /// The wrapped call returned an error.
    WorkFailure(Error),
    /// The deadline elapsed before `work` completed.
    Timeout(Duration),
    /// The circuit breaker is open.
    ShortCircuited,
    /// The bulkhead had neither a free permit nor queue capacity.
    BulkheadRejected,
    /// The primary path failed, and so did the fallback.
    FallbackFailure {
        outcome: Outcome,
        cause: Box<ExecutionError>,
        error: Error,
    },
    /// The primary path failed and no fallback was configured.
    NoFallbackAvailable {
        outcome: Outcome,
        cause: Box<ExecutionError>,
    },
    /// The async handle was cancelled before the execution completed.
    Cancelled,
}

impl ExecutionError {
    /// `outcome` returns the primary outcome of the attempt this error stems from.
    pub fn outcome(&self) -> Outcome {
        match self {
            ExecutionError::WorkFailure(_) => Outcome::Failure,
            ExecutionError::Timeout(_) => Outcome::Timeout,
            ExecutionError::ShortCircuited => Outcome::ShortCircuited,
            ExecutionError::BulkheadRejected => Outcome::Rejected,
            ExecutionError::FallbackFailure { outcome, .. } => *outcome,
            ExecutionError::NoFallbackAvailable { outcome, .. } => *outcome,
            ExecutionError::Cancelled => Outcome::Cancelled,
        }
    }

    /// `work_error` returns the error raised by `work`, if the attempt failed that way.
    pub fn work_error(&self) -> Option<&Error> {
        match self {
            ExecutionError::WorkFailure(err) => Some(err),
            ExecutionError::FallbackFailure { cause, .. }
            | ExecutionError::NoFallbackAvailable { cause, .. } => cause.work_error(),
            _ => None,
        }
    }

    /// `fallback_error` returns the error raised by the fallback, if it ran and failed.
    pub fn fallback_error(&self) -> Option<&Error> {
        match self {
            ExecutionError::FallbackFailure { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.outcome() == Outcome::Timeout
    }

    pub fn is_short_circuited(&self) -> bool {
        self.outcome() == Outcome::ShortCircuited
    }

    pub fn is_rejected(&self) -> bool {
        self.outcome() == Outcome::Rejected
    }

    pub(crate) fn no_fallback(primary: ExecutionError) -> Self {
        ExecutionError::NoFallbackAvailable {
            outcome: primary.outcome(),
            cause: Box::new(primary),
        }
    }

    pub(crate) fn fallback_failed(primary: ExecutionError, error: Error) -> Self {
        ExecutionError::FallbackFailure {
            outcome: primary.outcome(),
            cause: Box::new(primary),
            error,
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::WorkFailure(err) => write!(f, "command failed: {}", err),
            ExecutionError::Timeout(timeout) => {
                write!(f, "command timed out after {} ms", timeout.as_millis())
            }
            ExecutionError::ShortCircuited => write!(f, "command short-circuited, circuit is open"),
            ExecutionError::BulkheadRejected => {
                write!(f, "command rejected, bulkhead capacity exhausted")
            }
            ExecutionError::FallbackFailure { outcome, error, .. } => write!(
                f,
                "command {} and fallback failed: {}",
                outcome, error
            ),
            ExecutionError::NoFallbackAvailable { outcome, .. } => {
                write!(f, "command {} and no fallback available", outcome)
            }
            ExecutionError::Cancelled => write!(f, "command cancelled"),
        }
    }
}

impl StdError for ExecutionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ExecutionError::WorkFailure(err) => Some(&**err),
            ExecutionError::FallbackFailure { cause, .. }
            | ExecutionError::NoFallbackAvailable { cause, .. } => Some(&**cause),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug)]
    struct IllegalState;

    impl fmt::Display for IllegalState {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "illegal state")
        }
    }

    impl StdError for IllegalState {}

    #[test]
    fn no_fallback_keeps_cause() {
        let err = ExecutionError::no_fallback(ExecutionError::WorkFailure(Error::new(IllegalState)));
        assert_eq!(err.outcome(), Outcome::Failure);
        assert!(err.work_error().unwrap().is::<IllegalState>());

        // walk the std source chain down to the original error
        let mut source = err.source();
        let mut found = false;
        while let Some(s) = source {
            if s.is::<IllegalState>() {
                found = true;
            }
            source = s.source();
        }
        assert!(found);
    }

    #[test]
    fn fallback_failure_keeps_both_errors() {
        let err = ExecutionError::fallback_failed(
            ExecutionError::Timeout(Duration::from_millis(10)),
            Error::msg("fallback broken"),
        );
        assert!(err.is_timeout());
        assert!(err.work_error().is_none());
        assert_eq!(err.fallback_error().unwrap().to_string(), "fallback broken");
        assert_eq!(
            err.to_string(),
            "command TIMEOUT and fallback failed: fallback broken"
        );
    }

    #[test]
    fn display() {
        assert_eq!(
            ExecutionError::no_fallback(ExecutionError::ShortCircuited).to_string(),
            "command SHORT_CIRCUITED and no fallback available"
        );
        assert_eq!(
            ExecutionError::Timeout(Duration::from_millis(25)).to_string(),
            "command timed out after 25 ms"
        );
    }
}
