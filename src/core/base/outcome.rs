use enum_map::Enum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `Outcome` is the result of one execution attempt, recorded once per attempt
/// into the rolling metrics window of its command key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    /// `work` returned an error (or panicked)
    Failure,
    /// `work` did not finish before the deadline
    Timeout,
    /// the circuit breaker denied the attempt
    ShortCircuited,
    /// the bulkhead had no capacity left
    Rejected,
    FallbackSuccess,
    FallbackFailure,
    /// the async handle was cancelled by its owner
    Cancelled,
}

impl Outcome {
    /// Outcomes counted as errors when computing the error percentage.
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Failure | Outcome::Timeout | Outcome::Rejected)
    }

    /// Outcomes that contribute to the request volume used by the circuit breaker.
    #[inline]
    pub fn is_health_volume(&self) -> bool {
        matches!(self, Outcome::Success) || self.is_error()
    }

    /// Outcomes that trigger the fallback path.
    #[inline]
    pub fn needs_fallback(&self) -> bool {
        matches!(
            self,
            Outcome::Failure | Outcome::Timeout | Outcome::Rejected | Outcome::ShortCircuited
        )
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Success => "SUCCESS",
            Outcome::Failure => "FAILURE",
            Outcome::Timeout => "TIMEOUT",
            Outcome::ShortCircuited => "SHORT_CIRCUITED",
            Outcome::Rejected => "REJECTED",
            Outcome::FallbackSuccess => "FALLBACK_SUCCESS",
            Outcome::FallbackFailure => "FALLBACK_FAILURE",
            Outcome::Cancelled => "CANCELLED",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classification() {
        assert!(Outcome::Failure.is_error());
        assert!(Outcome::Timeout.is_error());
        assert!(Outcome::Rejected.is_error());
        assert!(!Outcome::ShortCircuited.is_error());
        assert!(!Outcome::Cancelled.is_health_volume());
        assert!(!Outcome::FallbackFailure.is_health_volume());
        assert!(Outcome::Success.is_health_volume());
        assert!(Outcome::ShortCircuited.needs_fallback());
        assert!(!Outcome::Cancelled.needs_fallback());
    }
}
