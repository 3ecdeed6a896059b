//!  Circuit Breaker State Machine:
//!
//!                       error percentage over threshold with enough volume
//!
//!             +-----------------------------------------------------------------------+
//!             |                                                                       |
//!             |                                                                       v
//!     +----------------+                   +----------------+  Sleep window   +----------------+
//!     |                |                   |                |<----------------|                |
//!     |                |   Probe succeed   |                |    (one probe)  |                |
//!     |     Closed     |<------------------|    HalfOpen    |                 |      Open      |
//!     |                |                   |                |   Probe failed  |                |
//!     |                |                   |                +---------------->|                |
//!     +----------------+                   +----------------+                 +----------------+
//!
//! Every transition is a single compare-and-set on the breaker state, so exactly one caller
//! wins the `Open -> HalfOpen` probe admission however many race for it.

#![allow(clippy::wrong_self_convention)]

mod breaker;

pub use breaker::*;

use crate::base::CommandKey;
use crate::stat::HealthSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, RwLock};

/// States of Circuit Breaker State Machine
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Closed,
    HalfOpen,
    Open,
}

impl Default for State {
    fn default() -> State {
        State::Closed
    }
}

impl State {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            State::Closed => 0,
            State::HalfOpen => 1,
            State::Open => 2,
        }
    }

    pub(crate) fn from_u8(value: u8) -> State {
        match value {
            1 => State::HalfOpen,
            2 => State::Open,
            _ => State::Closed,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Closed => "CLOSED",
            State::HalfOpen => "HALF_OPEN",
            State::Open => "OPEN",
        };
        write!(f, "{}", name)
    }
}

/// `StateChangeListener` listens on the circuit breaker state change event
pub trait StateChangeListener: Sync + Send {
    /// `on_transform_to_closed` is triggered when circuit breaker state transformed to Closed.
    fn on_transform_to_closed(&self, prev: State, key: CommandKey);

    /// `on_transform_to_open` is triggered when circuit breaker state transformed to Open.
    /// The "snapshot" holds the health of the rolling window when the transformation occurs,
    /// it is `None` when a half-open probe failed.
    fn on_transform_to_open(&self, prev: State, key: CommandKey, snapshot: Option<Arc<HealthSnapshot>>);

    /// `on_transform_to_half_open` is triggered when circuit breaker state transformed to HalfOpen.
    fn on_transform_to_half_open(&self, prev: State, key: CommandKey);
}

/// The listeners shared by all breakers of one registry.
pub type StateChangeListeners = Arc<RwLock<Vec<Arc<dyn StateChangeListener>>>>;

/// `Admission` is the answer of the breaker to one attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Admission {
    /// the breaker is closed, the attempt passes
    Pass,
    /// the attempt is the single half-open probe, its completion decides the next state
    Probe,
    /// the breaker is open, the attempt is short-circuited
    Deny,
}

impl Admission {
    #[inline]
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Admission::Deny)
    }
}
