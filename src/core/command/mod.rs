//! Commands and their execution.
//!
//! A `Command` holds the `work` of one execution and an optional `fallback`.
//! The `CommandExecutor` drives it through the per-key state kept by a `CommandRegistry`:
//!
//! 1. the circuit breaker is consulted, a denied attempt is `ShortCircuited` at once,
//! 2. a bulkhead permit is acquired, or the attempt is `Rejected`,
//! 3. `work` runs on a worker thread under the configured deadline,
//!    an overrun is abandoned as `Timeout` without waiting for `work` to return,
//! 4. the primary outcome is recorded and the permit released,
//! 5. the fallback runs for every failed path, its own outcome is recorded for observability,
//! 6. event notifiers are called.

#![allow(clippy::module_inception)]

mod command;
pub mod config;
mod context;
mod executor;
mod handle;
mod registry;

pub use command::*;
pub use config::*;
pub use context::*;
pub use executor::*;
pub use handle::*;
pub use registry::*;
