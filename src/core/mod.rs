// command keys, outcomes, the execution error taxonomy
pub mod base;
// rolling metrics window
pub mod stat;
// per-key state machine driven by the metrics window
pub mod circuitbreaker;
// bounded-concurrency resource pool
pub mod isolation;
// command value, executor and the per-key registry
pub mod command;
pub mod config;
// observers of execution events
pub mod notifier;

pub use base::{CommandKey, ExecutionError, Outcome};
pub use circuitbreaker::State;
pub use command::{
    Command, CommandConfig, CommandExecutor, CommandRegistry, ExecutionContext, ExecutionHandle,
};
pub use notifier::{EventNotifier, ExecutionEvent};
