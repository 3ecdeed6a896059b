use crate::base::{CommandKey, ExecutionResult, Outcome};
use crate::circuitbreaker::{State, StateChangeListener};
use crate::command::{Command, CommandConfig, CommandExecutor, CommandRegistry, ExecutionHandle};
use crate::isolation::BulkheadMetrics;
use crate::notifier::EventNotifier;
use crate::stat::HealthSnapshot;
use crate::Result;
use lazy_static::lazy_static;
use std::sync::Arc;

lazy_static! {
    static ref DEFAULT_REGISTRY: Arc<CommandRegistry> = Arc::new(CommandRegistry::new());
    static ref DEFAULT_EXECUTOR: CommandExecutor = CommandExecutor::new(default_registry());
}

/// `default_registry` returns the process-wide registry used by the functions of this module.
pub fn default_registry() -> Arc<CommandRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

/// `default_executor` returns an executor bound to the default registry.
pub fn default_executor() -> CommandExecutor {
    DEFAULT_EXECUTOR.clone()
}

/// `register_command` creates or retunes a command key, see `CommandRegistry::register_command`.
pub fn register_command(key: CommandKey, config: CommandConfig) -> Result<bool> {
    DEFAULT_REGISTRY.register_command(key, config)
}

/// `set_default_config` sets the configuration of command keys created lazily.
pub fn set_default_config(config: CommandConfig) -> Result<()> {
    DEFAULT_REGISTRY.set_default_config(config)
}

pub fn execute<T: Send + 'static>(command: Command<T>) -> ExecutionResult<T> {
    DEFAULT_EXECUTOR.execute(command)
}

/// `run` executes the command and also returns the primary outcome of the attempt.
pub fn run<T: Send + 'static>(command: Command<T>) -> (ExecutionResult<T>, Outcome) {
    DEFAULT_EXECUTOR.run(command)
}

pub fn execute_async<T: Send + 'static>(command: Command<T>) -> ExecutionHandle<T> {
    DEFAULT_EXECUTOR.execute_async(command)
}

/// `breaker_state` is `None` for a key that has never been used nor registered.
pub fn breaker_state(key: &CommandKey) -> Option<State> {
    DEFAULT_REGISTRY.breaker_state(key)
}

pub fn metrics_snapshot(key: &CommandKey) -> Option<HealthSnapshot> {
    DEFAULT_REGISTRY.metrics_snapshot(key)
}

pub fn bulkhead_metrics(key: &CommandKey) -> Option<BulkheadMetrics> {
    DEFAULT_REGISTRY.bulkhead_metrics(key)
}

pub fn register_event_notifiers(notifiers: Vec<Arc<dyn EventNotifier>>) {
    DEFAULT_REGISTRY.register_event_notifiers(notifiers)
}

pub fn clear_event_notifiers() {
    DEFAULT_REGISTRY.clear_event_notifiers()
}

pub fn register_state_change_listeners(listeners: Vec<Arc<dyn StateChangeListener>>) {
    DEFAULT_REGISTRY.register_state_change_listeners(listeners)
}

pub fn clear_state_change_listeners() {
    DEFAULT_REGISTRY.clear_state_change_listeners()
}

/// `reset` forgets every command key of the default registry, for test isolation.
pub fn reset() {
    DEFAULT_REGISTRY.reset()
}
