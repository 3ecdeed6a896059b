use super::CommandConfig;
use crate::base::CommandKey;
use crate::circuitbreaker::{CircuitBreaker, State, StateChangeListener, StateChangeListeners};
use crate::isolation::{Bulkhead, BulkheadMetrics};
use crate::notifier::{EventDispatcher, EventNotifier, EventNotifiers, ExecutionEvent};
use crate::stat::{HealthSnapshot, MetricsWindow};
use crate::{logging, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// `CommandState` is the per-key triple: configuration, circuit breaker
/// (with its metrics window) and bulkhead.
pub struct CommandState {
    key: CommandKey,
    config: RwLock<Arc<CommandConfig>>,
    breaker: CircuitBreaker,
    bulkhead: Arc<Bulkhead>,
}

impl fmt::Debug for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandState")
            .field("key", &self.key)
            .field("config", &self.config())
            .field("breaker", &self.breaker)
            .field("bulkhead", &self.bulkhead)
            .finish()
    }
}

impl CommandState {
    fn new(key: CommandKey, config: CommandConfig, listeners: StateChangeListeners) -> Result<Self> {
        let stat = MetricsWindow::new(config.rolling_window_buckets, config.rolling_window_ms)?;
        Ok(CommandState {
            breaker: CircuitBreaker::new(key.clone(), stat, listeners),
            bulkhead: Arc::new(Bulkhead::new(key.clone(), &config)),
            config: RwLock::new(Arc::new(config)),
            key,
        })
    }

    pub fn key(&self) -> &CommandKey {
        &self.key
    }

    /// `config` returns the configuration in effect, an attempt keeps the one it started with.
    pub fn config(&self) -> Arc<CommandConfig> {
        Arc::clone(&self.config.read().unwrap())
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn bulkhead(&self) -> &Arc<Bulkhead> {
        &self.bulkhead
    }

    /// Applies a new configuration, keeping the breaker state and, when the window
    /// shape is unchanged, the accumulated metrics. Returns false if nothing changed.
    fn update(&self, config: CommandConfig) -> Result<bool> {
        let mut current = self.config.write().unwrap();
        if **current == config {
            return Ok(false);
        }
        if !current.is_stat_reusable(&config) {
            self.breaker.replace_stat(MetricsWindow::new(
                config.rolling_window_buckets,
                config.rolling_window_ms,
            )?);
        }
        self.bulkhead.update(&config);
        *current = Arc::new(config);
        Ok(true)
    }
}

/// `CommandRegistry` maps command keys to their state. States are created lazily on
/// first use, with the registry's default configuration, and live until removed or reset.
///
/// Different keys never contend beyond the map lookup: all per-key mutations happen
/// on the atomics and locks of that key's `CommandState`.
pub struct CommandRegistry {
    default_config: RwLock<CommandConfig>,
    commands: RwLock<HashMap<CommandKey, Arc<CommandState>>>,
    notifiers: EventNotifiers,
    dispatcher: EventDispatcher,
    listeners: StateChangeListeners,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("default_config", &*self.default_config.read().unwrap())
            .field("commands", &self.command_keys())
            .finish()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        let notifiers: EventNotifiers = Arc::new(RwLock::new(Vec::new()));
        CommandRegistry {
            default_config: RwLock::new(CommandConfig::default()),
            commands: RwLock::new(HashMap::new()),
            dispatcher: EventDispatcher::new(Arc::clone(&notifiers)),
            notifiers,
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_config(config: CommandConfig) -> Result<Self> {
        let registry = Self::default();
        registry.set_default_config(config)?;
        Ok(registry)
    }

    /// `set_default_config` sets the configuration of keys created lazily from now on.
    pub fn set_default_config(&self, config: CommandConfig) -> Result<()> {
        config.is_valid()?;
        *self.default_config.write().unwrap() = config;
        Ok(())
    }

    pub fn default_config(&self) -> CommandConfig {
        self.default_config.read().unwrap().clone()
    }

    /// `register_command` creates the state of `key`, or updates its tunables in place.
    /// Registering the same configuration again is a no-op and returns `Ok(false)`.
    pub fn register_command(&self, key: CommandKey, config: CommandConfig) -> Result<bool> {
        if let Err(err) = config.is_valid() {
            logging::warn!(
                "[Registry] Ignoring invalid config of {}, reason: {:?}, config: {}",
                key,
                err,
                config
            );
            return Err(err);
        }
        let mut commands = self.commands.write().unwrap();
        match commands.get(&key) {
            Some(state) => {
                let updated = state.update(config)?;
                if updated {
                    logging::info!("[Registry] Updated {} with {}", key, state.config());
                }
                Ok(updated)
            }
            None => {
                logging::info!("[Registry] Registered {} with {}", key, config);
                let state = CommandState::new(key.clone(), config, Arc::clone(&self.listeners))?;
                commands.insert(key, Arc::new(state));
                Ok(true)
            }
        }
    }

    /// `command_state` returns the state of `key`, creating it with the default configuration.
    pub fn command_state(&self, key: &CommandKey) -> Result<Arc<CommandState>> {
        if let Some(state) = self.commands.read().unwrap().get(key) {
            return Ok(Arc::clone(state));
        }
        let mut commands = self.commands.write().unwrap();
        if let Some(state) = commands.get(key) {
            return Ok(Arc::clone(state));
        }
        let state = Arc::new(CommandState::new(
            key.clone(),
            self.default_config(),
            Arc::clone(&self.listeners),
        )?);
        logging::debug!("[Registry] Created {} with the default config", key);
        commands.insert(key.clone(), Arc::clone(&state));
        Ok(state)
    }

    fn get_state(&self, key: &CommandKey) -> Option<Arc<CommandState>> {
        self.commands.read().unwrap().get(key).map(Arc::clone)
    }

    /// `remove_command` forgets the state of `key`, executions in flight keep theirs.
    pub fn remove_command(&self, key: &CommandKey) -> bool {
        self.commands.write().unwrap().remove(key).is_some()
    }

    pub fn command_keys(&self) -> Vec<CommandKey> {
        let mut keys: Vec<CommandKey> = self.commands.read().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn command_config(&self, key: &CommandKey) -> Option<CommandConfig> {
        self.get_state(key).map(|state| (*state.config()).clone())
    }

    pub fn breaker_state(&self, key: &CommandKey) -> Option<State> {
        self.get_state(key)
            .map(|state| state.breaker().current_state())
    }

    pub fn metrics_snapshot(&self, key: &CommandKey) -> Option<HealthSnapshot> {
        self.get_state(key)
            .map(|state| state.breaker().stat().snapshot())
    }

    pub fn bulkhead_metrics(&self, key: &CommandKey) -> Option<BulkheadMetrics> {
        self.get_state(key).map(|state| state.bulkhead().metrics())
    }

    pub fn register_event_notifiers(&self, notifiers: Vec<Arc<dyn EventNotifier>>) {
        self.notifiers.write().unwrap().extend(notifiers);
    }

    pub fn clear_event_notifiers(&self) {
        self.notifiers.write().unwrap().clear();
    }

    /// `dispatch_event` queues the event for the notifiers and returns at once.
    pub(crate) fn dispatch_event(&self, event: ExecutionEvent) {
        self.dispatcher.dispatch(event);
    }

    pub fn register_state_change_listeners(&self, listeners: Vec<Arc<dyn StateChangeListener>>) {
        self.listeners.write().unwrap().extend(listeners);
    }

    pub fn clear_state_change_listeners(&self) {
        self.listeners.write().unwrap().clear();
    }

    /// `reset` drops every command state, breakers and metrics start over on next use.
    /// Notifiers and listeners are kept.
    pub fn reset(&self) {
        self.commands.write().unwrap().clear();
        logging::info!("[Registry] Reset all commands");
    }
}
