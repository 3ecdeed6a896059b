//! Initialization sets up the runtime environment of bulwark:
//! 1. override the global config, from a hand-built entity, a YAML file or env variables
//! 2. initialize the global logger
//! 3. configure the default registry with the command configs of the global config

use super::default_registry;
use crate::config::{self, ConfigEntity};
use crate::{logging, Result};

/// `init_default` initializes bulwark using the configuration from system
/// environment and the default value.
#[inline]
pub fn init_default() -> Result<()> {
    init_bulwark(&mut String::new())
}

/// `init_with_config` initializes bulwark using given config.
#[inline]
pub fn init_with_config(config_entity: ConfigEntity) -> Result<()> {
    config_entity.check()?;
    config::reset_global_config(config_entity);
    config::override_config_from_env_and_init_log()?;
    init_commands()
}

/// `init_with_config_file` loads the general configuration from the given YAML file
/// and initializes bulwark.
#[inline]
pub fn init_with_config_file(config_path: &mut String) -> Result<()> {
    init_bulwark(config_path)
}

#[inline]
fn init_bulwark(config_path: &mut String) -> Result<()> {
    // Initialize general config and logging module.
    config::init_config_with_yaml(config_path)?;
    init_commands()
}

// `init_commands` applies the command configs of the global config to the default registry
fn init_commands() -> Result<()> {
    let registry = default_registry();
    registry.set_default_config(config::command_defaults())?;
    for (name, command) in config::commands() {
        registry.register_command(name.as_str().into(), command)?;
    }
    logging::info!(
        "[Init] Bulwark initialized, commands: {:?}",
        registry.command_keys()
    );
    Ok(())
}
