//! mod `api` provides the topmost APIs for users of bulwark, backed by a process-wide
//! default `CommandRegistry`. Bulwark supports three ways to perform initialization:
//!
//!  1. `init_default()`, using the system environment and default values.
//!  2. `init_with_config(config_entity: ConfigEntity)`, using a customized `ConfigEntity`.
//!  3. `init_with_config_file(config_path: &mut String)`, using a YAML file.
//!
//! Initialization is optional: commands never registered run with the default `CommandConfig`.
//!
//! ```ignore
//! bulwark::init_default()?;
//! bulwark::register_command("remote".into(), CommandConfig {
//!     timeout_ms: 200,
//!     ..Default::default()
//! })?;
//! let value = bulwark::execute(
//!     Command::new("remote".into(), |ctx| call_remote(ctx.remaining()))
//!         .with_fallback(|_err| Ok(String::from("N/A"))),
//! )?;
//! ```

mod api;
mod init;

pub use api::*;
pub use init::*;
