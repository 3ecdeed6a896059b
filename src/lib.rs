#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Bulwark
//!
//! Bulwark wraps a unit of work, typically a call to a remote dependency, with
//! **bounded concurrency** (bulkheading), an **enforced timeout**, **fallback** behavior
//! and a **circuit breaker** that stops calling a chronically failing dependency.
//!
//! Executions are grouped by a `CommandKey`. Every key owns one circuit breaker
//! (which in turn owns the rolling metrics window) and one bulkhead. They are created lazily
//! on first use and live in a `CommandRegistry` until it is reset.
//!
//! The control flow of a single execution is:
//!
//! ```text
//! caller -> executor -> breaker.try_pass? -> bulkhead.acquire -> work (under deadline)
//!        -> record outcome -> fallback (on any failure path) -> notify -> result
//! ```
//!
//! ## Add Dependency
//!
//! ```toml
//! [dependencies]
//! bulwark = { version = "0.1.0" }
//! ```
//!
//! Optional features lists:
//! - logger_env: Use `env_logger` to initialize logging.
//! - logger_log4rs: Use `log4rs` to initialize logging.
//!
//! ## Initialization
//!
//! The `api` module provides following interfaces:
//!
//! - `init_default()`: Load configurations from environment variable. For undefined configurations, use default values.
//! - `init_with_config_file(config_path: &mut String)`: Load configurations from a YAML file.
//! - `init_with_config(config_entity: ConfigEntity)`: Use hand-crafted `ConfigEntity` to initialize.
//!
//! ## Executing a Command
//!
//! ```rust
//! use bulwark::{command::Command, CommandConfig};
//!
//! bulwark::register_command("remote".into(), CommandConfig {
//!     timeout_ms: 200,
//!     ..Default::default()
//! })?;
//! let command = Command::new("remote".into(), |_ctx| call_remote())
//!     .with_fallback(|_err| Ok(String::from("N/A")));
//! let value = bulwark::execute(command)?;
//! ```
//!
//! Callers that need an explicit lifecycle (tests, multi-tenant hosts) build their own
//! `CommandRegistry` and `CommandExecutor` instead of using the process-wide default.

/// Process-wide API and initialization.
pub mod api;
/// Core implementations: the rolling metrics window and its underlying LeapArray,
/// the circuit breaker, the bulkhead, the command executor and its registry,
/// event notification and engine configuration.
pub mod core;
/// Adapters for different logging crates.
pub mod logging;
// Utility functions.
pub mod utils;

// re-export precludes
pub use crate::core::*;
pub use api::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
