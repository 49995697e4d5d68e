//! Process-wide server configuration for Rustio.
//!
//! This crate owns the versioned server configuration persisted at
//! `<config-dir>/config.json`: access credentials, the serving region, and
//! the logger targets. The configuration is loaded (or synthesized with
//! fresh credentials) once at startup and guarded by a reader/writer lock
//! so request handlers can read it concurrently while administrative
//! updates stay exclusive.
//!
//! # Usage
//!
//! ```no_run
//! let store = rustio_core::init_config("/etc/rustio").unwrap();
//! let region = store.region();
//! assert!(!region.is_empty());
//! ```

pub mod config;
pub mod credential;
pub mod error;

pub use config::{CONFIG_VERSION, ConfigStore, ServerConfig, init_config, server_config};
pub use credential::Credential;
pub use error::ConfigError;
