//! Bridge Configuration Module
//!
//! Tool commands, speed-service credentials and supervisor timing, loaded
//! from TOML.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `TREADMILL_CONFIG` environment variable (path to TOML file)
//! 3. `bridge_config.toml` in the current working directory
//! 4. Built-in defaults (see [`defaults`])
//!
//! `server.addr` can additionally be overridden by `TREADMILL_SERVER_ADDR`
//! and `--addr`, applied in that order.

mod bridge_config;
pub mod defaults;
pub mod validation;

pub use bridge_config::*;
