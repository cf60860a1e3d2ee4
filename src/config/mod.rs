//! Configuration layer for ifctl.
//!
//! This module provides:
//! - CLI argument parsing ([`Cli`], [`Command`], [`ActionCommand`])
//! - TOML configuration file parsing ([`TomlConfig`])
//! - Validated configuration ([`ValidatedConfig`])
//! - Configuration file generation ([`write_default_config`])
//! - Default values ([`defaults`])
//!
//! # Priority
//!
//! Configuration values are resolved with the following priority (highest to lowest):
//!
//! 1. **Explicit CLI arguments** - Values explicitly passed via command line
//! 2. **TOML config file** - `--config <path>`, else `<config dir>/ifctl/config.toml`
//! 3. **Built-in defaults** - Hardcoded default values
//!
//! For filter patterns (`include`, `exclude`), CLI patterns **replace**
//! TOML patterns entirely (not merged). Include and exclude are handled
//! independently.
//!
//! # Boolean Flag Semantics
//!
//! `--show-unsupported` uses OR semantics with `output.show_unsupported`.
//! `--no-color` only disables; it wins over `output.color = true`.
//!
//! # TOML-Only Options
//!
//! `tunnel.default_kind` has no CLI flag; a request's `kind=` parameter
//! overrides it per call.

mod cli;
pub mod defaults;
mod error;
mod toml;
mod validated;

#[cfg(test)]
mod cli_tests;
#[cfg(test)]
mod validated_tests;

pub use cli::{ActionCommand, Cli, Command, IpVersionArg};
pub use error::ConfigError;
pub use toml::{TomlConfig, default_config_template};
pub use validated::{OutputFormat, ValidatedConfig, write_default_config};
