//! Default values for configuration options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

use std::path::PathBuf;

/// Directory under the user configuration directory.
pub const CONFIG_DIR: &str = "ifctl";

/// Configuration file name, also the `init` output default.
pub const CONFIG_FILE_NAME: &str = "ifctl.toml";

/// Name of the file looked up in [`CONFIG_DIR`].
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Colored text output is on unless disabled.
pub const COLOR: bool = true;

/// Path of the per-user configuration file, if the platform has one.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(USER_CONFIG_FILE))
}
