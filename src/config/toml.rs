//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde.

use std::path::Path;

use serde::Deserialize;

use super::ConfigError;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Output rendering configuration
    #[serde(default)]
    pub output: OutputSection,

    /// Listing filter configuration
    #[serde(default)]
    pub filter: FilterSection,

    /// Tunnel configuration
    #[serde(default)]
    pub tunnel: TunnelSection,
}

/// Output rendering section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    /// "text" or "json"
    pub format: Option<String>,

    /// Colored text output
    pub color: Option<bool>,

    /// Render link-layer and other unsupported entries
    #[serde(default)]
    pub show_unsupported: bool,
}

/// Listing filter section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSection {
    /// Regex patterns for interfaces to include
    #[serde(default)]
    pub include: Vec<String>,

    /// Regex patterns for interfaces to exclude
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Address families listings cover: "ipv4", "ipv6", or "both"
    pub family: Option<String>,
}

/// Tunnel section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TunnelSection {
    /// Kind used when `kind=` is not given
    pub default_kind: Option<String>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# ifctl configuration file
# Looked up at <config dir>/ifctl/config.toml unless --config is given.

[output]
# Output format: "text" or "json" (--json overrides)
# format = "text"

# Colored text output (--no-color disables)
# color = true

# Show link-layer and other unsupported entries in listings
# show_unsupported = false

[filter]
# Regex patterns for interfaces to include in listings (empty = all)
# Note: CLI patterns REPLACE these entirely (not merged)
# include = ["^en", "^eth"]

# Regex patterns for interfaces to exclude from listings
# Note: CLI patterns REPLACE these entirely (not merged)
# exclude = ["^utun", "^bridge"]

# Address families listings cover
# Accepted values: "ipv4"/"v4"/"4", "ipv6"/"v6"/"6", or "both"/"all"/"dual"
# family = "both"

[tunnel]
# Tunnel kind used when a request gives no kind= parameter
# Accepted values: "tun", "tap", "gif", "gre" (availability depends on the platform)
# default_kind = "tun"
"#
    .to_string()
}
