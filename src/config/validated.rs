//! Validated configuration after merging CLI and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::network::filter::{FilterChain, NameRegexFilter};
use crate::network::{IpVersion, TunnelKind};
use crate::resource::{Action, Parameters, Request, ResourceKind, ResourceOptions};

use super::cli::{ActionCommand, Cli, Command};
use super::defaults;
use super::error::ConfigError;
use super::toml::TomlConfig;

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON document on stdout.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Fully validated configuration ready for use by the application.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config.
/// The function validates all inputs and returns errors for invalid configurations.
#[derive(Debug)]
pub struct ValidatedConfig {
    /// The operation to perform
    pub request: Request,

    /// Interface-name filter for listings
    pub filter: FilterChain,

    /// Families listings cover
    pub families: IpVersion,

    /// Output format
    pub format: OutputFormat,

    /// Colored text output
    pub color: bool,

    /// Whether unsupported entries are rendered
    pub show_unsupported: bool,

    /// Tunnel kind used when the request names none
    pub default_tunnel_kind: Option<TunnelKind>,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tunnel_kind = self
            .default_tunnel_kind
            .map_or_else(|| "auto".to_string(), |kind| kind.to_string());

        write!(
            f,
            "Config {{ request: {}, families: {}, format: {}, color: {}, show_unsupported: {}, \
             default_tunnel_kind: {}, filters: {}+{} }}",
            self.request,
            self.families,
            self.format,
            self.color,
            self.show_unsupported,
            tunnel_kind,
            self.filter.include_count(),
            self.filter.exclude_count(),
        )
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The command is `init`, which has no request
    /// - Request parameters are malformed
    /// - Regex patterns are invalid
    /// - The format, family, or tunnel kind in the TOML file is unknown
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        let request = resolve_request(&cli.command)?;
        let filter = Self::build_filter(cli, toml)?;
        let families = Self::resolve_families(cli, toml)?;
        let format = Self::resolve_format(cli, toml)?;

        // --no-color only disables
        let color = !cli.no_color
            && toml
                .and_then(|t| t.output.color)
                .unwrap_or(defaults::COLOR);

        // Flags only enable
        let show_unsupported =
            cli.show_unsupported || toml.is_some_and(|t| t.output.show_unsupported);

        let default_tunnel_kind = Self::resolve_tunnel_kind(toml)?;

        Ok(Self {
            request,
            filter,
            families,
            format,
            color,
            show_unsupported,
            default_tunnel_kind,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI and optional config file.
    ///
    /// Uses `cli.config` when set, otherwise the per-user file if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let toml = match config_path(cli, defaults::user_config_path()) {
            Some(path) => Some(TomlConfig::load(&path)?),
            None => None,
        };

        Self::from_raw(cli, toml.as_ref())
    }

    /// Settings forwarded to the resource layer.
    #[must_use]
    pub const fn resource_options(&self) -> ResourceOptions {
        ResourceOptions {
            families: self.families,
            default_tunnel_kind: self.default_tunnel_kind,
        }
    }

    fn build_filter(cli: &Cli, toml: Option<&TomlConfig>) -> Result<FilterChain, ConfigError> {
        let mut filter = FilterChain::new();

        // CLI patterns replace TOML patterns, per direction
        let includes = if cli.include_ifaces.is_empty() {
            toml.map_or(&[][..], |t| t.filter.include.as_slice())
        } else {
            cli.include_ifaces.as_slice()
        };
        for pattern in includes {
            filter = filter.include(compile(pattern)?);
        }

        let excludes = if cli.exclude_ifaces.is_empty() {
            toml.map_or(&[][..], |t| t.filter.exclude.as_slice())
        } else {
            cli.exclude_ifaces.as_slice()
        };
        for pattern in excludes {
            filter = filter.exclude(compile(pattern)?);
        }

        Ok(filter)
    }

    fn resolve_families(cli: &Cli, toml: Option<&TomlConfig>) -> Result<IpVersion, ConfigError> {
        // CLI takes precedence
        if let Some(version) = cli.family {
            return Ok(version.into());
        }

        match toml.and_then(|t| t.filter.family.as_deref()) {
            Some(value) => parse_ip_version(value),
            None => Ok(IpVersion::default()),
        }
    }

    fn resolve_format(cli: &Cli, toml: Option<&TomlConfig>) -> Result<OutputFormat, ConfigError> {
        if cli.json {
            return Ok(OutputFormat::Json);
        }

        match toml.and_then(|t| t.output.format.as_deref()) {
            Some(value) => parse_format(value),
            None => Ok(OutputFormat::default()),
        }
    }

    fn resolve_tunnel_kind(toml: Option<&TomlConfig>) -> Result<Option<TunnelKind>, ConfigError> {
        toml.and_then(|t| t.tunnel.default_kind.as_deref())
            .map(|value| {
                value
                    .parse::<TunnelKind>()
                    .map_err(|reason| ConfigError::InvalidTunnelKind { reason })
            })
            .transpose()
    }
}

/// Writes the default configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();
    std::fs::write(path, template).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Picks the configuration file: explicit `--config`, else `fallback` if it exists.
pub(super) fn config_path(cli: &Cli, fallback: Option<PathBuf>) -> Option<PathBuf> {
    cli.config
        .clone()
        .or_else(|| fallback.filter(|path| path.is_file()))
}

// Helper functions

fn resolve_request(command: &Command) -> Result<Request, ConfigError> {
    let (kind, action) = match command {
        Command::Address { action } => (ResourceKind::Address, action),
        Command::Route { action } => (ResourceKind::Route, action),
        Command::Tunnel { action } => (ResourceKind::Tunnel, action),
        Command::Init { .. } => return Err(ConfigError::NotAResourceCommand("init")),
    };

    let (action, params) = match action {
        ActionCommand::List => (Action::List, &[][..]),
        ActionCommand::Add { params } => (Action::Add, params.as_slice()),
        ActionCommand::Delete { params } => (Action::Delete, params.as_slice()),
    };

    let parameters = Parameters::parse(params).map_err(ConfigError::InvalidParameters)?;
    Ok(Request::new(kind, action, parameters))
}

fn compile(pattern: &str) -> Result<NameRegexFilter, ConfigError> {
    NameRegexFilter::new(pattern).map_err(|e| ConfigError::InvalidRegex {
        pattern: pattern.to_string(),
        source: e,
    })
}

fn parse_ip_version(s: &str) -> Result<IpVersion, ConfigError> {
    match s.to_lowercase().as_str() {
        "ipv4" | "v4" | "4" => Ok(IpVersion::V4),
        "ipv6" | "v6" | "6" => Ok(IpVersion::V6),
        "both" | "all" | "dual" => Ok(IpVersion::Both),
        _ => Err(ConfigError::InvalidIpVersion {
            value: s.to_string(),
        }),
    }
}

fn parse_format(s: &str) -> Result<OutputFormat, ConfigError> {
    match s.to_lowercase().as_str() {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        _ => Err(ConfigError::InvalidFormat {
            value: s.to_string(),
        }),
    }
}
