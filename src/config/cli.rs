//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use super::defaults;

/// ifctl: inspect and change interface addresses, routes, and tunnels
///
/// Mutations take `key=value` parameters, for example
/// `ifctl addr add address=10.0.0.2/24 interface=en0`.
#[derive(Debug, Parser)]
#[command(name = "ifctl")]
#[command(version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)] // CLI flags are naturally boolean
pub struct Cli {
    /// Resource to operate on
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored text output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Address families to list
    #[arg(long, value_enum, global = true)]
    pub family: Option<IpVersionArg>,

    /// Regex pattern for interfaces to include in listings (can be specified multiple times)
    #[arg(long = "include-iface", value_name = "PATTERN", global = true)]
    pub include_ifaces: Vec<String>,

    /// Regex pattern for interfaces to exclude from listings (can be specified multiple times)
    #[arg(long = "exclude-iface", value_name = "PATTERN", global = true)]
    pub exclude_ifaces: Vec<String>,

    /// Also show link-layer and other unsupported entries
    #[arg(long = "show-unsupported", global = true)]
    pub show_unsupported: bool,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Subcommands for ifctl
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interface addresses
    #[command(visible_aliases = ["addr", "a"])]
    Address {
        /// Operation to perform
        #[command(subcommand)]
        action: ActionCommand,
    },

    /// Routing table entries
    #[command(visible_alias = "r")]
    Route {
        /// Operation to perform
        #[command(subcommand)]
        action: ActionCommand,
    },

    /// Tunnel interfaces
    #[command(name = "tunnel", visible_aliases = ["tun", "t"])]
    Tunnel {
        /// Operation to perform
        #[command(subcommand)]
        action: ActionCommand,
    },

    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = defaults::CONFIG_FILE_NAME)]
        output: PathBuf,
    },
}

/// Operation on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ActionCommand {
    /// List current entries
    #[command(visible_alias = "l")]
    List,

    /// Add an entry
    #[command(visible_alias = "a")]
    Add {
        /// Parameters as key=value
        #[arg(value_name = "KEY=VALUE")]
        params: Vec<String>,
    },

    /// Delete an entry
    #[command(visible_aliases = ["del", "d"])]
    Delete {
        /// Parameters as key=value
        #[arg(value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
}

/// IP version argument for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IpVersionArg {
    /// IPv4 only
    #[value(name = "ipv4")]
    V4,
    /// IPv6 only
    #[value(name = "ipv6")]
    V6,
    /// Both IPv4 and IPv6
    #[value(name = "both")]
    Both,
}

impl From<IpVersionArg> for crate::network::IpVersion {
    fn from(arg: IpVersionArg) -> Self {
        match arg {
            IpVersionArg::V4 => Self::V4,
            IpVersionArg::V6 => Self::V6,
            IpVersionArg::Both => Self::Both,
        }
    }
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Returns true if this is the init command.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Command::Init { .. })
    }
}
