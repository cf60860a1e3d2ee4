//! Application execution logic.
//!
//! This module runs the validated request against the platform kernel,
//! applies listing presentation settings, and prints the result.

use std::io::{self, Write};

use colored::Colorize;
use thiserror::Error;
use tracing::debug;

use ifctl::config::{OutputFormat, ValidatedConfig};
use ifctl::network::filter::FilterChain;
use ifctl::network::platform::PlatformKernel;
use ifctl::network::{
    AddressControl, DecodedAddress, IpVersion, NetError, RouteControl, TunnelControl,
};
use ifctl::resource::{Listing, Outcome, Request, Response, dispatch};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// The kernel query or mutation failed.
    #[error("{request}: {source}")]
    Operation {
        /// The request that failed, as text.
        request: String,
        /// Underlying error.
        #[source]
        source: NetError,
    },

    /// Writing the result failed.
    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),

    /// Serializing the result failed.
    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Presentation settings extracted from validated config.
struct View<'a> {
    filter: &'a FilterChain,
    families: IpVersion,
    show_unsupported: bool,
}

impl<'a> From<&'a ValidatedConfig> for View<'a> {
    fn from(config: &'a ValidatedConfig) -> Self {
        Self {
            filter: &config.filter,
            families: config.families,
            show_unsupported: config.show_unsupported,
        }
    }
}

impl View<'_> {
    const fn keeps(&self, address: &DecodedAddress) -> bool {
        self.families.includes(address.family)
            && (self.show_unsupported || address.is_supported())
    }

    /// Applies filters and visibility to a listing.
    ///
    /// Interfaces and routes left without entries are dropped.
    fn present(&self, listing: Listing) -> Listing {
        match listing {
            Listing::Addresses(mut set) => {
                self.filter.apply_to_addresses(&mut set);
                set.retain_addresses(|address| self.keeps(address));
                set.retain(|interface| !interface.addresses.is_empty());
                Listing::Addresses(set)
            }
            Listing::Routes(mut routes) => {
                for route in &mut routes {
                    route.entries.retain(|entry| self.keeps(entry));
                }
                routes.retain(|route| !route.entries.is_empty());
                Listing::Routes(routes)
            }
            Listing::Tunnels(mut tunnels) => {
                self.filter.apply_to_tunnels(&mut tunnels);
                Listing::Tunnels(tunnels)
            }
        }
    }
}

/// Executes the configured request against the platform kernel.
///
/// # Errors
///
/// Returns [`RunError::Operation`] when the kernel call fails, and
/// [`RunError::Output`] when stdout cannot be written.
pub fn execute(config: &ValidatedConfig) -> Result<(), RunError> {
    if !config.color {
        colored::control::set_override(false);
    }

    let kernel = PlatformKernel::new();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute_with(&kernel, config, &mut out)?;
    out.flush()?;
    Ok(())
}

fn execute_with<K, W>(kernel: &K, config: &ValidatedConfig, out: &mut W) -> Result<(), RunError>
where
    K: AddressControl + RouteControl + TunnelControl + ?Sized,
    W: Write,
{
    debug!(request = %config.request, "Dispatching request");

    let response = dispatch(kernel, &config.request, config.resource_options()).map_err(|source| {
        RunError::Operation {
            request: config.request.to_string(),
            source,
        }
    })?;

    let response = match response {
        Response::Listing(listing) => Response::Listing(View::from(config).present(listing)),
        outcome @ Response::Outcome { .. } => outcome,
    };

    match config.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &response)?;
            writeln!(out)?;
        }
        OutputFormat::Text => render_text(out, &config.request, &response)?,
    }
    Ok(())
}

// ============================================================================
// Text rendering
// ============================================================================

fn render_text<W: Write>(out: &mut W, request: &Request, response: &Response) -> io::Result<()> {
    match response {
        Response::Listing(listing) => render_listing(out, listing),
        Response::Outcome { outcome } => {
            let status = match outcome {
                Outcome::Success => outcome.to_string().green(),
                Outcome::AlreadyExists | Outcome::NotFound => outcome.to_string().yellow(),
            };
            writeln!(out, "{request}: {status}")
        }
    }
}

fn render_listing<W: Write>(out: &mut W, listing: &Listing) -> io::Result<()> {
    match listing {
        Listing::Addresses(set) => {
            for interface in set {
                let addresses: Vec<String> = interface.addresses.iter().map(entry).collect();
                writeln!(out, "{} {}", interface.name.bold(), addresses.join(" "))?;
            }
        }
        Listing::Routes(routes) => {
            for (index, route) in routes.iter().enumerate() {
                if index > 0 {
                    writeln!(out)?;
                }
                writeln!(out, "{} {}", "route".bold(), route.family.to_string().cyan())?;
                for address in &route.entries {
                    writeln!(out, "  {}", entry(address))?;
                }
            }
        }
        Listing::Tunnels(tunnels) => {
            for tunnel in tunnels {
                writeln!(out, "{} {}", tunnel.name.bold(), tunnel.kind.to_string().cyan())?;
            }
        }
    }
    Ok(())
}

fn entry(address: &DecodedAddress) -> String {
    if address.is_supported() {
        address.text.clone()
    } else {
        "unsupported".dimmed().to_string()
    }
}
