//! Tunnel interface resource.

use tracing::{debug, info};

use super::{Listing, Outcome, Parameters, Resource, ResourceKind, classify};
use crate::network::{NetError, TunnelControl, TunnelInfo, TunnelKind, TunnelSpec};

const KEYS: &[&str] = &["name", "kind"];

/// Longest interface name the kernel accepts (excluding the terminator).
const MAX_NAME_LEN: usize = 15;

/// Checks that `name` is usable as an interface name.
///
/// # Errors
///
/// Returns [`NetError::InvalidArgument`] when the name is empty, longer
/// than 15 bytes, or contains `/`, NUL, or whitespace.
pub fn validate_interface_name(name: &str) -> Result<(), NetError> {
    if name.is_empty() {
        return Err(NetError::invalid("interface", "name is empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(NetError::invalid(
            "interface",
            format!("'{name}' is longer than {MAX_NAME_LEN} bytes"),
        ));
    }
    if name.chars().any(|c| c == '/' || c == '\0' || c.is_whitespace()) {
        return Err(NetError::invalid(
            "interface",
            format!("'{name}' contains '/', NUL, or whitespace"),
        ));
    }
    Ok(())
}

/// Kind named by a cloner-style interface name (`gif0` is a gif tunnel).
fn kind_from_name(name: &str) -> Option<TunnelKind> {
    name.trim_end_matches(|c: char| c.is_ascii_digit()).parse().ok()
}

/// Lists, creates, and destroys tunnel interfaces.
#[derive(Debug)]
pub struct TunnelResource<'k, K: ?Sized> {
    kernel: &'k K,
    default_kind: Option<TunnelKind>,
}

impl<'k, K: TunnelControl + ?Sized> TunnelResource<'k, K> {
    /// Creates the resource over `kernel`.
    ///
    /// `default_kind` is used when a request names no kind.
    #[must_use]
    pub const fn new(kernel: &'k K, default_kind: Option<TunnelKind>) -> Self {
        Self {
            kernel,
            default_kind,
        }
    }

    /// Lists tunnel interfaces. No tunnels is an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] when the interface list cannot be read.
    pub fn tunnels(&self) -> Result<Vec<TunnelInfo>, NetError> {
        self.kernel.tunnels()
    }

    /// Creates tunnel `name`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidArgument`] for a bad name or a kind this
    /// platform cannot create, and other variants for kernel failures.
    pub fn add_tunnel(&self, name: &str, kind: Option<TunnelKind>) -> Result<Outcome, NetError> {
        validate_interface_name(name)?;
        if self.tunnels()?.iter().any(|t| t.name == name) {
            debug!("Tunnel {} already present", name);
            return Ok(Outcome::AlreadyExists);
        }

        let spec = self.resolve(name, kind)?;
        let outcome = classify(self.kernel.create_tunnel(&spec), "create tunnel", &[])?;
        if outcome == Outcome::Success {
            info!("Created {} tunnel {}", spec.kind, spec.name);
        }
        Ok(outcome)
    }

    /// Destroys tunnel `name`.
    ///
    /// # Errors
    ///
    /// Same as [`TunnelResource::add_tunnel`].
    pub fn delete_tunnel(&self, name: &str, kind: Option<TunnelKind>) -> Result<Outcome, NetError> {
        validate_interface_name(name)?;
        let Some(existing) = self.tunnels()?.into_iter().find(|t| t.name == name) else {
            debug!("Tunnel {} not present", name);
            return Ok(Outcome::NotFound);
        };

        let spec = self.resolve(name, kind.or(Some(existing.kind)))?;
        let outcome = classify(
            self.kernel.destroy_tunnel(&spec),
            "destroy tunnel",
            &[libc::ENXIO, libc::ENODEV],
        )?;
        if outcome == Outcome::Success {
            info!("Destroyed {} tunnel {}", spec.kind, spec.name);
        }
        Ok(outcome)
    }

    /// Settles the kind for `name` and checks the platform can handle it.
    fn resolve(&self, name: &str, kind: Option<TunnelKind>) -> Result<TunnelSpec, NetError> {
        let supported = self.kernel.supported_kinds();
        let named = if self.kernel.name_selects_kind() {
            kind_from_name(name)
        } else {
            None
        };

        let kind = kind
            .or(named)
            .or(self.default_kind)
            .or_else(|| supported.first().copied())
            .ok_or_else(|| NetError::invalid("kind", "this platform cannot create tunnels"))?;

        if !supported.contains(&kind) {
            let names: Vec<&str> = supported.iter().map(|k| k.name()).collect();
            return Err(NetError::invalid(
                "kind",
                format!("{kind} tunnels are not supported here (supported: {})", names.join(", ")),
            ));
        }
        if self.kernel.name_selects_kind() && named != Some(kind) {
            return Err(NetError::invalid(
                "name",
                format!("a {kind} tunnel must be named {kind}<N>, got '{name}'"),
            ));
        }

        Ok(TunnelSpec {
            name: name.to_owned(),
            kind,
        })
    }
}

fn kind_parameter(parameters: &Parameters) -> Result<Option<TunnelKind>, NetError> {
    parameters
        .get("kind")
        .map(|text| text.parse().map_err(|reason: String| NetError::invalid("kind", reason)))
        .transpose()
}

impl<K: TunnelControl + ?Sized> Resource for TunnelResource<'_, K> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Tunnel
    }

    fn list(&self) -> Result<Listing, NetError> {
        self.tunnels().map(Listing::Tunnels)
    }

    fn add(&self, parameters: &Parameters) -> Result<Outcome, NetError> {
        parameters.expect_only(KEYS)?;
        self.add_tunnel(parameters.require("name")?, kind_parameter(parameters)?)
    }

    fn delete(&self, parameters: &Parameters) -> Result<Outcome, NetError> {
        parameters.expect_only(KEYS)?;
        self.delete_tunnel(parameters.require("name")?, kind_parameter(parameters)?)
    }
}
