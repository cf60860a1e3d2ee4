//! Resource objects: addresses, routes, and tunnels behind one contract.
//!
//! Every resource kind supports `list`, `add`, and `delete` through the
//! [`Resource`] trait. Mutations are idempotent: adding something already
//! present reports [`Outcome::AlreadyExists`], deleting something absent
//! reports [`Outcome::NotFound`]. Neither is an error.
//!
//! Resource objects borrow a kernel implementation (see
//! [`crate::network::platform::PlatformKernel`]) for the duration of one
//! call and keep no state between calls.

mod address;
mod params;
mod route;
mod tunnel;

#[cfg(test)]
mod mock_kernel;

use std::fmt;
use std::io;

use serde::Serialize;

use crate::network::{
    AddressControl, InterfaceAddressSet, IpVersion, NetError, RouteControl, RouteMessage,
    TunnelControl, TunnelInfo, TunnelKind,
};

pub use address::AddressResource;
pub use params::Parameters;
pub use route::RouteResource;
pub use tunnel::{TunnelResource, validate_interface_name};

/// The kind of resource an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Interface addresses.
    Address,
    /// Routing table entries.
    Route,
    /// Tunnel interfaces.
    Tunnel,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address => write!(f, "address"),
            Self::Route => write!(f, "route"),
            Self::Tunnel => write!(f, "tunnel"),
        }
    }
}

/// What to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Enumerate current state.
    List,
    /// Create or assign.
    Add,
    /// Remove or destroy.
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Add => write!(f, "add"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Result of a successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The change was applied.
    Success,
    /// Add of something already present; nothing changed.
    AlreadyExists,
    /// Delete of something absent; nothing changed.
    NotFound,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "ok"),
            Self::AlreadyExists => write!(f, "already exists"),
            Self::NotFound => write!(f, "not found"),
        }
    }
}

/// A fully parsed request: resource kind, action, and its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Target resource.
    pub kind: ResourceKind,
    /// Operation.
    pub action: Action,
    /// Resource-specific `key=value` parameters.
    pub parameters: Parameters,
}

impl Request {
    /// Creates a request.
    #[must_use]
    pub const fn new(kind: ResourceKind, action: Action, parameters: Parameters) -> Self {
        Self {
            kind,
            action,
            parameters,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.action)?;
        if !self.parameters.is_empty() {
            write!(f, " {}", self.parameters)?;
        }
        Ok(())
    }
}

/// The result of a `list` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Listing {
    /// Addresses grouped by interface.
    Addresses(InterfaceAddressSet),
    /// Decoded routing messages.
    Routes(Vec<RouteMessage>),
    /// Tunnel interfaces.
    Tunnels(Vec<TunnelInfo>),
}

/// The result of any operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// A listing.
    Listing(Listing),
    /// A mutation outcome.
    Outcome {
        /// What happened.
        outcome: Outcome,
    },
}

impl From<Listing> for Response {
    fn from(listing: Listing) -> Self {
        Self::Listing(listing)
    }
}

impl From<Outcome> for Response {
    fn from(outcome: Outcome) -> Self {
        Self::Outcome { outcome }
    }
}

/// The contract every resource kind implements.
pub trait Resource {
    /// Which kind this object handles.
    fn kind(&self) -> ResourceKind;

    /// Enumerates current state.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] when the kernel query fails.
    fn list(&self) -> Result<Listing, NetError>;

    /// Applies an add.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidArgument`] for malformed parameters and
    /// other [`NetError`] variants for kernel failures.
    fn add(&self, parameters: &Parameters) -> Result<Outcome, NetError>;

    /// Applies a delete.
    ///
    /// # Errors
    ///
    /// Same as [`Resource::add`].
    fn delete(&self, parameters: &Parameters) -> Result<Outcome, NetError>;

    /// Runs `action` with `parameters`.
    ///
    /// # Errors
    ///
    /// Propagates the error of the selected operation. `list` rejects any
    /// parameters.
    fn operate(&self, action: Action, parameters: &Parameters) -> Result<Response, NetError> {
        match action {
            Action::List => {
                parameters.expect_only(&[])?;
                self.list().map(Response::from)
            }
            Action::Add => self.add(parameters).map(Response::from),
            Action::Delete => self.delete(parameters).map(Response::from),
        }
    }
}

/// Settings that shape resource behavior without changing its contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceOptions {
    /// Families a route listing covers.
    pub families: IpVersion,
    /// Tunnel kind used when a request names none.
    pub default_tunnel_kind: Option<TunnelKind>,
}

/// Runs `request` against `kernel`.
///
/// # Errors
///
/// Returns the [`NetError`] of the selected operation.
pub fn dispatch<K>(kernel: &K, request: &Request, options: ResourceOptions) -> Result<Response, NetError>
where
    K: AddressControl + RouteControl + TunnelControl + ?Sized,
{
    let resource: Box<dyn Resource + '_> = match request.kind {
        ResourceKind::Address => Box::new(AddressResource::new(kernel)),
        ResourceKind::Route => Box::new(RouteResource::new(kernel, options.families)),
        ResourceKind::Tunnel => Box::new(TunnelResource::new(kernel, options.default_tunnel_kind)),
    };
    resource.operate(request.action, &request.parameters)
}

// ============================================================================
// OS error classification
// ============================================================================

/// Maps the result of a kernel mutation to an outcome or an error.
///
/// `missing` lists the error numbers this resource reports for "no such
/// entry".
pub(crate) fn classify(
    result: io::Result<()>,
    operation: &'static str,
    missing: &[i32],
) -> Result<Outcome, NetError> {
    let error = match result {
        Ok(()) => return Ok(Outcome::Success),
        Err(error) => error,
    };

    match error.raw_os_error() {
        Some(libc::EEXIST) => Ok(Outcome::AlreadyExists),
        Some(code) if missing.contains(&code) => Ok(Outcome::NotFound),
        Some(libc::EINVAL) => Err(NetError::invalid(operation, "rejected by the kernel")),
        Some(libc::ENODEV) => Err(NetError::invalid("interface", "no such interface")),
        _ if error.kind() == io::ErrorKind::InvalidInput => {
            Err(NetError::invalid(operation, error.to_string()))
        }
        _ => Err(NetError::rejected(operation, error)),
    }
}
