//! Kernel primitives behind the resource objects.
//!
//! Each resource kind talks to the kernel through one trait so the
//! resource logic can be exercised against in-memory implementations.
//! Queries return fully copied Rust values; kernel buffers never outlive
//! the call that acquired them. Mutations return the raw OS error so the
//! caller can tell "already there" and "not there" apart from failures.

use std::fmt;
use std::io;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{AddressFamily, InterfaceRecord, NetError, RouteMessage, netmask};

/// An address to assign to, or remove from, an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressAssignment {
    /// Target interface name.
    pub interface: String,
    /// The address itself.
    pub address: IpAddr,
    /// Prefix length of the attached subnet.
    pub prefix_len: u8,
}

impl AddressAssignment {
    /// Family of the address.
    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.address)
    }

    /// Netmask derived from the prefix length.
    #[must_use]
    pub fn netmask(&self) -> IpAddr {
        netmask(self.family(), self.prefix_len).unwrap_or(self.address)
    }
}

impl fmt::Display for AddressAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} on {}", self.address, self.prefix_len, self.interface)
    }
}

/// A routing table entry to add or delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    /// Destination network address.
    pub destination: IpAddr,
    /// Destination prefix length.
    pub prefix_len: u8,
    /// Next hop, if routed via a gateway.
    pub gateway: Option<IpAddr>,
    /// Outgoing interface, if bound to one.
    pub interface: Option<String>,
}

impl RouteSpec {
    /// Family of the destination.
    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        AddressFamily::of(&self.destination)
    }

    /// Netmask derived from the prefix length.
    #[must_use]
    pub fn netmask(&self) -> IpAddr {
        netmask(self.family(), self.prefix_len).unwrap_or(self.destination)
    }

    /// Returns true for a host route (full-length prefix).
    #[must_use]
    pub const fn is_host(&self) -> bool {
        self.prefix_len == self.family().max_prefix_len()
    }
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.destination, self.prefix_len)?;
        if let Some(gateway) = self.gateway {
            write!(f, " via {gateway}")?;
        }
        if let Some(ref interface) = self.interface {
            write!(f, " dev {interface}")?;
        }
        Ok(())
    }
}

/// Kind of virtual tunnel interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TunnelKind {
    /// Layer 3 tun device.
    Tun,
    /// Layer 2 tap device.
    Tap,
    /// Generic IP-in-IP tunnel.
    Gif,
    /// GRE tunnel.
    Gre,
}

impl TunnelKind {
    /// All kinds, in display order.
    pub const ALL: [Self; 4] = [Self::Tun, Self::Tap, Self::Gif, Self::Gre];

    /// Canonical lowercase name, also the interface-cloner name on BSD.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tun => "tun",
            Self::Tap => "tap",
            Self::Gif => "gif",
            Self::Gre => "gre",
        }
    }
}

impl fmt::Display for TunnelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TunnelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("expected one of tun, tap, gif, gre; got '{s}'"))
    }
}

/// A tunnel interface to create or destroy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSpec {
    /// Interface name.
    pub name: String,
    /// Tunnel kind.
    pub kind: TunnelKind,
}

/// A tunnel interface present on the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TunnelInfo {
    /// Interface name.
    pub name: String,
    /// Tunnel kind.
    pub kind: TunnelKind,
}

impl TunnelInfo {
    /// Creates a tunnel description.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: TunnelKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Interface-address primitives.
pub trait AddressControl {
    /// Copies out the kernel's interface-address list.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] when the list cannot be retrieved.
    fn interface_records(&self) -> Result<Vec<InterfaceRecord>, NetError>;

    /// Assigns an address to an interface.
    ///
    /// # Errors
    ///
    /// Returns the OS error; `EEXIST` means the address is already present.
    fn add_address(&self, assignment: &AddressAssignment) -> io::Result<()>;

    /// Removes an address from an interface.
    ///
    /// # Errors
    ///
    /// Returns the OS error; `EADDRNOTAVAIL` means the address was absent.
    fn remove_address(&self, assignment: &AddressAssignment) -> io::Result<()>;
}

/// Routing table primitives.
pub trait RouteControl {
    /// Dumps the routing table for one family.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::ResourceUnavailable`] when the query fails and
    /// [`NetError::OutOfMemory`] when the dump buffer cannot be allocated.
    fn dump_routes(&self, family: AddressFamily) -> Result<Vec<RouteMessage>, NetError>;

    /// Adds a route.
    ///
    /// # Errors
    ///
    /// Returns the OS error; `EEXIST` means the route is already present.
    fn add_route(&self, route: &RouteSpec) -> io::Result<()>;

    /// Deletes a route.
    ///
    /// # Errors
    ///
    /// Returns the OS error; `ESRCH` means no such route.
    fn delete_route(&self, route: &RouteSpec) -> io::Result<()>;
}

/// Tunnel interface lifecycle primitives.
pub trait TunnelControl {
    /// Lists tunnel interfaces of the [`supported_kinds`](Self::supported_kinds).
    /// An empty list is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] when the interface list cannot be read.
    fn tunnels(&self) -> Result<Vec<TunnelInfo>, NetError>;

    /// Kinds this platform can create.
    fn supported_kinds(&self) -> &'static [TunnelKind];

    /// True when the interface name selects the kind (BSD cloners), so a
    /// name must start with its kind.
    fn name_selects_kind(&self) -> bool {
        false
    }

    /// Creates a tunnel interface.
    ///
    /// # Errors
    ///
    /// Returns the OS error; `EEXIST` means the interface already exists.
    fn create_tunnel(&self, tunnel: &TunnelSpec) -> io::Result<()>;

    /// Destroys a tunnel interface.
    ///
    /// # Errors
    ///
    /// Returns the OS error; `ENXIO`/`ENODEV` mean no such interface.
    fn destroy_tunnel(&self, tunnel: &TunnelSpec) -> io::Result<()>;
}
