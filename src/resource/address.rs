//! Interface address resource.

use std::net::IpAddr;

use tracing::{debug, info};

use super::params::{parse_cidr, parse_prefix};
use super::{Listing, Outcome, Parameters, Resource, ResourceKind, classify, validate_interface_name};
use crate::network::{
    AddressAssignment, AddressControl, AddressFamily, InterfaceAddressSet, InterfaceRecord,
    NetError, enumerate, find_assignment,
};

const KEYS: &[&str] = &["address", "prefix", "interface"];

/// Lists, assigns, and removes interface addresses.
#[derive(Debug)]
pub struct AddressResource<'k, K: ?Sized> {
    kernel: &'k K,
}

impl<'k, K: AddressControl + ?Sized> AddressResource<'k, K> {
    /// Creates the resource over `kernel`.
    #[must_use]
    pub const fn new(kernel: &'k K) -> Self {
        Self { kernel }
    }

    /// Enumerates addresses grouped by interface.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] when the kernel list cannot be retrieved.
    pub fn addresses(&self) -> Result<InterfaceAddressSet, NetError> {
        enumerate(self.kernel)
    }

    /// Assigns `address` to `interface`.
    ///
    /// The prefix defaults to the full host length.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidArgument`] for a bad interface name,
    /// prefix, or unknown interface, and other variants for kernel failures.
    pub fn add_address(
        &self,
        address: IpAddr,
        prefix_len: Option<u8>,
        interface: &str,
    ) -> Result<Outcome, NetError> {
        let target = Target::new(address, prefix_len, interface)?;
        self.add_assignment(&target.assignment(None))
    }

    /// Removes `address` from `interface`.
    ///
    /// The kernel matches deletions on the prefix as well, so the prefix the
    /// address is currently assigned with is used.
    ///
    /// # Errors
    ///
    /// Same as [`AddressResource::add_address`].
    pub fn delete_address(&self, address: IpAddr, interface: &str) -> Result<Outcome, NetError> {
        self.delete_target(&Target::new(address, None, interface)?)
    }

    fn records(&self, interface: &str) -> Result<Vec<InterfaceRecord>, NetError> {
        let records = self.kernel.interface_records()?;
        if !records.iter().any(|r| r.name == interface) {
            return Err(NetError::invalid(
                "interface",
                format!("no such interface '{interface}'"),
            ));
        }
        Ok(records)
    }

    fn add_assignment(&self, assignment: &AddressAssignment) -> Result<Outcome, NetError> {
        let records = self.records(&assignment.interface)?;
        if find_assignment(&records, &assignment.interface, assignment.address).is_some() {
            debug!("Address {} already present", assignment);
            return Ok(Outcome::AlreadyExists);
        }

        let outcome = classify(self.kernel.add_address(assignment), "add address", &[])?;
        if outcome == Outcome::Success {
            info!("Added address {}", assignment);
        }
        Ok(outcome)
    }

    fn delete_target(&self, target: &Target) -> Result<Outcome, NetError> {
        let records = self.records(&target.interface)?;
        let Some(record) = find_assignment(&records, &target.interface, target.address) else {
            debug!("Address {} not present on {}", target.address, target.interface);
            return Ok(Outcome::NotFound);
        };

        let assignment = target.assignment(record.prefix_len());
        let outcome = classify(
            self.kernel.remove_address(&assignment),
            "delete address",
            &[libc::EADDRNOTAVAIL],
        )?;
        if outcome == Outcome::Success {
            info!("Removed address {}", assignment);
        }
        Ok(outcome)
    }
}

/// A validated address request; `prefix_len` is `None` when not given.
struct Target {
    address: IpAddr,
    prefix_len: Option<u8>,
    interface: String,
}

impl Target {
    fn new(address: IpAddr, prefix_len: Option<u8>, interface: &str) -> Result<Self, NetError> {
        validate_interface_name(interface)?;
        let max = AddressFamily::of(&address).max_prefix_len();
        if let Some(prefix_len) = prefix_len.filter(|&p| p > max) {
            return Err(NetError::invalid(
                "prefix",
                format!("prefix length {prefix_len} exceeds {max}"),
            ));
        }
        Ok(Self {
            address,
            prefix_len,
            interface: interface.to_owned(),
        })
    }

    /// Resolves the prefix: the caller's, then `fallback`, then a host prefix.
    fn assignment(&self, fallback: Option<u8>) -> AddressAssignment {
        let family = AddressFamily::of(&self.address);
        AddressAssignment {
            interface: self.interface.clone(),
            address: self.address,
            prefix_len: self
                .prefix_len
                .or(fallback)
                .unwrap_or_else(|| family.max_prefix_len()),
        }
    }
}

/// Reads `address` (optionally CIDR), `prefix`, and `interface`.
fn from_parameters(parameters: &Parameters) -> Result<Target, NetError> {
    parameters.expect_only(KEYS)?;
    let (address, cidr_prefix) = parse_cidr("address", parameters.require("address")?)?;
    let explicit = parameters
        .get("prefix")
        .map(|text| parse_prefix("prefix", text, AddressFamily::of(&address)))
        .transpose()?;

    let prefix_len = match (cidr_prefix, explicit) {
        (Some(a), Some(b)) if a != b => {
            return Err(NetError::invalid(
                "prefix",
                format!("conflicts with /{a} given in address"),
            ));
        }
        (cidr, explicit) => cidr.or(explicit),
    };
    Target::new(address, prefix_len, parameters.require("interface")?)
}

impl<K: AddressControl + ?Sized> Resource for AddressResource<'_, K> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Address
    }

    fn list(&self) -> Result<Listing, NetError> {
        self.addresses().map(Listing::Addresses)
    }

    fn add(&self, parameters: &Parameters) -> Result<Outcome, NetError> {
        self.add_assignment(&from_parameters(parameters)?.assignment(None))
    }

    fn delete(&self, parameters: &Parameters) -> Result<Outcome, NetError> {
        self.delete_target(&from_parameters(parameters)?)
    }
}
