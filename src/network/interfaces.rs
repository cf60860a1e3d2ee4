//! Interface address enumeration and grouping.

use std::collections::HashMap;
use std::net::IpAddr;

use serde::{Serialize, Serializer};
use tracing::debug;

use super::{AddressControl, AddressFamily, DecodedAddress, NetError, decode, mask_prefix_len};

/// One node of the kernel's interface-address list, copied out of the
/// kernel-owned buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceRecord {
    /// Interface name (e.g. `en0`).
    pub name: String,
    /// Raw socket-address bytes, `None` when the node carries no address.
    pub address: Option<Vec<u8>>,
    /// Raw netmask bytes, when the kernel reported one.
    pub netmask: Option<Vec<u8>>,
}

impl InterfaceRecord {
    /// Creates a record without a netmask.
    #[must_use]
    pub fn new(name: impl Into<String>, address: Option<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            address,
            netmask: None,
        }
    }

    /// Attaches the netmask reported alongside the address.
    #[must_use]
    pub fn with_netmask(mut self, netmask: Option<Vec<u8>>) -> Self {
        self.netmask = netmask;
        self
    }

    /// The address, when it decodes to IPv4 or IPv6.
    #[must_use]
    pub fn ip(&self) -> Option<IpAddr> {
        self.address.as_deref().map(decode).and_then(|a| a.ip())
    }

    /// Prefix length of the assignment, read from the netmask.
    #[must_use]
    pub fn prefix_len(&self) -> Option<u8> {
        let family = AddressFamily::of(&self.ip()?);
        mask_prefix_len(family, self.netmask.as_deref()?)
    }
}

/// Finds the record assigning `addr` to interface `name`.
#[must_use]
pub fn find_assignment<'a>(
    records: &'a [InterfaceRecord],
    name: &str,
    addr: IpAddr,
) -> Option<&'a InterfaceRecord> {
    records.iter().find(|r| r.name == name && r.ip() == Some(addr))
}

/// The decoded addresses of a single interface, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceAddresses {
    /// Interface name.
    pub name: String,
    /// Addresses in the order the kernel listed them.
    pub addresses: Vec<DecodedAddress>,
}

impl InterfaceAddresses {
    /// Returns the addresses of a supported family.
    pub fn supported(&self) -> impl Iterator<Item = &DecodedAddress> {
        self.addresses.iter().filter(|a| a.is_supported())
    }

    /// Returns true if `addr` is assigned to this interface.
    #[must_use]
    pub fn has_address(&self, addr: IpAddr) -> bool {
        self.addresses.iter().any(|a| a.ip() == Some(addr))
    }
}

/// Ordered mapping from interface name to its decoded addresses.
///
/// Interfaces keep enumeration order; addresses keep discovery order.
/// Unsupported-family entries are retained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceAddressSet {
    interfaces: Vec<InterfaceAddresses>,
    index: HashMap<String, usize>,
}

impl InterfaceAddressSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `address` to `name`'s list, creating the list on first sight.
    pub fn insert(&mut self, name: &str, address: DecodedAddress) {
        if let Some(&slot) = self.index.get(name) {
            self.interfaces[slot].addresses.push(address);
            return;
        }

        self.index.insert(name.to_string(), self.interfaces.len());
        self.interfaces.push(InterfaceAddresses {
            name: name.to_string(),
            addresses: vec![address],
        });
    }

    /// Returns the addresses recorded for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&[DecodedAddress]> {
        self.index
            .get(name)
            .map(|&slot| self.interfaces[slot].addresses.as_slice())
    }

    /// Returns true if `name` was seen during enumeration.
    #[must_use]
    pub fn contains_interface(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Returns true if `addr` is assigned to interface `name`.
    #[must_use]
    pub fn has_address(&self, name: &str, addr: IpAddr) -> bool {
        self.index
            .get(name)
            .is_some_and(|&slot| self.interfaces[slot].has_address(addr))
    }

    /// Interface names in enumeration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.interfaces.iter().map(|i| i.name.as_str())
    }

    /// Iterates interfaces in enumeration order.
    pub fn iter(&self) -> std::slice::Iter<'_, InterfaceAddresses> {
        self.interfaces.iter()
    }

    /// Number of distinct interfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    /// Returns true if no interface was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Keeps only the interfaces for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&InterfaceAddresses) -> bool) {
        self.interfaces.retain(|i| keep(i));
        self.reindex();
    }

    /// Drops addresses for which `keep` returns false, leaving the
    /// interface itself in place.
    pub fn retain_addresses(&mut self, mut keep: impl FnMut(&DecodedAddress) -> bool) {
        for interface in &mut self.interfaces {
            interface.addresses.retain(|a| keep(a));
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .interfaces
            .iter()
            .enumerate()
            .map(|(slot, i)| (i.name.clone(), slot))
            .collect();
    }
}

impl<'a> IntoIterator for &'a InterfaceAddressSet {
    type Item = &'a InterfaceAddresses;
    type IntoIter = std::slice::Iter<'a, InterfaceAddresses>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for InterfaceAddressSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.interfaces)
    }
}

/// Groups raw interface records by name, decoding each address.
///
/// Nodes without an address are recorded as unsupported entries so every
/// interface the kernel listed appears in the result.
#[must_use]
pub fn group(records: impl IntoIterator<Item = InterfaceRecord>) -> InterfaceAddressSet {
    let mut set = InterfaceAddressSet::new();
    for record in records {
        let decoded = record
            .address
            .as_deref()
            .map_or_else(DecodedAddress::unsupported, decode);
        set.insert(&record.name, decoded);
    }
    set
}

/// Enumerates every interface address known to the kernel.
///
/// # Errors
///
/// Returns [`NetError::ResourceUnavailable`] when the kernel list cannot be
/// retrieved, whatever the OS reason. There is no retry.
pub fn enumerate<K: AddressControl + ?Sized>(kernel: &K) -> Result<InterfaceAddressSet, NetError> {
    let records = kernel.interface_records()?;
    debug!(records = records.len(), "Enumerated interface address records");
    Ok(group(records))
}
