//! Address families and the socket-address codec.
//!
//! The kernel hands out socket-address records as raw bytes: a small
//! header carrying the family tag followed by a family-specific payload.
//! [`decode`] turns such a record into a [`DecodedAddress`]; [`encode`]
//! builds one for requests written back to the kernel.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

/// True on platforms whose `sockaddr` starts with a one-byte `sa_len`
/// followed by a one-byte family; elsewhere the family is a native `u16`.
pub const HAS_SA_LEN: bool = cfg!(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly",
));

/// Size of the generic `struct sockaddr`.
pub const SOCKADDR_LEN: usize = 16;

/// Size of `struct sockaddr_in`.
pub const SOCKADDR_IN_LEN: usize = 16;

/// Size of `struct sockaddr_in6`.
pub const SOCKADDR_IN6_LEN: usize = 28;

const IN_ADDR_OFFSET: usize = 4;
const IN6_ADDR_OFFSET: usize = 8;
const IN6_SCOPE_OFFSET: usize = 24;

/// Address family of a socket-address record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// `AF_INET`.
    Ipv4,
    /// `AF_INET6`.
    Ipv6,
    /// Any other family (link-layer, unix, ...).
    Unsupported,
}

impl AddressFamily {
    /// Maps a raw `AF_*` tag to a family.
    #[must_use]
    pub fn from_raw(tag: i32) -> Self {
        match tag {
            libc::AF_INET => Self::Ipv4,
            libc::AF_INET6 => Self::Ipv6,
            _ => Self::Unsupported,
        }
    }

    /// Returns the raw `AF_*` tag, or `None` for unsupported families.
    #[must_use]
    pub const fn to_raw(self) -> Option<i32> {
        match self {
            Self::Ipv4 => Some(libc::AF_INET),
            Self::Ipv6 => Some(libc::AF_INET6),
            Self::Unsupported => None,
        }
    }

    /// Returns the family of an IP address.
    #[must_use]
    pub const fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::Ipv4,
            IpAddr::V6(_) => Self::Ipv6,
        }
    }

    /// Number of bits in a host address of this family.
    #[must_use]
    pub const fn max_prefix_len(self) -> u8 {
        match self {
            Self::Ipv4 => 32,
            Self::Ipv6 => 128,
            Self::Unsupported => 0,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => write!(f, "IPv4"),
            Self::Ipv6 => write!(f, "IPv6"),
            Self::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// Which address families a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IpVersion {
    /// IPv4 only.
    V4,
    /// IPv6 only.
    V6,
    /// Both IPv4 and IPv6.
    #[default]
    Both,
}

impl IpVersion {
    /// Returns true if this version includes IPv4.
    #[must_use]
    pub const fn includes_v4(self) -> bool {
        matches!(self, Self::V4 | Self::Both)
    }

    /// Returns true if this version includes IPv6.
    #[must_use]
    pub const fn includes_v6(self) -> bool {
        matches!(self, Self::V6 | Self::Both)
    }

    /// Returns true if addresses of `family` belong to this selection.
    ///
    /// Unsupported families are always included; hiding them is a
    /// presentation decision.
    #[must_use]
    pub const fn includes(self, family: AddressFamily) -> bool {
        match family {
            AddressFamily::Ipv4 => self.includes_v4(),
            AddressFamily::Ipv6 => self.includes_v6(),
            AddressFamily::Unsupported => true,
        }
    }

    /// The supported families in dump order (IPv4 before IPv6).
    #[must_use]
    pub fn families(self) -> Vec<AddressFamily> {
        let mut families = Vec::with_capacity(2);
        if self.includes_v4() {
            families.push(AddressFamily::Ipv4);
        }
        if self.includes_v6() {
            families.push(AddressFamily::Ipv6);
        }
        families
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "IPv4"),
            Self::V6 => write!(f, "IPv6"),
            Self::Both => write!(f, "Both"),
        }
    }
}

/// A socket-address record rendered as text.
///
/// `text` is non-empty exactly when `family` is not
/// [`AddressFamily::Unsupported`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecodedAddress {
    /// Numeric text form (dotted quad, or colon-hex with optional `%scope`).
    #[serde(rename = "address")]
    pub text: String,
    /// Family the record was tagged with.
    pub family: AddressFamily,
}

impl DecodedAddress {
    /// The placeholder for records of an unsupported family.
    #[must_use]
    pub const fn unsupported() -> Self {
        Self {
            text: String::new(),
            family: AddressFamily::Unsupported,
        }
    }

    /// Renders an IPv6 address with its scope id (omitted when zero).
    #[must_use]
    pub fn scoped_v6(addr: Ipv6Addr, scope_id: u32) -> Self {
        let text = if scope_id == 0 {
            addr.to_string()
        } else {
            format!("{addr}%{scope_id}")
        };
        Self {
            text,
            family: AddressFamily::Ipv6,
        }
    }

    /// Returns true unless the record was of an unsupported family.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        !matches!(self.family, AddressFamily::Unsupported)
    }

    /// Parses the address back, dropping any `%scope` suffix.
    #[must_use]
    pub fn ip(&self) -> Option<IpAddr> {
        let bare = self.text.split('%').next().unwrap_or_default();
        bare.parse().ok()
    }
}

impl From<IpAddr> for DecodedAddress {
    fn from(addr: IpAddr) -> Self {
        Self {
            text: addr.to_string(),
            family: AddressFamily::of(&addr),
        }
    }
}

impl fmt::Display for DecodedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Builds the netmask for `prefix_len` bits of `family`.
///
/// Returns `None` for unsupported families and over-long prefixes.
#[must_use]
pub fn netmask(family: AddressFamily, prefix_len: u8) -> Option<IpAddr> {
    if prefix_len > family.max_prefix_len() {
        return None;
    }
    match family {
        AddressFamily::Ipv4 => {
            let bits = u32::MAX.checked_shl(32 - u32::from(prefix_len)).unwrap_or(0);
            Some(IpAddr::V4(Ipv4Addr::from(bits)))
        }
        AddressFamily::Ipv6 => {
            let bits = u128::MAX.checked_shl(128 - u32::from(prefix_len)).unwrap_or(0);
            Some(IpAddr::V6(Ipv6Addr::from(bits)))
        }
        AddressFamily::Unsupported => None,
    }
}

/// Converts a contiguous netmask back to its prefix length.
///
/// Returns `None` when the mask has holes (e.g. `255.0.255.0`).
#[must_use]
pub fn prefix_len_of_mask(mask: IpAddr) -> Option<u8> {
    let (ones, zeros) = match mask {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            (bits.leading_ones(), bits.trailing_zeros())
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            (bits.leading_ones(), bits.trailing_zeros())
        }
    };
    let width = u32::from(AddressFamily::of(&mask).max_prefix_len());
    if ones + zeros.min(width - ones) != width {
        return None;
    }
    u8::try_from(ones).ok()
}

/// Reads the prefix length out of a netmask record of `family`.
///
/// The family tag of the mask itself is ignored, and bytes missing from a
/// shortened mask count as zero.
#[must_use]
pub fn mask_prefix_len(family: AddressFamily, record: &[u8]) -> Option<u8> {
    let (offset, width) = match family {
        AddressFamily::Ipv4 => (IN_ADDR_OFFSET, 4),
        AddressFamily::Ipv6 => (IN6_ADDR_OFFSET, 16),
        AddressFamily::Unsupported => return None,
    };
    let mut octets = [0u8; 16];
    let present = record.get(offset..).unwrap_or_default();
    let take = present.len().min(width);
    octets[..take].copy_from_slice(&present[..take]);

    let mask = match family {
        AddressFamily::Ipv4 => IpAddr::from([octets[0], octets[1], octets[2], octets[3]]),
        _ => IpAddr::from(octets),
    };
    prefix_len_of_mask(mask)
}

/// Decodes a raw socket-address record.
///
/// Never fails: records of any family other than IPv4/IPv6, and records
/// too short for their family's payload, decode to
/// [`DecodedAddress::unsupported`].
#[must_use]
pub fn decode(record: &[u8]) -> DecodedAddress {
    let Some(tag) = family_tag(record) else {
        return DecodedAddress::unsupported();
    };

    match AddressFamily::from_raw(tag) {
        AddressFamily::Ipv4 => decode_v4(record),
        AddressFamily::Ipv6 => decode_v6(record),
        AddressFamily::Unsupported => DecodedAddress::unsupported(),
    }
}

/// Builds a socket-address record for `addr` in the platform layout.
#[must_use]
pub fn encode(addr: IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => {
            let mut record = vec![0u8; SOCKADDR_IN_LEN];
            write_header(&mut record, libc::AF_INET);
            record[IN_ADDR_OFFSET..IN_ADDR_OFFSET + 4].copy_from_slice(&v4.octets());
            record
        }
        IpAddr::V6(v6) => {
            let mut record = vec![0u8; SOCKADDR_IN6_LEN];
            write_header(&mut record, libc::AF_INET6);
            record[IN6_ADDR_OFFSET..IN6_ADDR_OFFSET + 16].copy_from_slice(&v6.octets());
            record
        }
    }
}

/// Writes the length/family header of a record in place.
///
/// # Panics
///
/// Panics if `record` is shorter than two bytes.
pub fn write_header(record: &mut [u8], family: i32) {
    if HAS_SA_LEN {
        record[0] = u8::try_from(record.len()).unwrap_or(u8::MAX);
        record[1] = u8::try_from(family).unwrap_or_default();
    } else {
        let tag = u16::try_from(family).unwrap_or_default();
        record[..2].copy_from_slice(&tag.to_ne_bytes());
    }
}

fn family_tag(record: &[u8]) -> Option<i32> {
    if HAS_SA_LEN {
        record.get(1).map(|&tag| i32::from(tag))
    } else {
        let bytes = record.get(..2)?;
        Some(i32::from(u16::from_ne_bytes([bytes[0], bytes[1]])))
    }
}

fn decode_v4(record: &[u8]) -> DecodedAddress {
    let Some(bytes) = record.get(IN_ADDR_OFFSET..IN_ADDR_OFFSET + 4) else {
        return DecodedAddress::unsupported();
    };
    let addr = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
    DecodedAddress::from(IpAddr::V4(addr))
}

fn decode_v6(record: &[u8]) -> DecodedAddress {
    let Some(bytes) = record.get(IN6_ADDR_OFFSET..IN6_ADDR_OFFSET + 16) else {
        return DecodedAddress::unsupported();
    };
    let mut octets = [0u8; 16];
    octets.copy_from_slice(bytes);

    let mut scope_id = record
        .get(IN6_SCOPE_OFFSET..IN6_SCOPE_OFFSET + 4)
        .map_or(0, |b| u32::from_ne_bytes([b[0], b[1], b[2], b[3]]));

    // KAME stacks embed the link-local scope in bytes 2..4 of the address.
    if HAS_SA_LEN && is_unicast_link_local(&octets) {
        let embedded = u16::from_be_bytes([octets[2], octets[3]]);
        if embedded != 0 {
            if scope_id == 0 {
                scope_id = u32::from(embedded);
            }
            octets[2] = 0;
            octets[3] = 0;
        }
    }

    DecodedAddress::scoped_v6(Ipv6Addr::from(octets), scope_id)
}

const fn is_unicast_link_local(octets: &[u8; 16]) -> bool {
    octets[0] == 0xfe && (octets[1] & 0xc0) == 0x80
}
