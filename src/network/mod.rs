//! Network layer: decoding kernel structures and the kernel seams.
//!
//! This module provides types and traits for:
//! - Decoding socket-address records ([`decode`], [`DecodedAddress`])
//! - Grouping interface addresses ([`InterfaceAddressSet`], [`enumerate`])
//! - Decoding routing-socket dumps ([`RouteMessage`], [`routing`])
//! - Kernel primitives ([`AddressControl`], [`RouteControl`], [`TunnelControl`])
//! - Platform-specific implementations ([`platform`])

mod error;
mod family;
pub mod filter;
mod interfaces;
mod kernel;
pub mod platform;
pub mod routing;

#[cfg(test)]
mod filter_tests;

pub use error::NetError;
pub use family::{
    AddressFamily, DecodedAddress, HAS_SA_LEN, IpVersion, SOCKADDR_IN_LEN, SOCKADDR_IN6_LEN,
    SOCKADDR_LEN, decode, encode, mask_prefix_len, netmask, prefix_len_of_mask, write_header,
};
pub use interfaces::{
    InterfaceAddressSet, InterfaceAddresses, InterfaceRecord, enumerate, find_assignment, group,
};
pub use kernel::{
    AddressAssignment, AddressControl, RouteControl, RouteSpec, TunnelControl, TunnelInfo,
    TunnelKind, TunnelSpec,
};
pub use routing::RouteMessage;
