//! Platform-specific kernel implementations.
//!
//! This module provides conditional compilation for platform-specific
//! implementations of the kernel traits ([`AddressControl`],
//! [`RouteControl`], [`TunnelControl`]), re-exported as
//! [`PlatformKernel`].
//!
//! # Platform Support
//!
//! - **BSD family** (macOS, FreeBSD, OpenBSD, NetBSD, DragonFly):
//!   `getifaddrs`, `NET_RT_DUMP` sysctl, `PF_ROUTE` writes, interface ioctls.
//! - **Linux**: `getifaddrs`, rtnetlink via `netlink-sys`, `/dev/net/tun`.
//!
//! [`AddressControl`]: super::AddressControl
//! [`RouteControl`]: super::RouteControl
//! [`TunnelControl`]: super::TunnelControl

#[cfg(unix)]
mod unix;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
mod netlink;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly",
))]
mod bsd;

#[cfg(target_os = "linux")]
pub use linux::PlatformKernel;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly",
))]
pub use bsd::PlatformKernel;
