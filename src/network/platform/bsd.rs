//! BSD-family backend: getifaddrs, routing sockets, and interface ioctls.

use std::io;
use std::mem;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::os::fd::AsRawFd;
use std::ptr;
use std::sync::atomic::{AtomicI32, Ordering};

use tracing::debug;

use super::unix;
use crate::network::routing::{RoutingLayout, parse_dump};
use crate::network::{
    AddressAssignment, AddressControl, AddressFamily, InterfaceRecord, NetError, RouteControl,
    RouteMessage, RouteSpec, TunnelControl, TunnelInfo, TunnelKind, TunnelSpec, encode,
};

const IOCPARM_MASK: libc::c_ulong = 0x1fff;
const IOC_IN: libc::c_ulong = 0x8000_0000;
const IOC_INOUT: libc::c_ulong = 0xc000_0000;

const fn ioc(direction: libc::c_ulong, group: u8, num: u8, len: usize) -> libc::c_ulong {
    direction | ((len as libc::c_ulong & IOCPARM_MASK) << 16) | ((group as libc::c_ulong) << 8) | num as libc::c_ulong
}

/// Infinite address lifetime for `in6_addrlifetime`.
const ND6_INFINITE_LIFETIME: u32 = u32::MAX;

/// Length of the link-layer gateway record written for interface routes.
const SOCKADDR_DL_LEN: usize = 20;

/// `struct ifaliasreq`.
#[repr(C)]
struct InAliasReq {
    name: [libc::c_char; unix::IFNAMSIZ],
    addr: libc::sockaddr_in,
    broadaddr: libc::sockaddr_in,
    mask: libc::sockaddr_in,
    #[cfg(target_os = "freebsd")]
    vhid: libc::c_int,
}

/// `struct ifreq` carrying an IPv4 address.
#[repr(C)]
struct InIfReq {
    name: [libc::c_char; unix::IFNAMSIZ],
    addr: libc::sockaddr_in,
}

/// `struct in6_addrlifetime`.
#[repr(C)]
struct In6AddrLifetime {
    expire: libc::time_t,
    preferred: libc::time_t,
    vltime: u32,
    pltime: u32,
}

/// `struct in6_aliasreq`.
#[repr(C)]
struct In6AliasReq {
    name: [libc::c_char; unix::IFNAMSIZ],
    addr: libc::sockaddr_in6,
    dstaddr: libc::sockaddr_in6,
    prefixmask: libc::sockaddr_in6,
    flags: libc::c_int,
    lifetime: In6AddrLifetime,
    #[cfg(target_os = "freebsd")]
    vhid: libc::c_int,
}

/// `struct in6_ifreq`; the union is sized by its largest member, the
/// 34-counter `icmp6_ifstat`.
#[repr(C)]
struct In6IfReq {
    name: [libc::c_char; unix::IFNAMSIZ],
    addr: libc::sockaddr_in6,
    _rest: [u8; 34 * 8 - mem::size_of::<libc::sockaddr_in6>()],
}

/// `struct ifreq` with only the name set.
#[repr(C)]
struct IfReqName {
    name: [libc::c_char; unix::IFNAMSIZ],
    _union: [u8; 16],
}

const SIOCDIFADDR: libc::c_ulong = ioc(IOC_IN, b'i', 25, mem::size_of::<InIfReq>());
const SIOCAIFADDR: libc::c_ulong = ioc(IOC_IN, b'i', 26, mem::size_of::<InAliasReq>());
const SIOCDIFADDR_IN6: libc::c_ulong = ioc(IOC_IN, b'i', 25, mem::size_of::<In6IfReq>());
const SIOCAIFADDR_IN6: libc::c_ulong = ioc(IOC_IN, b'i', 26, mem::size_of::<In6AliasReq>());
const SIOCIFDESTROY: libc::c_ulong = ioc(IOC_IN, b'i', 121, mem::size_of::<IfReqName>());

#[cfg(any(target_os = "macos", target_os = "ios"))]
const SIOCIFCREATE: libc::c_ulong = ioc(IOC_INOUT, b'i', 120, mem::size_of::<IfReqName>());
#[cfg(any(target_os = "freebsd", target_os = "dragonfly"))]
const SIOCIFCREATE: libc::c_ulong = ioc(IOC_INOUT, b'i', 122, mem::size_of::<IfReqName>());
#[cfg(any(target_os = "openbsd", target_os = "netbsd"))]
const SIOCIFCREATE: libc::c_ulong = ioc(IOC_IN, b'i', 122, mem::size_of::<IfReqName>());

/// Kinds the interface cloners accept.
#[cfg(any(target_os = "macos", target_os = "ios"))]
const CLONABLE: &[TunnelKind] = &[TunnelKind::Gif];
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
const CLONABLE: &[TunnelKind] = &[TunnelKind::Tun, TunnelKind::Tap, TunnelKind::Gif, TunnelKind::Gre];

/// Routing-socket records are padded to this boundary.
#[cfg(any(target_os = "macos", target_os = "ios"))]
const SA_ALIGN: usize = 4;
#[cfg(not(any(target_os = "macos", target_os = "ios")))]
const SA_ALIGN: usize = mem::size_of::<libc::c_long>();

/// Kernel access on the BSD family.
#[derive(Debug, Default)]
pub struct PlatformKernel {
    seq: AtomicI32,
}

impl PlatformKernel {
    /// Creates the platform kernel handle.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seq: AtomicI32::new(0),
        }
    }
}

fn sockaddr_in(addr: Ipv4Addr) -> libc::sockaddr_in {
    // SAFETY: sockaddr_in is plain old data; all-zero is valid.
    let mut sa: libc::sockaddr_in = unsafe { mem::zeroed() };
    sa.sin_len = mem::size_of::<libc::sockaddr_in>() as u8;
    sa.sin_family = libc::AF_INET as libc::sa_family_t;
    sa.sin_addr.s_addr = u32::from_ne_bytes(addr.octets());
    sa
}

fn sockaddr_in6(addr: Ipv6Addr) -> libc::sockaddr_in6 {
    // SAFETY: sockaddr_in6 is plain old data; all-zero is valid.
    let mut sa: libc::sockaddr_in6 = unsafe { mem::zeroed() };
    sa.sin6_len = mem::size_of::<libc::sockaddr_in6>() as u8;
    sa.sin6_family = libc::AF_INET6 as libc::sa_family_t;
    sa.sin6_addr.s6_addr = addr.octets();
    sa
}

fn ioctl<T>(fd: &impl AsRawFd, request: libc::c_ulong, arg: &mut T) -> io::Result<()> {
    // SAFETY: `arg` is the structure `request` encodes the size of.
    unix::check(unsafe { libc::ioctl(fd.as_raw_fd(), request, ptr::from_mut(arg)) })
}

fn v4_alias(assignment: &AddressAssignment, addr: Ipv4Addr) -> io::Result<()> {
    let IpAddr::V4(mask) = assignment.netmask() else {
        return Err(io::Error::from_raw_os_error(libc::EINVAL));
    };
    let socket = unix::socket(libc::AF_INET, libc::SOCK_DGRAM, 0)?;
    let mut request = InAliasReq {
        name: unix::ifr_name(&assignment.interface)?,
        addr: sockaddr_in(addr),
        // SAFETY: all-zero sockaddr_in means "no broadcast address".
        broadaddr: unsafe { mem::zeroed() },
        mask: sockaddr_in(mask),
        #[cfg(target_os = "freebsd")]
        vhid: 0,
    };
    ioctl(&socket, SIOCAIFADDR, &mut request)
}

fn v6_alias(assignment: &AddressAssignment, addr: Ipv6Addr) -> io::Result<()> {
    let IpAddr::V6(mask) = assignment.netmask() else {
        return Err(io::Error::from_raw_os_error(libc::EINVAL));
    };
    let socket = unix::socket(libc::AF_INET6, libc::SOCK_DGRAM, 0)?;
    let mut request = In6AliasReq {
        name: unix::ifr_name(&assignment.interface)?,
        addr: sockaddr_in6(addr),
        // SAFETY: all-zero sockaddr_in6 means "no destination address".
        dstaddr: unsafe { mem::zeroed() },
        prefixmask: sockaddr_in6(mask),
        flags: 0,
        lifetime: In6AddrLifetime {
            expire: 0,
            preferred: 0,
            vltime: ND6_INFINITE_LIFETIME,
            pltime: ND6_INFINITE_LIFETIME,
        },
        #[cfg(target_os = "freebsd")]
        vhid: 0,
    };
    ioctl(&socket, SIOCAIFADDR_IN6, &mut request)
}

impl AddressControl for PlatformKernel {
    fn interface_records(&self) -> Result<Vec<InterfaceRecord>, NetError> {
        unix::interface_records()
    }

    fn add_address(&self, assignment: &AddressAssignment) -> io::Result<()> {
        unix::interface_index(&assignment.interface)?;
        match assignment.address {
            IpAddr::V4(addr) => v4_alias(assignment, addr),
            IpAddr::V6(addr) => v6_alias(assignment, addr),
        }
    }

    fn remove_address(&self, assignment: &AddressAssignment) -> io::Result<()> {
        unix::interface_index(&assignment.interface)?;
        let name = unix::ifr_name(&assignment.interface)?;
        match assignment.address {
            IpAddr::V4(addr) => {
                let socket = unix::socket(libc::AF_INET, libc::SOCK_DGRAM, 0)?;
                let mut request = InIfReq {
                    name,
                    addr: sockaddr_in(addr),
                };
                ioctl(&socket, SIOCDIFADDR, &mut request)
            }
            IpAddr::V6(addr) => {
                let socket = unix::socket(libc::AF_INET6, libc::SOCK_DGRAM, 0)?;
                let mut request = In6IfReq {
                    name,
                    addr: sockaddr_in6(addr),
                    _rest: [0; 34 * 8 - mem::size_of::<libc::sockaddr_in6>()],
                };
                ioctl(&socket, SIOCDIFADDR_IN6, &mut request)
            }
        }
    }
}

// ============================================================================
// Routes
// ============================================================================

/// Two-phase `NET_RT_DUMP` sysctl: size query, then fill.
fn route_dump(family: libc::c_int) -> Result<Vec<u8>, NetError> {
    let mut mib = [libc::CTL_NET, libc::PF_ROUTE, 0, family, libc::NET_RT_DUMP, 0];
    let mut needed: libc::size_t = 0;

    // SAFETY: size query with a null output buffer.
    let ret = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            ptr::null_mut(),
            &raw mut needed,
            ptr::null_mut(),
            0,
        )
    };
    if ret < 0 {
        return Err(NetError::last_os_error("route table size query"));
    }

    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(needed)
        .map_err(|_| NetError::OutOfMemory {
            requested: Some(needed),
        })?;
    buffer.resize(needed, 0);

    // SAFETY: `buffer` holds `needed` writable bytes.
    let ret = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            buffer.as_mut_ptr().cast(),
            &raw mut needed,
            ptr::null_mut(),
            0,
        )
    };
    if ret < 0 {
        return Err(NetError::last_os_error("route table dump"));
    }
    buffer.truncate(needed);
    Ok(buffer)
}

fn push_record(body: &mut Vec<u8>, record: &[u8]) {
    body.extend_from_slice(record);
    let padded = record.len().div_ceil(SA_ALIGN) * SA_ALIGN;
    body.resize(body.len() + padded - record.len(), 0);
}

fn link_record(index: u32) -> Vec<u8> {
    let mut record = vec![0u8; SOCKADDR_DL_LEN];
    record[0] = SOCKADDR_DL_LEN as u8;
    record[1] = libc::AF_LINK as u8;
    record[2..4].copy_from_slice(&u16::try_from(index).unwrap_or(0).to_ne_bytes());
    record
}

/// Builds an `RTM_ADD`/`RTM_DELETE` routing-socket message.
fn route_message(kind: libc::c_int, route: &RouteSpec, seq: i32) -> io::Result<Vec<u8>> {
    let mut flags = libc::RTF_UP | libc::RTF_STATIC;
    let mut addrs = libc::RTA_DST;
    let mut body = Vec::new();

    push_record(&mut body, &encode(route.destination));
    if let Some(gateway) = route.gateway {
        flags |= libc::RTF_GATEWAY;
        addrs |= libc::RTA_GATEWAY;
        push_record(&mut body, &encode(gateway));
    } else if let Some(ref interface) = route.interface {
        addrs |= libc::RTA_GATEWAY;
        push_record(&mut body, &link_record(unix::interface_index(interface)?));
    }
    if route.is_host() {
        flags |= libc::RTF_HOST;
    } else {
        addrs |= libc::RTA_NETMASK;
        push_record(&mut body, &encode(route.netmask()));
    }

    let header_len = mem::size_of::<libc::rt_msghdr>();
    let total = u16::try_from(header_len + body.len())
        .map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))?;

    // SAFETY: rt_msghdr is plain old data; all-zero is valid.
    let mut header: libc::rt_msghdr = unsafe { mem::zeroed() };
    header.rtm_msglen = total;
    header.rtm_version = libc::RTM_VERSION as u8;
    header.rtm_type = kind as u8;
    header.rtm_flags = flags;
    header.rtm_addrs = addrs;
    // SAFETY: getpid has no preconditions.
    header.rtm_pid = unsafe { libc::getpid() };
    header.rtm_seq = seq;

    // SAFETY: reading the bytes of an initialized plain-old-data struct.
    let header_bytes =
        unsafe { std::slice::from_raw_parts((&raw const header).cast::<u8>(), header_len) };
    let mut message = header_bytes.to_vec();
    message.extend_from_slice(&body);
    Ok(message)
}

impl PlatformKernel {
    fn write_route(&self, kind: libc::c_int, route: &RouteSpec) -> io::Result<()> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let message = route_message(kind, route, seq)?;
        let socket = unix::socket(libc::PF_ROUTE, libc::SOCK_RAW, 0)?;
        // SAFETY: `message` is a complete routing-socket message.
        let written = unsafe { libc::write(socket.as_raw_fd(), message.as_ptr().cast(), message.len()) };
        if written < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl RouteControl for PlatformKernel {
    fn dump_routes(&self, family: AddressFamily) -> Result<Vec<RouteMessage>, NetError> {
        let raw = family
            .to_raw()
            .ok_or_else(|| NetError::invalid("family", "only IPv4 and IPv6 can be dumped"))?;
        let buffer = route_dump(raw)?;
        debug!("Route dump returned {} bytes", buffer.len());
        Ok(parse_dump(&buffer, family, RoutingLayout::native()))
    }

    fn add_route(&self, route: &RouteSpec) -> io::Result<()> {
        self.write_route(libc::RTM_ADD, route)
    }

    fn delete_route(&self, route: &RouteSpec) -> io::Result<()> {
        self.write_route(libc::RTM_DELETE, route)
    }
}

// ============================================================================
// Tunnels
// ============================================================================

/// Classifies an interface by its cloner prefix.
fn kind_of(name: &str) -> Option<TunnelKind> {
    match name.trim_end_matches(|c: char| c.is_ascii_digit()) {
        "tun" | "utun" => Some(TunnelKind::Tun),
        "tap" => Some(TunnelKind::Tap),
        "gif" => Some(TunnelKind::Gif),
        "gre" => Some(TunnelKind::Gre),
        _ => None,
    }
}

fn name_request(name: &str) -> io::Result<IfReqName> {
    Ok(IfReqName {
        name: unix::ifr_name(name)?,
        _union: [0; 16],
    })
}

impl TunnelControl for PlatformKernel {
    fn tunnels(&self) -> Result<Vec<TunnelInfo>, NetError> {
        let mut tunnels: Vec<TunnelInfo> = Vec::new();
        for record in unix::interface_records()? {
            if tunnels.iter().any(|t| t.name == record.name) {
                continue;
            }
            if let Some(kind) = kind_of(&record.name) {
                tunnels.push(TunnelInfo::new(record.name, kind));
            }
        }
        Ok(tunnels)
    }

    fn supported_kinds(&self) -> &'static [TunnelKind] {
        CLONABLE
    }

    fn name_selects_kind(&self) -> bool {
        true
    }

    fn create_tunnel(&self, tunnel: &TunnelSpec) -> io::Result<()> {
        let socket = unix::socket(libc::AF_INET, libc::SOCK_DGRAM, 0)?;
        let mut request = name_request(&tunnel.name)?;
        ioctl(&socket, SIOCIFCREATE, &mut request)
    }

    fn destroy_tunnel(&self, tunnel: &TunnelSpec) -> io::Result<()> {
        let socket = unix::socket(libc::AF_INET, libc::SOCK_DGRAM, 0)?;
        let mut request = name_request(&tunnel.name)?;
        ioctl(&socket, SIOCIFDESTROY, &mut request)
    }
}
