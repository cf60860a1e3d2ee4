//! Linux backend: getifaddrs, rtnetlink, and `/dev/net/tun`.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;

use tracing::debug;

use super::netlink::{
    IFA_ADDRESS, IFA_LOCAL, IfAddrMsg, NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_EXCL,
    NLM_F_REQUEST, RT_SCOPE_LINK, RT_SCOPE_NOWHERE, RT_SCOPE_UNIVERSE, RT_TABLE_MAIN, RTA_DST,
    RTA_GATEWAY, RTA_OIF, RTM_DELADDR, RTM_DELROUTE, RTM_GETROUTE, RTM_NEWADDR, RTM_NEWROUTE,
    RTN_UNICAST, RTPROT_BOOT, Request, RouteSocket, RtMsg, decode_route,
};
use super::unix;
use crate::network::{
    AddressAssignment, AddressControl, AddressFamily, InterfaceRecord, NetError, RouteControl,
    RouteMessage, RouteSpec, TunnelControl, TunnelInfo, TunnelKind, TunnelSpec,
};

const TUN_DEVICE: &str = "/dev/net/tun";
const SYS_CLASS_NET: &str = "/sys/class/net";

const TUNSETIFF: libc::Ioctl = 0x4004_54ca;
const TUNSETPERSIST: libc::Ioctl = 0x4004_54cb;
const IFF_TUN: libc::c_short = 0x0001;
const IFF_TAP: libc::c_short = 0x0002;
const IFF_NO_PI: libc::c_short = 0x1000;

/// `struct ifreq` restricted to the name and flags members.
#[repr(C)]
struct IfReqFlags {
    name: [libc::c_char; unix::IFNAMSIZ],
    flags: libc::c_short,
    _pad: [u8; 22],
}

/// Kernel access on Linux.
#[derive(Debug, Default)]
pub struct PlatformKernel {
    _private: (),
}

impl PlatformKernel {
    /// Creates the platform kernel handle.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

fn raw_family(family: AddressFamily) -> io::Result<u8> {
    family
        .to_raw()
        .and_then(|raw| u8::try_from(raw).ok())
        .ok_or_else(|| io::Error::from_raw_os_error(libc::EAFNOSUPPORT))
}

/// Builds an address request for the interface at `index`.
///
/// IPv4 deletions omit `IFA_ADDRESS` so the kernel matches on the local
/// address alone, whatever prefix it was added with. IPv6 deletions match
/// on the prefix too, so `assignment` must carry the assigned one.
fn address_request(
    kind: u16,
    flags: u16,
    index: u32,
    assignment: &AddressAssignment,
) -> io::Result<Request> {
    let body = IfAddrMsg {
        family: raw_family(assignment.family())?,
        prefix_len: assignment.prefix_len,
        index,
        ..IfAddrMsg::default()
    };
    let request = Request::new(kind, flags)
        .body(&body)
        .addr_attr(IFA_LOCAL, assignment.address);
    if kind == RTM_DELADDR && assignment.address.is_ipv4() {
        return Ok(request);
    }
    Ok(request.addr_attr(IFA_ADDRESS, assignment.address))
}

/// An `RTM_NEWROUTE` for a static unicast route.
fn add_route_request(route: &RouteSpec) -> io::Result<Request> {
    let body = RtMsg {
        family: raw_family(route.family())?,
        dst_len: route.prefix_len,
        table: RT_TABLE_MAIN,
        protocol: RTPROT_BOOT,
        scope: if route.gateway.is_some() {
            RT_SCOPE_UNIVERSE
        } else {
            RT_SCOPE_LINK
        },
        kind: RTN_UNICAST,
        ..RtMsg::default()
    };
    let flags = NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL;
    route_attrs(Request::new(RTM_NEWROUTE, flags).body(&body), route)
}

/// An `RTM_DELROUTE` that matches whoever installed the route.
///
/// Protocol and type stay unspecified; a non-zero value would restrict the
/// match to routes carrying that exact value.
fn delete_route_request(route: &RouteSpec) -> io::Result<Request> {
    let body = RtMsg {
        family: raw_family(route.family())?,
        dst_len: route.prefix_len,
        table: RT_TABLE_MAIN,
        scope: RT_SCOPE_NOWHERE,
        ..RtMsg::default()
    };
    route_attrs(Request::new(RTM_DELROUTE, NLM_F_REQUEST | NLM_F_ACK).body(&body), route)
}

fn route_attrs(mut request: Request, route: &RouteSpec) -> io::Result<Request> {
    if route.prefix_len > 0 {
        request = request.addr_attr(RTA_DST, route.destination);
    }
    if let Some(gateway) = route.gateway {
        request = request.addr_attr(RTA_GATEWAY, gateway);
    }
    if let Some(ref interface) = route.interface {
        let index = unix::interface_index(interface)?;
        request = request.attr(RTA_OIF, &index.to_ne_bytes());
    }
    Ok(request)
}

impl AddressControl for PlatformKernel {
    fn interface_records(&self) -> Result<Vec<InterfaceRecord>, NetError> {
        unix::interface_records()
    }

    fn add_address(&self, assignment: &AddressAssignment) -> io::Result<()> {
        let flags = NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL;
        let index = unix::interface_index(&assignment.interface)?;
        let request = address_request(RTM_NEWADDR, flags, index, assignment)?;
        RouteSocket::open()?.execute(request)
    }

    fn remove_address(&self, assignment: &AddressAssignment) -> io::Result<()> {
        let index = unix::interface_index(&assignment.interface)?;
        let request = address_request(RTM_DELADDR, NLM_F_REQUEST | NLM_F_ACK, index, assignment)?;
        RouteSocket::open()?.execute(request)
    }
}

impl RouteControl for PlatformKernel {
    fn dump_routes(&self, family: AddressFamily) -> Result<Vec<RouteMessage>, NetError> {
        let body = RtMsg {
            family: raw_family(family)
                .map_err(|_| NetError::invalid("family", "only IPv4 and IPv6 can be dumped"))?,
            ..RtMsg::default()
        };
        let request = Request::new(RTM_GETROUTE, NLM_F_REQUEST | NLM_F_DUMP).body(&body);

        let socket = RouteSocket::open().map_err(|e| NetError::unavailable("netlink socket", e))?;
        let payloads = socket
            .dump(request, RTM_NEWROUTE)
            .map_err(|e| NetError::unavailable("route dump", e))?;

        debug!("Route dump returned {} messages", payloads.len());
        Ok(payloads.iter().filter_map(|p| decode_route(p)).collect())
    }

    fn add_route(&self, route: &RouteSpec) -> io::Result<()> {
        RouteSocket::open()?.execute(add_route_request(route)?)
    }

    fn delete_route(&self, route: &RouteSpec) -> io::Result<()> {
        RouteSocket::open()?.execute(delete_route_request(route)?)
    }
}

// ============================================================================
// Tunnels
// ============================================================================

fn tun_flags(kind: TunnelKind) -> io::Result<libc::c_short> {
    match kind {
        TunnelKind::Tun => Ok(IFF_TUN | IFF_NO_PI),
        TunnelKind::Tap => Ok(IFF_TAP | IFF_NO_PI),
        TunnelKind::Gif | TunnelKind::Gre => Err(io::Error::from_raw_os_error(libc::EOPNOTSUPP)),
    }
}

/// Attaches to (creating if needed) the tun/tap device and sets persistence.
fn set_persist(tunnel: &TunnelSpec, persist: bool) -> io::Result<()> {
    let flags = tun_flags(tunnel.kind)?;
    let device: File = OpenOptions::new().read(true).write(true).open(TUN_DEVICE)?;
    let mut request = IfReqFlags {
        name: unix::ifr_name(&tunnel.name)?,
        flags,
        _pad: [0; 22],
    };

    // SAFETY: request is a properly sized ifreq for TUNSETIFF.
    unix::check(unsafe { libc::ioctl(device.as_raw_fd(), TUNSETIFF, &raw mut request) })?;
    // SAFETY: TUNSETPERSIST takes an integer argument.
    unix::check(unsafe {
        libc::ioctl(device.as_raw_fd(), TUNSETPERSIST, libc::c_ulong::from(persist))
    })
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_owned())
}

/// Classifies one `/sys/class/net` entry as tun or tap.
fn tunnel_kind(entry: &Path) -> Option<TunnelKind> {
    let flags = read_trimmed(&entry.join("tun_flags"))?;
    let bits = i64::from_str_radix(flags.trim_start_matches("0x"), 16).ok()?;
    if bits & i64::from(IFF_TAP) != 0 {
        Some(TunnelKind::Tap)
    } else {
        Some(TunnelKind::Tun)
    }
}

/// Lists tun/tap interfaces under a sysfs-style directory.
///
/// Kernel sit and gre devices are left out: this backend can neither
/// create nor destroy them.
pub fn tunnels_in(root: &Path) -> Result<Vec<TunnelInfo>, NetError> {
    let entries = fs::read_dir(root).map_err(|e| NetError::unavailable("read interface directory", e))?;

    let mut tunnels: Vec<TunnelInfo> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let kind = tunnel_kind(&entry.path())?;
            Some(TunnelInfo::new(entry.file_name().to_string_lossy(), kind))
        })
        .collect();
    tunnels.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(tunnels)
}

impl TunnelControl for PlatformKernel {
    fn tunnels(&self) -> Result<Vec<TunnelInfo>, NetError> {
        tunnels_in(Path::new(SYS_CLASS_NET))
    }

    fn supported_kinds(&self) -> &'static [TunnelKind] {
        &[TunnelKind::Tun, TunnelKind::Tap]
    }

    fn create_tunnel(&self, tunnel: &TunnelSpec) -> io::Result<()> {
        set_persist(tunnel, true)
    }

    fn destroy_tunnel(&self, tunnel: &TunnelSpec) -> io::Result<()> {
        set_persist(tunnel, false)
    }
}
