//! Minimal synchronous rtnetlink client.
//!
//! Only what the Linux backend needs: one request at a time, acknowledged
//! mutations, and route dumps.

use std::io;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};

use netlink_sys::{Socket, SocketAddr, protocols};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::network::{AddressFamily, DecodedAddress, RouteMessage, netmask};

/// Netlink message alignment.
const NLMSG_ALIGNTO: usize = 4;

/// Receive buffer size; one datagram of a dump fits comfortably.
const RECV_BUFFER: usize = 32 * 1024;

pub const NLMSG_ERROR: u16 = 2;
pub const NLMSG_DONE: u16 = 3;
pub const RTM_NEWADDR: u16 = 20;
pub const RTM_DELADDR: u16 = 21;
pub const RTM_NEWROUTE: u16 = 24;
pub const RTM_DELROUTE: u16 = 25;
pub const RTM_GETROUTE: u16 = 26;

pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_ACK: u16 = 0x04;
pub const NLM_F_DUMP: u16 = 0x300;
pub const NLM_F_EXCL: u16 = 0x200;
pub const NLM_F_CREATE: u16 = 0x400;

pub const IFA_ADDRESS: u16 = 1;
pub const IFA_LOCAL: u16 = 2;

pub const RTA_DST: u16 = 1;
pub const RTA_OIF: u16 = 4;
pub const RTA_GATEWAY: u16 = 5;
pub const RTA_TABLE: u16 = 15;

pub const RT_TABLE_MAIN: u8 = 254;
pub const RTPROT_BOOT: u8 = 3;
pub const RT_SCOPE_UNIVERSE: u8 = 0;
pub const RT_SCOPE_LINK: u8 = 253;
pub const RT_SCOPE_NOWHERE: u8 = 255;
pub const RTN_UNICAST: u8 = 1;

const fn align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Netlink message header.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    pub len: u32,
    pub kind: u16,
    pub flags: u16,
    pub seq: u32,
    pub pid: u32,
}

const NLMSG_HDRLEN: usize = size_of::<NlMsgHdr>();

/// Routing attribute header.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
struct RtAttr {
    len: u16,
    kind: u16,
}

/// Address message body (`struct ifaddrmsg`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfAddrMsg {
    pub family: u8,
    pub prefix_len: u8,
    pub flags: u8,
    pub scope: u8,
    pub index: u32,
}

/// Route message body (`struct rtmsg`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtMsg {
    pub family: u8,
    pub dst_len: u8,
    pub src_len: u8,
    pub tos: u8,
    pub table: u8,
    pub protocol: u8,
    pub scope: u8,
    pub kind: u8,
    pub flags: u32,
}

// ============================================================================
// Request builder
// ============================================================================

/// A single netlink request under construction.
pub struct Request {
    buffer: Vec<u8>,
}

impl Request {
    /// Starts a request with the given message type and flags.
    pub fn new(kind: u16, flags: u16) -> Self {
        let header = NlMsgHdr {
            kind,
            flags,
            ..NlMsgHdr::default()
        };
        Self {
            buffer: header.as_bytes().to_vec(),
        }
    }

    /// Appends a fixed-size message body.
    #[must_use]
    pub fn body<T: IntoBytes + Immutable>(mut self, body: &T) -> Self {
        self.buffer.extend_from_slice(body.as_bytes());
        self.pad();
        self
    }

    /// Appends an attribute.
    #[must_use]
    pub fn attr(mut self, kind: u16, payload: &[u8]) -> Self {
        let header = RtAttr {
            len: u16::try_from(size_of::<RtAttr>() + payload.len()).unwrap_or(u16::MAX),
            kind,
        };
        self.buffer.extend_from_slice(header.as_bytes());
        self.buffer.extend_from_slice(payload);
        self.pad();
        self
    }

    /// Appends an IP address attribute in network byte order.
    #[must_use]
    pub fn addr_attr(self, kind: u16, addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => self.attr(kind, &v4.octets()),
            IpAddr::V6(v6) => self.attr(kind, &v6.octets()),
        }
    }

    fn pad(&mut self) {
        self.buffer.resize(align(self.buffer.len()), 0);
    }

    /// Finalizes the length and sequence fields.
    pub(super) fn finish(mut self, seq: u32) -> Vec<u8> {
        let len = u32::try_from(self.buffer.len()).unwrap_or(u32::MAX);
        self.buffer[0..4].copy_from_slice(&len.to_ne_bytes());
        self.buffer[8..12].copy_from_slice(&seq.to_ne_bytes());
        self.buffer
    }
}

// ============================================================================
// Socket
// ============================================================================

/// A bound `NETLINK_ROUTE` socket.
pub struct RouteSocket {
    socket: Socket,
    seq: AtomicU32,
}

impl RouteSocket {
    /// Opens and binds a route socket.
    pub fn open() -> io::Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_ROUTE)?;
        socket.bind(&SocketAddr::new(0, 0))?;
        Ok(Self {
            socket,
            seq: AtomicU32::new(1),
        })
    }

    fn send(&self, request: Request) -> io::Result<u32> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let bytes = request.finish(seq);
        self.socket.send(&bytes, 0)?;
        Ok(seq)
    }

    fn recv(&self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(RECV_BUFFER);
        self.socket.recv(&mut buffer, 0)?;
        Ok(buffer)
    }

    /// Sends a request that expects an acknowledgement.
    ///
    /// A negative error code in the ack comes back as the matching OS error.
    pub fn execute(&self, request: Request) -> io::Result<()> {
        let seq = self.send(request)?;
        loop {
            let datagram = self.recv()?;
            for (header, payload) in Messages::new(&datagram) {
                if header.seq != seq {
                    continue;
                }
                match header.kind {
                    NLMSG_ERROR => return ack_result(payload),
                    NLMSG_DONE => return Ok(()),
                    _ => {}
                }
            }
        }
    }

    /// Sends a dump request and collects every reply payload of `kind`.
    pub fn dump(&self, request: Request, kind: u16) -> io::Result<Vec<Vec<u8>>> {
        let seq = self.send(request)?;
        let mut payloads = Vec::new();
        loop {
            let datagram = self.recv()?;
            for (header, payload) in Messages::new(&datagram) {
                if header.seq != seq {
                    continue;
                }
                match header.kind {
                    NLMSG_DONE => return Ok(payloads),
                    NLMSG_ERROR => {
                        ack_result(payload)?;
                        return Ok(payloads);
                    }
                    k if k == kind => payloads.push(payload.to_vec()),
                    _ => {}
                }
            }
        }
    }
}

fn ack_result(payload: &[u8]) -> io::Result<()> {
    let code = i32::read_from_prefix(payload).map_or(0, |(code, _)| code);
    if code < 0 {
        Err(io::Error::from_raw_os_error(-code))
    } else {
        Ok(())
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Iterator over the messages of one netlink datagram.
pub struct Messages<'a> {
    buffer: &'a [u8],
}

impl<'a> Messages<'a> {
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }
}

impl<'a> Iterator for Messages<'a> {
    type Item = (NlMsgHdr, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (header, _) = NlMsgHdr::read_from_prefix(self.buffer).ok()?;
        let len = header.len as usize;
        if len < NLMSG_HDRLEN || len > self.buffer.len() {
            self.buffer = &[];
            return None;
        }
        let payload = &self.buffer[NLMSG_HDRLEN..len];
        self.buffer = self.buffer.get(align(len)..).unwrap_or(&[]);
        Some((header, payload))
    }
}

/// Iterator over the attributes following a message body.
pub(super) struct Attributes<'a> {
    buffer: &'a [u8],
}

impl<'a> Attributes<'a> {
    pub(super) const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (header, _) = RtAttr::read_from_prefix(self.buffer).ok()?;
        let len = usize::from(header.len);
        if len < size_of::<RtAttr>() || len > self.buffer.len() {
            self.buffer = &[];
            return None;
        }
        let payload = &self.buffer[size_of::<RtAttr>()..len];
        self.buffer = self.buffer.get(align(len)..).unwrap_or(&[]);
        Some((header.kind, payload))
    }
}

fn ip_from(family: AddressFamily, payload: &[u8]) -> Option<IpAddr> {
    match family {
        AddressFamily::Ipv4 => <[u8; 4]>::try_from(payload).ok().map(IpAddr::from),
        AddressFamily::Ipv6 => <[u8; 16]>::try_from(payload).ok().map(IpAddr::from),
        AddressFamily::Unsupported => None,
    }
}

/// Decodes one `RTM_NEWROUTE` payload from the main table.
///
/// Entries are laid out as destination, gateway, netmask. A route without
/// a gateway carries an unsupported placeholder in that slot. Routes from
/// other tables yield `None`.
pub fn decode_route(payload: &[u8]) -> Option<RouteMessage> {
    let (body, _) = RtMsg::read_from_prefix(payload).ok()?;
    let family = AddressFamily::from_raw(i32::from(body.family));
    let attrs = Attributes::new(payload.get(align(size_of::<RtMsg>())..).unwrap_or(&[]));

    let mut table = u32::from(body.table);
    let mut destination = None;
    let mut gateway = None;
    for (kind, value) in attrs {
        match kind {
            RTA_DST => destination = ip_from(family, value),
            RTA_GATEWAY => gateway = ip_from(family, value),
            RTA_TABLE => {
                if let Ok((id, _)) = u32::read_from_prefix(value) {
                    table = id;
                }
            }
            _ => {}
        }
    }
    if table != u32::from(RT_TABLE_MAIN) {
        return None;
    }

    let unspecified = netmask(family, 0);
    let entries = vec![
        destination
            .or(unspecified)
            .map_or_else(DecodedAddress::unsupported, DecodedAddress::from),
        gateway.map_or_else(DecodedAddress::unsupported, DecodedAddress::from),
        netmask(family, body.dst_len).map_or_else(DecodedAddress::unsupported, DecodedAddress::from),
    ];
    Some(RouteMessage::new(family, entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route_payload(body: RtMsg, attrs: &[(u16, &[u8])]) -> Vec<u8> {
        let mut request = Request::new(RTM_NEWROUTE, 0).body(&body);
        for (kind, value) in attrs {
            request = request.attr(*kind, value);
        }
        request.finish(1)[NLMSG_HDRLEN..].to_vec()
    }

    fn main_v4(dst_len: u8) -> RtMsg {
        RtMsg {
            family: u8::try_from(libc::AF_INET).unwrap(),
            dst_len,
            table: RT_TABLE_MAIN,
            ..RtMsg::default()
        }
    }

    #[test]
    fn request_sets_length_and_alignment() {
        let bytes = Request::new(RTM_GETROUTE, NLM_F_REQUEST | NLM_F_DUMP)
            .body(&RtMsg::default())
            .attr(RTA_OIF, &[1, 0, 0])
            .finish(9);

        assert_eq!(bytes.len() % NLMSG_ALIGNTO, 0);
        let (header, _) = NlMsgHdr::read_from_prefix(&bytes[..]).unwrap();
        assert_eq!(header.len as usize, bytes.len());
        assert_eq!(header.seq, 9);
        assert_eq!(header.kind, RTM_GETROUTE);
    }

    #[test]
    fn messages_stop_at_truncated_length() {
        let mut datagram = Request::new(NLMSG_DONE, 0).finish(1);
        let mut bogus = Request::new(NLMSG_DONE, 0).finish(2);
        bogus[0..4].copy_from_slice(&1000u32.to_ne_bytes());
        datagram.extend_from_slice(&bogus);

        let seqs: Vec<u32> = Messages::new(&datagram).map(|(h, _)| h.seq).collect();
        assert_eq!(seqs, [1]);
    }

    #[test]
    fn ack_maps_negative_code_to_os_error() {
        let error = ack_result(&(-libc::EEXIST).to_ne_bytes()).unwrap_err();
        assert_eq!(error.raw_os_error(), Some(libc::EEXIST));
        assert!(ack_result(&0i32.to_ne_bytes()).is_ok());
    }

    #[test]
    fn decodes_gateway_route() {
        let payload = route_payload(
            main_v4(24),
            &[(RTA_DST, &[10, 1, 0, 0]), (RTA_GATEWAY, &[192, 168, 1, 1])],
        );

        let route = decode_route(&payload).unwrap();

        let texts: Vec<_> = route.entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["10.1.0.0", "192.168.1.1", "255.255.255.0"]);
        assert_eq!(route.family, AddressFamily::Ipv4);
    }

    #[test]
    fn default_route_has_unspecified_destination() {
        let payload = route_payload(main_v4(0), &[(RTA_GATEWAY, &[10, 0, 0, 1])]);

        let route = decode_route(&payload).unwrap();

        assert_eq!(route.entries[0].text, "0.0.0.0");
        assert_eq!(route.entries[2].text, "0.0.0.0");
    }

    #[test]
    fn link_route_has_unsupported_gateway() {
        let payload = route_payload(main_v4(24), &[(RTA_DST, &[10, 1, 0, 0])]);

        let route = decode_route(&payload).unwrap();

        assert!(!route.entries[1].is_supported());
        assert_eq!(route.supported().count(), 2);
    }

    #[test]
    fn other_tables_are_skipped() {
        let mut body = main_v4(32);
        body.table = 255;
        assert!(decode_route(&route_payload(body, &[])).is_none());

        let body = main_v4(32);
        let payload = route_payload(body, &[(RTA_TABLE, &1000u32.to_ne_bytes())]);
        assert!(decode_route(&payload).is_none());
    }
}
