//! In-memory kernel used by the resource tests.

use std::cell::{Cell, RefCell};
use std::io;
use std::net::IpAddr;

use crate::network::{
    AddressAssignment, AddressControl, AddressFamily, DecodedAddress, InterfaceRecord, NetError,
    RouteControl, RouteMessage, RouteSpec, TunnelControl, TunnelInfo, TunnelKind, TunnelSpec,
    encode, netmask,
};

fn os(code: i32) -> io::Error {
    io::Error::from_raw_os_error(code)
}

/// Kernel state held in memory, with optional injected failures.
pub struct MockKernel {
    records: RefCell<Vec<InterfaceRecord>>,
    routes: RefCell<Vec<RouteSpec>>,
    tunnels: RefCell<Vec<TunnelInfo>>,
    kinds: &'static [TunnelKind],
    name_selects_kind: bool,
    mutation_error: Cell<Option<i32>>,
    query_error: Cell<Option<i32>>,
    pub mutations: Cell<usize>,
    pub dumped: RefCell<Vec<AddressFamily>>,
    pub removed: RefCell<Vec<AddressAssignment>>,
}

impl MockKernel {
    /// A host with `lo0` (127.0.0.1) and `en0` (10.0.0.2), Linux-style tunnels.
    pub fn new() -> Self {
        Self {
            records: RefCell::new(vec![
                InterfaceRecord::new("lo0", Some(encode("127.0.0.1".parse().unwrap()))),
                InterfaceRecord::new("en0", Some(encode("10.0.0.2".parse().unwrap()))),
            ]),
            routes: RefCell::new(Vec::new()),
            tunnels: RefCell::new(Vec::new()),
            kinds: &[TunnelKind::Tun, TunnelKind::Tap],
            name_selects_kind: false,
            mutation_error: Cell::new(None),
            query_error: Cell::new(None),
            mutations: Cell::new(0),
            dumped: RefCell::new(Vec::new()),
            removed: RefCell::new(Vec::new()),
        }
    }

    /// Switches to cloner semantics: the name selects the kind.
    pub fn bsd_style(mut self) -> Self {
        self.kinds = &[TunnelKind::Tun, TunnelKind::Tap, TunnelKind::Gif, TunnelKind::Gre];
        self.name_selects_kind = true;
        self
    }

    /// Adds `address/prefix_len` to `interface`, netmask included.
    pub fn with_address(self, interface: &str, address: &str, prefix_len: u8) -> Self {
        self.records.borrow_mut().push(record(interface, ip(address), prefix_len));
        self
    }

    pub fn with_tunnel(self, name: &str, kind: TunnelKind) -> Self {
        self.tunnels.borrow_mut().push(TunnelInfo::new(name, kind));
        self
    }

    pub fn with_route(self, route: RouteSpec) -> Self {
        self.routes.borrow_mut().push(route);
        self
    }

    /// Every following mutation fails with `errno`.
    pub fn fail_mutations_with(&self, errno: i32) {
        self.mutation_error.set(Some(errno));
    }

    /// Every following query fails with `errno`.
    pub fn fail_queries_with(&self, errno: i32) {
        self.query_error.set(Some(errno));
    }

    pub fn tunnel_names(&self) -> Vec<String> {
        self.tunnels.borrow().iter().map(|t| t.name.clone()).collect()
    }

    pub fn route_count(&self) -> usize {
        self.routes.borrow().len()
    }

    fn mutate(&self) -> io::Result<()> {
        self.mutations.set(self.mutations.get() + 1);
        self.mutation_error.get().map_or(Ok(()), |errno| Err(os(errno)))
    }

    fn query(&self, operation: &'static str) -> Result<(), NetError> {
        self.query_error
            .get()
            .map_or(Ok(()), |errno| Err(NetError::unavailable(operation, os(errno))))
    }

    fn position(&self, assignment: &AddressAssignment) -> Option<usize> {
        self.records.borrow().iter().position(|r| {
            r.name == assignment.interface
                && r.ip() == Some(assignment.address)
        })
    }
}

impl AddressControl for MockKernel {
    fn interface_records(&self) -> Result<Vec<InterfaceRecord>, NetError> {
        self.query("getifaddrs")?;
        Ok(self.records.borrow().clone())
    }

    fn add_address(&self, assignment: &AddressAssignment) -> io::Result<()> {
        self.mutate()?;
        if !self.records.borrow().iter().any(|r| r.name == assignment.interface) {
            return Err(os(libc::ENODEV));
        }
        if self.position(assignment).is_some() {
            return Err(os(libc::EEXIST));
        }
        self.records.borrow_mut().push(record(
            &assignment.interface,
            assignment.address,
            assignment.prefix_len,
        ));
        Ok(())
    }

    /// Like the kernel, a known prefix must match the request's.
    fn remove_address(&self, assignment: &AddressAssignment) -> io::Result<()> {
        self.mutate()?;
        self.removed.borrow_mut().push(assignment.clone());
        let index = self.position(assignment).ok_or_else(|| os(libc::EADDRNOTAVAIL))?;
        let assigned = self.records.borrow()[index].prefix_len();
        if assigned.is_some_and(|prefix| prefix != assignment.prefix_len) {
            return Err(os(libc::EADDRNOTAVAIL));
        }
        self.records.borrow_mut().remove(index);
        Ok(())
    }
}

impl RouteControl for MockKernel {
    fn dump_routes(&self, family: AddressFamily) -> Result<Vec<RouteMessage>, NetError> {
        self.query("route dump")?;
        self.dumped.borrow_mut().push(family);
        Ok(self
            .routes
            .borrow()
            .iter()
            .filter(|r| r.family() == family)
            .map(|r| {
                RouteMessage::new(
                    family,
                    vec![
                        DecodedAddress::from(r.destination),
                        r.gateway.map_or_else(DecodedAddress::unsupported, DecodedAddress::from),
                        DecodedAddress::from(r.netmask()),
                    ],
                )
            })
            .collect())
    }

    fn add_route(&self, route: &RouteSpec) -> io::Result<()> {
        self.mutate()?;
        let mut routes = self.routes.borrow_mut();
        if routes
            .iter()
            .any(|r| r.destination == route.destination && r.prefix_len == route.prefix_len)
        {
            return Err(os(libc::EEXIST));
        }
        routes.push(route.clone());
        Ok(())
    }

    fn delete_route(&self, route: &RouteSpec) -> io::Result<()> {
        self.mutate()?;
        let mut routes = self.routes.borrow_mut();
        let index = routes
            .iter()
            .position(|r| {
                r.destination == route.destination
                    && r.prefix_len == route.prefix_len
                    && route.gateway.is_none_or(|g| r.gateway == Some(g))
            })
            .ok_or_else(|| os(libc::ESRCH))?;
        routes.remove(index);
        Ok(())
    }
}

impl TunnelControl for MockKernel {
    fn tunnels(&self) -> Result<Vec<TunnelInfo>, NetError> {
        self.query("list tunnels")?;
        Ok(self.tunnels.borrow().clone())
    }

    fn supported_kinds(&self) -> &'static [TunnelKind] {
        self.kinds
    }

    fn name_selects_kind(&self) -> bool {
        self.name_selects_kind
    }

    fn create_tunnel(&self, tunnel: &TunnelSpec) -> io::Result<()> {
        self.mutate()?;
        let mut tunnels = self.tunnels.borrow_mut();
        if tunnels.iter().any(|t| t.name == tunnel.name) {
            return Err(os(libc::EEXIST));
        }
        tunnels.push(TunnelInfo::new(tunnel.name.clone(), tunnel.kind));
        Ok(())
    }

    fn destroy_tunnel(&self, tunnel: &TunnelSpec) -> io::Result<()> {
        self.mutate()?;
        let mut tunnels = self.tunnels.borrow_mut();
        let index = tunnels
            .iter()
            .position(|t| t.name == tunnel.name)
            .ok_or_else(|| os(libc::ENXIO))?;
        tunnels.remove(index);
        Ok(())
    }
}

fn record(interface: &str, address: IpAddr, prefix_len: u8) -> InterfaceRecord {
    let mask = netmask(AddressFamily::of(&address), prefix_len).map(encode);
    InterfaceRecord::new(interface, Some(encode(address))).with_netmask(mask)
}

/// Parses an address literal.
pub fn ip(text: &str) -> IpAddr {
    text.parse().unwrap()
}
