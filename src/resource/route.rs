//! Routing table resource.

use std::net::IpAddr;

use tracing::{debug, info};

use super::params::{parse_cidr, parse_ip, parse_prefix};
use super::{Listing, Outcome, Parameters, Resource, ResourceKind, classify, validate_interface_name};
use crate::network::{AddressFamily, IpVersion, NetError, RouteControl, RouteMessage, RouteSpec, netmask};

const KEYS: &[&str] = &["destination", "mask", "gateway", "interface"];

/// Lists, adds, and deletes routes.
#[derive(Debug)]
pub struct RouteResource<'k, K: ?Sized> {
    kernel: &'k K,
    families: IpVersion,
}

impl<'k, K: RouteControl + ?Sized> RouteResource<'k, K> {
    /// Creates the resource over `kernel`, listing `families`.
    #[must_use]
    pub const fn new(kernel: &'k K, families: IpVersion) -> Self {
        Self { kernel, families }
    }

    /// Dumps the routing table, IPv4 messages before IPv6.
    ///
    /// # Errors
    ///
    /// Returns the first dump failure; no partial listing is returned.
    pub fn routes(&self) -> Result<Vec<RouteMessage>, NetError> {
        let mut routes = Vec::new();
        for family in self.families.families() {
            let messages = self.kernel.dump_routes(family)?;
            debug!("Decoded {} {} route messages", messages.len(), family);
            routes.extend(messages);
        }
        Ok(routes)
    }

    /// Adds a route to `destination/prefix_len` via `gateway`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidArgument`] when no gateway is given or the
    /// addresses are inconsistent, and other variants for kernel failures.
    pub fn add_route(
        &self,
        destination: IpAddr,
        prefix_len: u8,
        gateway: Option<IpAddr>,
    ) -> Result<Outcome, NetError> {
        self.apply_add(&RouteSpec {
            destination,
            prefix_len,
            gateway,
            interface: None,
        })
    }

    /// Deletes the route to `destination/prefix_len`.
    ///
    /// # Errors
    ///
    /// Same as [`RouteResource::add_route`].
    pub fn delete_route(&self, destination: IpAddr, prefix_len: u8) -> Result<Outcome, NetError> {
        self.apply_delete(&RouteSpec {
            destination,
            prefix_len,
            gateway: None,
            interface: None,
        })
    }

    /// Adds `route`, which needs a gateway or an outgoing interface.
    ///
    /// # Errors
    ///
    /// Same as [`RouteResource::add_route`].
    pub fn apply_add(&self, route: &RouteSpec) -> Result<Outcome, NetError> {
        validate(route)?;
        if route.gateway.is_none() && route.interface.is_none() {
            return Err(NetError::invalid(
                "gateway",
                "adding a route needs a gateway or an interface",
            ));
        }

        let outcome = classify(self.kernel.add_route(route), "add route", &[])?;
        match outcome {
            Outcome::Success => info!("Added route {}", route),
            _ => debug!("Route {} already present", route),
        }
        Ok(outcome)
    }

    /// Deletes `route`.
    ///
    /// # Errors
    ///
    /// Same as [`RouteResource::add_route`].
    pub fn apply_delete(&self, route: &RouteSpec) -> Result<Outcome, NetError> {
        validate(route)?;
        let outcome = classify(
            self.kernel.delete_route(route),
            "delete route",
            &[libc::ESRCH],
        )?;
        match outcome {
            Outcome::Success => info!("Deleted route {}", route),
            _ => debug!("Route {} not present", route),
        }
        Ok(outcome)
    }
}

fn host_bits_clear(destination: IpAddr, mask: IpAddr) -> bool {
    match (destination, mask) {
        (IpAddr::V4(d), IpAddr::V4(m)) => u32::from(d) & !u32::from(m) == 0,
        (IpAddr::V6(d), IpAddr::V6(m)) => u128::from(d) & !u128::from(m) == 0,
        _ => false,
    }
}

fn validate(route: &RouteSpec) -> Result<(), NetError> {
    let family = route.family();
    let mask = netmask(family, route.prefix_len).ok_or_else(|| {
        NetError::invalid(
            "mask",
            format!("prefix length {} exceeds {}", route.prefix_len, family.max_prefix_len()),
        )
    })?;
    if !host_bits_clear(route.destination, mask) {
        return Err(NetError::invalid(
            "destination",
            format!("{} has host bits set for /{}", route.destination, route.prefix_len),
        ));
    }
    if let Some(gateway) = route.gateway {
        if AddressFamily::of(&gateway) != family {
            return Err(NetError::invalid("gateway", format!("gateway is not {family}")));
        }
    }
    if let Some(ref interface) = route.interface {
        validate_interface_name(interface)?;
    }
    Ok(())
}

/// Reads `destination` (CIDR or `default`), `mask`, `gateway`, `interface`.
fn from_parameters(parameters: &Parameters) -> Result<RouteSpec, NetError> {
    parameters.expect_only(KEYS)?;
    let gateway = parameters
        .get("gateway")
        .map(|text| parse_ip("gateway", text))
        .transpose()?;
    let interface = parameters.get("interface").map(str::to_owned);

    let destination = parameters.require("destination")?;
    let (destination, prefix_len) = if destination.eq_ignore_ascii_case("default") {
        if parameters.get("mask").is_some() {
            return Err(NetError::invalid("mask", "the default route takes no mask"));
        }
        let unspecified = match gateway {
            Some(IpAddr::V6(_)) => netmask(AddressFamily::Ipv6, 0),
            _ => netmask(AddressFamily::Ipv4, 0),
        };
        let destination = unspecified
            .ok_or_else(|| NetError::invalid("destination", "no unspecified address for family"))?;
        (destination, 0)
    } else {
        let (destination, cidr_prefix) = parse_cidr("destination", destination)?;
        let family = AddressFamily::of(&destination);
        let mask = parameters
            .get("mask")
            .map(|text| parse_prefix("mask", text, family))
            .transpose()?;
        let prefix_len = match (cidr_prefix, mask) {
            (Some(a), Some(b)) if a != b => {
                return Err(NetError::invalid("mask", format!("conflicts with /{a} given in destination")));
            }
            (Some(prefix), _) | (None, Some(prefix)) => prefix,
            (None, None) => {
                return Err(NetError::invalid(
                    "mask",
                    "give a prefix as destination=<addr>/<len> or mask=<len|netmask>",
                ));
            }
        };
        (destination, prefix_len)
    };

    Ok(RouteSpec {
        destination,
        prefix_len,
        gateway,
        interface,
    })
}

impl<K: RouteControl + ?Sized> Resource for RouteResource<'_, K> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Route
    }

    fn list(&self) -> Result<Listing, NetError> {
        self.routes().map(Listing::Routes)
    }

    fn add(&self, parameters: &Parameters) -> Result<Outcome, NetError> {
        self.apply_add(&from_parameters(parameters)?)
    }

    fn delete(&self, parameters: &Parameters) -> Result<Outcome, NetError> {
        self.apply_delete(&from_parameters(parameters)?)
    }
}
