//! Tests for the run module.

use std::cell::RefCell;
use std::io;
use std::net::IpAddr;

use ifctl::config::Cli;
use ifctl::network::{
    AddressAssignment, AddressFamily, InterfaceRecord, RouteMessage, RouteSpec, TunnelInfo,
    TunnelKind, TunnelSpec, encode,
};

use super::*;

/// In-memory kernel with a fixed address and route table.
struct FakeKernel {
    tunnels: RefCell<Vec<TunnelInfo>>,
    fail_with: Option<i32>,
}

impl FakeKernel {
    fn new() -> Self {
        Self {
            tunnels: RefCell::new(vec![
                TunnelInfo::new("tun0", TunnelKind::Tun),
                TunnelInfo::new("tap1", TunnelKind::Tap),
            ]),
            fail_with: None,
        }
    }

    fn failing(code: i32) -> Self {
        Self {
            fail_with: Some(code),
            ..Self::new()
        }
    }

    fn mutate(&self) -> io::Result<()> {
        self.fail_with
            .map_or(Ok(()), |code| Err(io::Error::from_raw_os_error(code)))
    }
}

fn ip(text: &str) -> IpAddr {
    text.parse().unwrap()
}

impl AddressControl for FakeKernel {
    fn interface_records(&self) -> Result<Vec<InterfaceRecord>, NetError> {
        Ok(vec![
            InterfaceRecord::new("lo0", Some(encode(ip("127.0.0.1")))),
            InterfaceRecord::new("en0", None),
            InterfaceRecord::new("en0", Some(encode(ip("10.0.0.2")))),
            InterfaceRecord::new("en0", Some(encode(ip("fe80::1")))),
        ])
    }

    fn add_address(&self, _: &AddressAssignment) -> io::Result<()> {
        self.mutate()
    }

    fn remove_address(&self, _: &AddressAssignment) -> io::Result<()> {
        self.mutate()
    }
}

impl RouteControl for FakeKernel {
    fn dump_routes(&self, family: AddressFamily) -> Result<Vec<RouteMessage>, NetError> {
        if family != AddressFamily::Ipv4 {
            return Ok(Vec::new());
        }
        Ok(vec![RouteMessage::new(
            family,
            vec![
                DecodedAddress::from(ip("10.0.0.0")),
                DecodedAddress::unsupported(),
                DecodedAddress::from(ip("255.0.0.0")),
            ],
        )])
    }

    fn add_route(&self, _: &RouteSpec) -> io::Result<()> {
        self.mutate()
    }

    fn delete_route(&self, _: &RouteSpec) -> io::Result<()> {
        self.mutate()
    }
}

impl TunnelControl for FakeKernel {
    fn tunnels(&self) -> Result<Vec<TunnelInfo>, NetError> {
        Ok(self.tunnels.borrow().clone())
    }

    fn supported_kinds(&self) -> &'static [TunnelKind] {
        &[TunnelKind::Tun, TunnelKind::Tap]
    }

    fn create_tunnel(&self, tunnel: &TunnelSpec) -> io::Result<()> {
        self.mutate()?;
        self.tunnels
            .borrow_mut()
            .push(TunnelInfo::new(tunnel.name.clone(), tunnel.kind));
        Ok(())
    }

    fn destroy_tunnel(&self, tunnel: &TunnelSpec) -> io::Result<()> {
        self.mutate()?;
        self.tunnels.borrow_mut().retain(|t| t.name != tunnel.name);
        Ok(())
    }
}

fn config(args: &[&str]) -> ValidatedConfig {
    let mut full_args = vec!["ifctl", "--no-color"];
    full_args.extend(args);
    ValidatedConfig::from_raw(&Cli::parse_from_iter(full_args), None).unwrap()
}

fn run(kernel: &FakeKernel, args: &[&str]) -> Result<String, RunError> {
    let mut out = Vec::new();
    execute_with(kernel, &config(args), &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

fn run_json(kernel: &FakeKernel, args: &[&str]) -> serde_json::Value {
    let mut full_args = vec!["--json"];
    full_args.extend(args);
    serde_json::from_str(&run(kernel, &full_args).unwrap()).unwrap()
}

// ============================================================================
// Listings
// ============================================================================

mod listings {
    use super::*;

    #[test]
    fn addresses_hide_unsupported_by_default() {
        let json = run_json(&FakeKernel::new(), &["addr", "list"]);

        let en0 = &json[1];
        assert_eq!(en0["name"], "en0");
        assert_eq!(en0["addresses"].as_array().unwrap().len(), 2);
        assert_eq!(en0["addresses"][0]["address"], "10.0.0.2");
    }

    #[test]
    fn show_unsupported_keeps_every_entry() {
        let json = run_json(&FakeKernel::new(), &["--show-unsupported", "addr", "list"]);

        let en0 = &json[1]["addresses"];
        assert_eq!(en0.as_array().unwrap().len(), 3);
        assert_eq!(en0[0]["family"], "unsupported");
    }

    #[test]
    fn family_selection_drops_other_family() {
        let json = run_json(&FakeKernel::new(), &["--family", "ipv6", "addr", "list"]);

        let interfaces = json.as_array().unwrap();
        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0]["name"], "en0");
        assert_eq!(interfaces[0]["addresses"][0]["address"], "fe80::1");
    }

    #[test]
    fn interface_filter_applies_to_addresses() {
        let json = run_json(&FakeKernel::new(), &["--exclude-iface", "^lo", "addr", "list"]);

        let interfaces = json.as_array().unwrap();
        assert_eq!(interfaces.len(), 1);
        assert_eq!(interfaces[0]["name"], "en0");
    }

    #[test]
    fn interface_filter_applies_to_tunnels() {
        let json = run_json(&FakeKernel::new(), &["--include-iface", "^tap", "tun", "list"]);

        assert_eq!(json, serde_json::json!([{ "name": "tap1", "kind": "tap" }]));
    }

    #[test]
    fn routes_render_one_block_per_message() {
        let text = run(&FakeKernel::new(), &["--show-unsupported", "route", "list"]).unwrap();

        assert!(text.contains("route"));
        assert!(text.contains("  10.0.0.0\n"));
        assert!(text.contains("unsupported"));
        assert!(text.contains("  255.0.0.0\n"));
    }

    #[test]
    fn route_entries_hide_unsupported_slots() {
        let json = run_json(&FakeKernel::new(), &["route", "list"]);

        let entries = json[0]["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["address"], "255.0.0.0");
    }

    #[test]
    fn text_addresses_list_one_interface_per_line() {
        let text = run(&FakeKernel::new(), &["addr", "list"]).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("lo0"));
        assert!(lines[1].contains("10.0.0.2"));
        assert!(lines[1].contains("fe80::1"));
    }
}

// ============================================================================
// Mutations
// ============================================================================

mod mutations {
    use super::*;

    #[test]
    fn add_reports_success() {
        let text = run(&FakeKernel::new(), &["tun", "add", "name=tun5"]).unwrap();

        assert!(text.starts_with("tunnel add name=tun5: "));
        assert!(text.contains("ok"));
    }

    #[test]
    fn add_existing_reports_already_exists() {
        let json = run_json(&FakeKernel::new(), &["tun", "add", "name=tun0"]);

        assert_eq!(json, serde_json::json!({ "outcome": "already_exists" }));
    }

    #[test]
    fn delete_missing_address_reports_not_found() {
        let text = run(
            &FakeKernel::new(),
            &["addr", "del", "address=10.9.9.9", "interface=en0"],
        )
        .unwrap();

        assert!(text.contains("not found"));
    }

    #[test]
    fn permission_failure_is_an_error() {
        let result = run(
            &FakeKernel::failing(libc::EPERM),
            &["route", "add", "destination=10.1.0.0/16", "gateway=10.0.0.1"],
        );

        let Err(RunError::Operation { request, source }) = result else {
            panic!("expected an operation error");
        };
        assert!(request.starts_with("route add"));
        assert!(source.is_permission_denied());
    }
}

// ============================================================================
// RunError
// ============================================================================

mod run_error {
    use super::*;

    #[test]
    fn operation_displays_request_and_source() {
        let error = RunError::Operation {
            request: "tunnel add name=tun0".to_string(),
            source: NetError::invalid("name", "too long"),
        };
        assert_eq!(
            error.to_string(),
            "tunnel add name=tun0: Invalid argument 'name': too long"
        );
    }

    #[test]
    fn output_error_displays_message() {
        let error = RunError::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(error.to_string().starts_with("Failed to write output"));
    }
}
