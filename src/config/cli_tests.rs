//! Tests for CLI argument parsing.

use super::cli::{ActionCommand, Cli, Command, IpVersionArg};

mod parsing {
    use super::*;

    #[test]
    fn parse_list_command() {
        let cli = Cli::parse_from_iter(["ifctl", "address", "list"]);

        assert!(matches!(
            cli.command,
            Command::Address {
                action: ActionCommand::List
            }
        ));
        assert!(!cli.json);
        assert!(cli.family.is_none());
    }

    #[test]
    fn parse_add_with_parameters() {
        let cli = Cli::parse_from_iter([
            "ifctl",
            "route",
            "add",
            "destination=10.0.0.0/8",
            "gateway=192.168.1.1",
        ]);

        let Command::Route {
            action: ActionCommand::Add { params },
        } = cli.command
        else {
            panic!("expected route add");
        };
        assert_eq!(params, ["destination=10.0.0.0/8", "gateway=192.168.1.1"]);
    }

    #[test]
    fn parse_all_families() {
        let v4 = Cli::parse_from_iter(["ifctl", "--family", "ipv4", "r", "l"]);
        assert_eq!(v4.family, Some(IpVersionArg::V4));

        let v6 = Cli::parse_from_iter(["ifctl", "--family", "ipv6", "r", "l"]);
        assert_eq!(v6.family, Some(IpVersionArg::V6));

        let both = Cli::parse_from_iter(["ifctl", "--family", "both", "r", "l"]);
        assert_eq!(both.family, Some(IpVersionArg::Both));
    }

    #[test]
    fn parse_filter_options() {
        let cli = Cli::parse_from_iter([
            "ifctl",
            "addr",
            "list",
            "--include-iface",
            "^en",
            "--include-iface",
            "^eth",
            "--exclude-iface",
            "^utun",
        ]);

        assert_eq!(cli.include_ifaces, ["^en", "^eth"]);
        assert_eq!(cli.exclude_ifaces, ["^utun"]);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from_iter([
            "ifctl",
            "tun",
            "list",
            "--json",
            "--no-color",
            "--show-unsupported",
            "-v",
        ]);

        assert!(cli.json);
        assert!(cli.no_color);
        assert!(cli.show_unsupported);
        assert!(cli.verbose);
    }

    #[test]
    fn parse_config_path() {
        let cli = Cli::parse_from_iter(["ifctl", "-c", "/etc/ifctl.toml", "a", "l"]);
        assert_eq!(
            cli.config.as_deref(),
            Some(std::path::Path::new("/etc/ifctl.toml"))
        );
    }
}

mod aliases {
    use super::*;

    #[test]
    fn resource_aliases() {
        for alias in ["address", "addr", "a"] {
            let cli = Cli::parse_from_iter(["ifctl", alias, "list"]);
            assert!(matches!(cli.command, Command::Address { .. }), "{alias}");
        }
        for alias in ["route", "r"] {
            let cli = Cli::parse_from_iter(["ifctl", alias, "list"]);
            assert!(matches!(cli.command, Command::Route { .. }), "{alias}");
        }
        for alias in ["tunnel", "tun", "t"] {
            let cli = Cli::parse_from_iter(["ifctl", alias, "list"]);
            assert!(matches!(cli.command, Command::Tunnel { .. }), "{alias}");
        }
    }

    #[test]
    fn action_aliases() {
        let list = Cli::parse_from_iter(["ifctl", "tun", "l"]);
        assert!(matches!(
            list.command,
            Command::Tunnel {
                action: ActionCommand::List
            }
        ));

        let add = Cli::parse_from_iter(["ifctl", "tun", "a", "name=tun0"]);
        assert!(matches!(
            add.command,
            Command::Tunnel {
                action: ActionCommand::Add { .. }
            }
        ));

        for alias in ["delete", "del", "d"] {
            let cli = Cli::parse_from_iter(["ifctl", "tun", alias, "name=tun0"]);
            assert!(
                matches!(
                    cli.command,
                    Command::Tunnel {
                        action: ActionCommand::Delete { .. }
                    }
                ),
                "{alias}"
            );
        }
    }
}

mod init_command {
    use super::*;

    #[test]
    fn parse_init_command() {
        let cli = Cli::parse_from_iter(["ifctl", "init"]);

        assert!(cli.is_init());
        if let Command::Init { output } = cli.command {
            assert_eq!(output.to_str(), Some("ifctl.toml"));
        }
    }

    #[test]
    fn parse_init_with_custom_output() {
        let cli = Cli::parse_from_iter(["ifctl", "init", "--output", "custom.toml"]);

        if let Command::Init { output } = cli.command {
            assert_eq!(output.to_str(), Some("custom.toml"));
        } else {
            panic!("Expected Init command");
        }
    }

    #[test]
    fn resource_command_is_not_init() {
        let cli = Cli::parse_from_iter(["ifctl", "route", "list"]);
        assert!(!cli.is_init());
    }
}

mod errors {
    use clap::Parser;

    use super::*;

    #[test]
    fn missing_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["ifctl"]).is_err());
    }

    #[test]
    fn unknown_family_is_rejected() {
        assert!(Cli::try_parse_from(["ifctl", "--family", "ipx", "r", "l"]).is_err());
    }
}
