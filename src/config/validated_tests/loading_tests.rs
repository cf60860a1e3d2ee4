//! Tests for configuration loading and request construction.

use std::fs;
use std::io::Write;

use tempfile::{NamedTempFile, tempdir};

use crate::network::IpVersion;
use crate::resource::{Action, ResourceKind};

use super::super::validated::config_path;
use super::super::write_default_config;
use super::*;

mod request {
    use super::*;

    #[test]
    fn list_has_no_parameters() {
        let config = ValidatedConfig::from_raw(&cli(&["route", "list"]), None).unwrap();

        assert_eq!(config.request.kind, ResourceKind::Route);
        assert_eq!(config.request.action, Action::List);
        assert!(config.request.parameters.is_empty());
    }

    #[test]
    fn mutation_parameters_are_parsed() {
        let cli = cli(&["addr", "del", "Address=10.0.0.2", "interface=en0"]);

        let config = ValidatedConfig::from_raw(&cli, None).unwrap();

        assert_eq!(config.request.kind, ResourceKind::Address);
        assert_eq!(config.request.action, Action::Delete);
        assert_eq!(config.request.parameters.get("address"), Some("10.0.0.2"));
        assert_eq!(config.request.parameters.get("interface"), Some("en0"));
    }

    #[test]
    fn malformed_parameter_is_rejected() {
        let result = ValidatedConfig::from_raw(&cli(&["tun", "add", "tun0"]), None);

        assert!(matches!(result, Err(ConfigError::InvalidParameters(_))));
    }

    #[test]
    fn init_has_no_request() {
        let result = ValidatedConfig::from_raw(&cli(&["init"]), None);

        assert!(matches!(result, Err(ConfigError::NotAResourceCommand("init"))));
    }
}

mod file_loading {
    use super::*;

    #[test]
    fn load_reads_explicit_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[filter]\nfamily = \"ipv6\"").unwrap();
        let path = file.path().to_str().unwrap().to_owned();

        let config = ValidatedConfig::load(&cli(&["--config", path.as_str(), "route", "list"])).unwrap();

        assert_eq!(config.families, IpVersion::V6);
    }

    #[test]
    fn load_reports_missing_explicit_config() {
        let result = ValidatedConfig::load(&cli(&[
            "--config",
            "/nonexistent/ifctl.toml",
            "route",
            "list",
        ]));

        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }

    #[test]
    fn load_reports_parse_errors() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[unknown]").unwrap();
        let path = file.path().to_str().unwrap().to_owned();

        let result = ValidatedConfig::load(&cli(&["--config", path.as_str(), "route", "list"]));

        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }
}

mod path_selection {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let dir = tempdir().unwrap();
        let fallback = dir.path().join("config.toml");
        fs::write(&fallback, "").unwrap();

        let selected = config_path(&cli(&["-c", "/tmp/x.toml", "r", "l"]), Some(fallback));

        assert_eq!(selected, Some("/tmp/x.toml".into()));
    }

    #[test]
    fn existing_fallback_is_used() {
        let dir = tempdir().unwrap();
        let fallback = dir.path().join("config.toml");
        fs::write(&fallback, "").unwrap();

        let selected = config_path(&cli(&["r", "l"]), Some(fallback.clone()));

        assert_eq!(selected, Some(fallback));
    }

    #[test]
    fn missing_fallback_is_ignored() {
        let dir = tempdir().unwrap();
        let fallback = dir.path().join("config.toml");

        assert_eq!(config_path(&cli(&["r", "l"]), Some(fallback)), None);
        assert_eq!(config_path(&cli(&["r", "l"]), None), None);
    }
}

mod init {
    use super::*;

    #[test]
    fn write_default_config_creates_parsable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ifctl.toml");

        write_default_config(&path).unwrap();

        let config = TomlConfig::load(&path).unwrap();
        assert!(config.filter.include.is_empty());
    }

    #[test]
    fn write_default_config_reports_bad_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("ifctl.toml");

        let result = write_default_config(&path);

        assert!(matches!(result, Err(ConfigError::FileWrite { .. })));
    }
}
