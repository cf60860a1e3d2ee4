//! `key=value` request parameters and the value parsers shared by the
//! resource kinds.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use crate::network::{AddressFamily, NetError, prefix_len_of_mask};

/// Resource-specific parameters, keyed by lowercase name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    values: BTreeMap<String, String>,
}

impl Parameters {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key=value` arguments.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidArgument`] for arguments without `=`,
    /// empty keys or values, and repeated keys.
    pub fn parse<I, S>(args: I) -> Result<Self, NetError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parameters = Self::new();
        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg
                .split_once('=')
                .ok_or_else(|| NetError::invalid(arg, "expected key=value"))?;
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                return Err(NetError::invalid(arg, "key and value must be non-empty"));
            }
            if parameters.values.contains_key(&key) {
                return Err(NetError::invalid(key, "given more than once"));
            }
            parameters.values.insert(key, value.to_owned());
        }
        Ok(parameters)
    }

    /// Adds or replaces a parameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Looks up a parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Looks up a parameter that must be present.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidArgument`] naming `key` when absent.
    pub fn require(&self, key: &str) -> Result<&str, NetError> {
        self.get(key)
            .ok_or_else(|| NetError::invalid(key, "required parameter is missing"))
    }

    /// Rejects any key not in `allowed`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidArgument`] naming the first unknown key.
    pub fn expect_only(&self, allowed: &[&str]) -> Result<(), NetError> {
        match self.values.keys().find(|key| !allowed.contains(&key.as_str())) {
            Some(key) if allowed.is_empty() => {
                Err(NetError::invalid(key.as_str(), "this operation takes no parameters"))
            }
            Some(key) => Err(NetError::invalid(
                key.as_str(),
                format!("unknown parameter, expected one of: {}", allowed.join(", ")),
            )),
            None => Ok(()),
        }
    }

    /// Returns true when no parameters were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Value parsers
// ============================================================================

/// Parses an IP address.
pub fn parse_ip(parameter: &str, text: &str) -> Result<IpAddr, NetError> {
    text.parse()
        .map_err(|_| NetError::invalid(parameter, format!("'{text}' is not an IP address")))
}

/// Parses `addr` or `addr/prefix`.
pub fn parse_cidr(parameter: &str, text: &str) -> Result<(IpAddr, Option<u8>), NetError> {
    match text.split_once('/') {
        Some((addr, prefix)) => {
            let addr = parse_ip(parameter, addr)?;
            let prefix = parse_prefix(parameter, prefix, AddressFamily::of(&addr))?;
            Ok((addr, Some(prefix)))
        }
        None => Ok((parse_ip(parameter, text)?, None)),
    }
}

/// Parses a prefix length, or a contiguous netmask of `family`.
pub fn parse_prefix(parameter: &str, text: &str, family: AddressFamily) -> Result<u8, NetError> {
    let max = family.max_prefix_len();
    if let Ok(prefix) = text.parse::<u8>() {
        if prefix > max {
            return Err(NetError::invalid(
                parameter,
                format!("prefix length {prefix} exceeds {max}"),
            ));
        }
        return Ok(prefix);
    }

    let mask = parse_ip(parameter, text)
        .map_err(|_| NetError::invalid(parameter, format!("'{text}' is not a prefix length or netmask")))?;
    if AddressFamily::of(&mask) != family {
        return Err(NetError::invalid(parameter, format!("netmask is not {family}")));
    }
    prefix_len_of_mask(mask)
        .ok_or_else(|| NetError::invalid(parameter, format!("'{text}' is not a contiguous netmask")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_pairs() {
        let params = Parameters::parse(["Address=10.0.0.2/24", "interface=en0"]).unwrap();
        assert_eq!(params.get("address"), Some("10.0.0.2/24"));
        assert_eq!(params.require("interface").unwrap(), "en0");
        assert_eq!(params.to_string(), "address=10.0.0.2/24 interface=en0");
    }

    #[test]
    fn rejects_malformed_arguments() {
        assert!(Parameters::parse(["address"]).is_err());
        assert!(Parameters::parse(["=x"]).is_err());
        assert!(Parameters::parse(["a="]).is_err());
        assert!(Parameters::parse(["a=1", "A=2"]).is_err());
    }

    #[test]
    fn missing_required_parameter_names_key() {
        let error = Parameters::new().require("gateway").unwrap_err();
        assert!(error.to_string().contains("gateway"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let params = Parameters::new().with("colour", "red");
        assert!(params.expect_only(&["name", "kind"]).is_err());
        assert!(params.expect_only(&[]).is_err());
        assert!(Parameters::new().expect_only(&[]).is_ok());
    }

    #[test]
    fn cidr_with_and_without_prefix() {
        assert_eq!(
            parse_cidr("address", "10.0.0.2/24").unwrap(),
            ("10.0.0.2".parse().unwrap(), Some(24))
        );
        assert_eq!(
            parse_cidr("address", "fe80::1").unwrap(),
            ("fe80::1".parse().unwrap(), None)
        );
        assert!(parse_cidr("address", "10.0.0.2/33").is_err());
        assert!(parse_cidr("address", "not-an-ip").is_err());
    }

    #[test]
    fn prefix_accepts_masks_of_matching_family() {
        assert_eq!(parse_prefix("mask", "255.255.0.0", AddressFamily::Ipv4).unwrap(), 16);
        assert_eq!(parse_prefix("mask", "64", AddressFamily::Ipv6).unwrap(), 64);
        assert!(parse_prefix("mask", "255.0.255.0", AddressFamily::Ipv4).is_err());
        assert!(parse_prefix("mask", "ffff::", AddressFamily::Ipv4).is_err());
    }
}
