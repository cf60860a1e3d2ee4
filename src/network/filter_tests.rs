//! Tests for the interface filtering module.

use std::net::IpAddr;

use super::filter::*;
use super::{DecodedAddress, InterfaceAddressSet, TunnelInfo, TunnelKind};

// ============================================================================
// Test Fixtures
// ============================================================================

fn address_set() -> InterfaceAddressSet {
    let mut set = InterfaceAddressSet::new();
    for (name, addr) in [
        ("lo0", "127.0.0.1"),
        ("en0", "192.168.1.2"),
        ("utun3", "10.8.0.2"),
        ("en1", "192.168.2.2"),
    ] {
        set.insert(name, DecodedAddress::from(addr.parse::<IpAddr>().unwrap()));
    }
    set
}

fn regex(pattern: &str) -> NameRegexFilter {
    NameRegexFilter::new(pattern).unwrap()
}

// ============================================================================
// NameRegexFilter Tests
// ============================================================================

mod name_regex_filter {
    use super::*;

    #[test]
    fn matches_prefix_pattern() {
        let filter = regex("^en");
        assert!(filter.matches("en0"));
        assert!(!filter.matches("lo0"));
    }

    #[test]
    fn unanchored_pattern_matches_anywhere() {
        let filter = regex("tun");
        assert!(filter.matches("utun3"));
        assert!(filter.matches("tun0"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(NameRegexFilter::new("[unclosed").is_err());
    }

    #[test]
    fn pattern_accessor_returns_source() {
        assert_eq!(regex("^en").pattern().as_str(), "^en");
    }
}

// ============================================================================
// FilterChain Tests
// ============================================================================

mod filter_chain {
    use super::*;

    #[test]
    fn empty_chain_matches_all() {
        let chain = FilterChain::new();
        assert!(chain.is_empty());
        assert!(chain.matches("anything"));
    }

    #[test]
    fn includes_use_or_semantics() {
        let chain = FilterChain::new().include(regex("^en")).include(regex("^lo"));

        assert!(chain.matches("en0"));
        assert!(chain.matches("lo0"));
        assert!(!chain.matches("utun3"));
        assert_eq!(chain.include_count(), 2);
    }

    #[test]
    fn excludes_win_over_includes() {
        let chain = FilterChain::new()
            .include(regex("^en"))
            .exclude(regex("^en1$"));

        assert!(chain.matches("en0"));
        assert!(!chain.matches("en1"));
        assert_eq!(chain.exclude_count(), 1);
    }

    #[test]
    fn exclude_only_passes_everything_else() {
        let chain = FilterChain::new().exclude(regex("^utun"));

        assert!(chain.matches("en0"));
        assert!(!chain.matches("utun0"));
    }

    #[test]
    fn applies_to_address_sets_preserving_order() {
        let mut set = address_set();
        let chain = FilterChain::new().exclude(regex("^(lo|utun)"));

        chain.apply_to_addresses(&mut set);

        assert_eq!(set.names().collect::<Vec<_>>(), ["en0", "en1"]);
        assert!(set.get("lo0").is_none());
        assert_eq!(set.get("en1").map(<[DecodedAddress]>::len), Some(1));
    }

    #[test]
    fn applies_to_tunnels() {
        let mut tunnels = vec![
            TunnelInfo::new("tun0", TunnelKind::Tun),
            TunnelInfo::new("gif0", TunnelKind::Gif),
        ];
        let chain = FilterChain::new().include(regex("^gif"));

        chain.apply_to_tunnels(&mut tunnels);

        assert_eq!(tunnels, vec![TunnelInfo::new("gif0", TunnelKind::Gif)]);
    }

    #[test]
    fn boxed_and_borrowed_filters_delegate() {
        let boxed: Box<dyn InterfaceFilter> = Box::new(regex("^en"));
        assert!(boxed.matches("en0"));

        let inner = regex("^lo");
        let borrowed = &inner;
        assert!(InterfaceFilter::matches(&borrowed, "lo0"));
    }

    #[test]
    fn debug_shows_counts() {
        let chain = FilterChain::new().include(regex("a")).exclude(regex("b"));
        let debug = format!("{chain:?}");
        assert!(debug.contains("include_count: 1"));
        assert!(debug.contains("exclude_count: 1"));
    }
}
