//! Interface-name filtering for listings.
//!
//! # Design
//!
//! - **Pure Matcher**: [`NameRegexFilter`] only answers "does this
//!   interface name match?" without include/exclude semantics.
//! - **Filter Chain**: [`FilterChain`] combines matchers:
//!   - Exclude filters: AND logic (must pass ALL excludes)
//!   - Include filters: OR logic (pass ANY include, empty = match all)
//!
//! Filters are applied to listings only. Enumeration itself stays
//! policy-free, and mutations always see the full interface set.

use regex::Regex;

use super::{InterfaceAddressSet, TunnelInfo};

/// Trait for filtering interfaces by name.
pub trait InterfaceFilter {
    /// Returns `true` if the interface should be included.
    fn matches(&self, name: &str) -> bool;
}

// ============================================================================
// NameRegexFilter - Pure matcher by name pattern
// ============================================================================

/// Matches interfaces whose name matches a regex.
///
/// # Examples
///
/// ```
/// use ifctl::network::filter::{NameRegexFilter, InterfaceFilter};
///
/// let filter = NameRegexFilter::new(r"^en").unwrap();
///
/// assert!(filter.matches("en0"));
/// assert!(!filter.matches("lo0"));
/// ```
#[derive(Debug, Clone)]
pub struct NameRegexFilter {
    pattern: Regex,
}

impl NameRegexFilter {
    /// Creates a name filter with the given regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex pattern is invalid.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// Returns a reference to the regex pattern.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Regex is not a const type
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

impl InterfaceFilter for NameRegexFilter {
    fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

// ============================================================================
// FilterChain - Include OR / Exclude AND semantics
// ============================================================================

/// Filter chain with include/exclude semantics.
///
/// Evaluation order:
/// 1. **Exclude filters (AND)**: Any match → reject.
/// 2. **Include filters (OR)**: Any match → accept. Empty includes = match all.
///
/// # Examples
///
/// ```
/// use ifctl::network::filter::{FilterChain, NameRegexFilter, InterfaceFilter};
///
/// let chain = FilterChain::new()
///     .exclude(NameRegexFilter::new(r"^utun").unwrap())
///     .include(NameRegexFilter::new(r"^(en|utun)").unwrap());
///
/// assert!(chain.matches("en0"));
/// assert!(!chain.matches("utun3")); // Excluded
/// assert!(!chain.matches("lo0"));   // Not included
/// ```
#[derive(Default)]
pub struct FilterChain {
    includes: Vec<Box<dyn InterfaceFilter>>,
    excludes: Vec<Box<dyn InterfaceFilter>>,
}

impl FilterChain {
    /// Creates an empty filter chain (matches all interfaces).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an include filter (OR semantics).
    #[must_use]
    pub fn include<F: InterfaceFilter + 'static>(mut self, filter: F) -> Self {
        self.includes.push(Box::new(filter));
        self
    }

    /// Adds an exclude filter (AND semantics - must not match ANY).
    #[must_use]
    pub fn exclude<F: InterfaceFilter + 'static>(mut self, filter: F) -> Self {
        self.excludes.push(Box::new(filter));
        self
    }

    /// Returns the number of include filters.
    #[must_use]
    pub fn include_count(&self) -> usize {
        self.includes.len()
    }

    /// Returns the number of exclude filters.
    #[must_use]
    pub fn exclude_count(&self) -> usize {
        self.excludes.len()
    }

    /// Returns true if no filters are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    /// Drops the interfaces of `set` this chain rejects.
    pub fn apply_to_addresses(&self, set: &mut InterfaceAddressSet) {
        if !self.is_empty() {
            set.retain(|interface| self.matches(&interface.name));
        }
    }

    /// Drops the tunnels this chain rejects.
    pub fn apply_to_tunnels(&self, tunnels: &mut Vec<TunnelInfo>) {
        if !self.is_empty() {
            tunnels.retain(|tunnel| self.matches(&tunnel.name));
        }
    }
}

impl InterfaceFilter for FilterChain {
    fn matches(&self, name: &str) -> bool {
        // 1. Any exclude match → reject
        if self.excludes.iter().any(|f| f.matches(name)) {
            return false;
        }

        // 2. No includes = all pass; otherwise any include match → accept
        self.includes.is_empty() || self.includes.iter().any(|f| f.matches(name))
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("include_count", &self.includes.len())
            .field("exclude_count", &self.excludes.len())
            .finish()
    }
}

// Blanket implementation: any &T where T: InterfaceFilter also implements InterfaceFilter
impl<T: InterfaceFilter + ?Sized> InterfaceFilter for &T {
    fn matches(&self, name: &str) -> bool {
        (*self).matches(name)
    }
}

// Box<dyn InterfaceFilter> implements InterfaceFilter
impl InterfaceFilter for Box<dyn InterfaceFilter> {
    fn matches(&self, name: &str) -> bool {
        self.as_ref().matches(name)
    }
}
