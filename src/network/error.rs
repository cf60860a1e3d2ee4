//! Error taxonomy for kernel queries and mutations.

use std::io;

use thiserror::Error;

/// Error type for network resource operations.
///
/// Describes what went wrong without dictating recovery strategy.
/// Idempotency outcomes (`AlreadyExists`, `NotFound`) are not errors; see
/// [`Outcome`](crate::resource::Outcome). Unsupported address families are
/// not errors either; they decode to
/// [`AddressFamily::Unsupported`](super::AddressFamily::Unsupported).
#[derive(Debug, Error)]
pub enum NetError {
    /// The kernel query or mutation could not be performed.
    #[error("{operation} failed: {source}")]
    ResourceUnavailable {
        /// The kernel operation that failed (e.g. `getifaddrs`, `sysctl`).
        operation: &'static str,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// A buffer required by the operation could not be allocated.
    #[error(
        "Out of memory: {}",
        .requested.map_or_else(
            || "the kernel could not allocate".to_owned(),
            |bytes| format!("could not allocate {bytes} bytes"),
        )
    )]
    OutOfMemory {
        /// Number of bytes that were requested, when the size is known.
        requested: Option<usize>,
    },

    /// Mutation parameters were malformed or incomplete.
    #[error("Invalid argument '{parameter}': {reason}")]
    InvalidArgument {
        /// Name of the offending parameter.
        parameter: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A privileged operation was attempted without the required rights.
    #[error("Permission denied: {operation} requires elevated privileges")]
    PermissionDenied {
        /// The operation that was refused.
        operation: &'static str,
    },
}

impl NetError {
    /// Creates an `InvalidArgument` error.
    #[must_use]
    pub fn invalid(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ResourceUnavailable` error from the last OS error.
    #[must_use]
    pub fn last_os_error(operation: &'static str) -> Self {
        Self::unavailable(operation, io::Error::last_os_error())
    }

    /// Wraps a failed kernel query.
    ///
    /// Queries report every OS failure, permission and allocation included,
    /// as `ResourceUnavailable` with the source kept.
    #[must_use]
    pub const fn unavailable(operation: &'static str, source: io::Error) -> Self {
        Self::ResourceUnavailable { operation, source }
    }

    /// Maps a failed kernel mutation to the taxonomy.
    #[must_use]
    pub fn rejected(operation: &'static str, source: io::Error) -> Self {
        match source.raw_os_error() {
            Some(libc::EPERM | libc::EACCES) => Self::PermissionDenied { operation },
            Some(libc::ENOMEM) => Self::OutOfMemory { requested: None },
            _ => Self::unavailable(operation, source),
        }
    }

    /// Returns true for errors caused by the caller's input.
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Returns true for privilege failures.
    #[must_use]
    pub const fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_failures_are_resource_unavailable() {
        for errno in [libc::EPERM, libc::EACCES, libc::ENOMEM, libc::EBUSY] {
            let error = NetError::unavailable("sysctl", io::Error::from_raw_os_error(errno));
            assert!(
                matches!(error, NetError::ResourceUnavailable { operation: "sysctl", .. }),
                "errno {errno}"
            );
        }
    }

    #[test]
    fn rejected_mutation_maps_privilege_errors() {
        let error = NetError::rejected("ioctl", io::Error::from_raw_os_error(libc::EPERM));
        assert!(error.is_permission_denied());
        let error = NetError::rejected("ioctl", io::Error::from_raw_os_error(libc::EACCES));
        assert!(error.is_permission_denied());
    }

    #[test]
    fn kernel_allocation_failure_has_no_byte_count() {
        let error = NetError::rejected("route add", io::Error::from_raw_os_error(libc::ENOMEM));

        assert!(matches!(error, NetError::OutOfMemory { requested: None }));
        assert_eq!(
            error.to_string(),
            "Out of memory: the kernel could not allocate"
        );
    }

    #[test]
    fn buffer_allocation_failure_reports_size() {
        let error = NetError::OutOfMemory {
            requested: Some(4096),
        };
        assert_eq!(
            error.to_string(),
            "Out of memory: could not allocate 4096 bytes"
        );
    }

    #[test]
    fn other_mutation_errors_keep_source() {
        let error = NetError::rejected("route add", io::Error::from_raw_os_error(libc::EBUSY));

        let NetError::ResourceUnavailable { source, .. } = &error else {
            panic!("expected ResourceUnavailable, got {error:?}");
        };
        assert_eq!(source.raw_os_error(), Some(libc::EBUSY));
    }

    #[test]
    fn invalid_argument_displays_parameter_and_reason() {
        let error = NetError::invalid("prefix", "must be at most 32");
        assert!(error.is_invalid_argument());
        let text = error.to_string();
        assert!(text.contains("prefix"));
        assert!(text.contains("must be at most 32"));
    }

    #[test]
    fn resource_unavailable_displays_operation() {
        let error = NetError::ResourceUnavailable {
            operation: "getifaddrs",
            source: io::Error::other("boom"),
        };
        assert!(error.to_string().contains("getifaddrs"));
    }
}
