//! Primitives shared by every Unix backend.

use std::ffi::{CStr, CString};
use std::io;
use std::marker::PhantomData;
use std::os::fd::{FromRawFd, OwnedFd};
use std::ptr;

use crate::network::{InterfaceRecord, NetError};

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = libc::IFNAMSIZ;

/// Owned head of the kernel's interface-address list.
///
/// The list is released with `freeifaddrs` when the guard drops, on every
/// exit path.
pub struct IfAddrs {
    head: *mut libc::ifaddrs,
}

impl IfAddrs {
    /// Acquires the interface-address list.
    pub fn acquire() -> Result<Self, NetError> {
        let mut head: *mut libc::ifaddrs = ptr::null_mut();
        // SAFETY: `head` is a valid out-pointer; on success the kernel list
        // is owned by the returned guard.
        let ret = unsafe { libc::getifaddrs(&raw mut head) };
        if ret != 0 {
            return Err(NetError::last_os_error("getifaddrs"));
        }
        Ok(Self { head })
    }

    /// Walks the list once, copying each node out.
    pub const fn iter(&self) -> IfAddrsIter<'_> {
        IfAddrsIter {
            current: self.head,
            _list: PhantomData,
        }
    }
}

impl Drop for IfAddrs {
    fn drop(&mut self) {
        if !self.head.is_null() {
            // SAFETY: `head` came from a successful getifaddrs and is freed once.
            unsafe { libc::freeifaddrs(self.head) };
        }
    }
}

/// Iterator over the nodes of an [`IfAddrs`] list.
pub struct IfAddrsIter<'a> {
    current: *const libc::ifaddrs,
    _list: PhantomData<&'a IfAddrs>,
}

impl Iterator for IfAddrsIter<'_> {
    type Item = InterfaceRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_null() {
            return None;
        }

        // SAFETY: `current` points into the list owned by the borrowed guard.
        let node = unsafe { &*self.current };
        self.current = node.ifa_next;

        let name = if node.ifa_name.is_null() {
            String::new()
        } else {
            // SAFETY: ifa_name is a NUL-terminated string owned by the list.
            unsafe { CStr::from_ptr(node.ifa_name) }
                .to_string_lossy()
                .into_owned()
        };

        // SAFETY: ifa_addr and ifa_netmask are each null or a sockaddr owned
        // by the list.
        let (address, netmask) =
            unsafe { (sockaddr_bytes(node.ifa_addr), sockaddr_bytes(node.ifa_netmask)) };
        Some(InterfaceRecord::new(name, address).with_netmask(netmask))
    }
}

/// Copies a kernel socket address into an owned byte buffer.
///
/// # Safety
///
/// `sa` must be null or point to a socket address valid for its family's
/// full length.
unsafe fn sockaddr_bytes(sa: *const libc::sockaddr) -> Option<Vec<u8>> {
    if sa.is_null() {
        return None;
    }
    // SAFETY: non-null, valid per the caller's contract.
    let len = unsafe { record_len(&*sa) };
    // SAFETY: the kernel guarantees `len` readable bytes for this family.
    let bytes = unsafe { std::slice::from_raw_parts(sa.cast::<u8>(), len) };
    Some(bytes.to_vec())
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly",
))]
fn record_len(sa: &libc::sockaddr) -> usize {
    // Some link-layer records carry sa_len 0; still expose the header.
    usize::from(sa.sa_len).max(2)
}

#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly",
)))]
fn record_len(sa: &libc::sockaddr) -> usize {
    use crate::network::{SOCKADDR_IN_LEN, SOCKADDR_IN6_LEN, SOCKADDR_LEN};

    match i32::from(sa.sa_family) {
        libc::AF_INET => SOCKADDR_IN_LEN,
        libc::AF_INET6 => SOCKADDR_IN6_LEN,
        _ => SOCKADDR_LEN,
    }
}

/// Copies out every interface-address record.
pub fn interface_records() -> Result<Vec<InterfaceRecord>, NetError> {
    let list = IfAddrs::acquire()?;
    Ok(list.iter().collect())
}

/// Resolves an interface name to its index.
///
/// Fails with `ENODEV` when no such interface exists.
pub fn interface_index(name: &str) -> io::Result<u32> {
    let c_name = CString::new(name).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    // SAFETY: c_name is a valid NUL-terminated string.
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    if index == 0 {
        return Err(io::Error::from_raw_os_error(libc::ENODEV));
    }
    Ok(index)
}

/// Copies an interface name into a fixed `ifr_name` buffer.
pub fn ifr_name(name: &str) -> io::Result<[libc::c_char; IFNAMSIZ]> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || bytes.len() >= IFNAMSIZ || bytes.contains(&0) {
        return Err(io::Error::from_raw_os_error(libc::EINVAL));
    }
    let mut buffer = [0 as libc::c_char; IFNAMSIZ];
    for (slot, &byte) in buffer.iter_mut().zip(bytes) {
        *slot = byte as libc::c_char;
    }
    Ok(buffer)
}

/// Opens a socket owned by the returned descriptor.
pub fn socket(domain: libc::c_int, kind: libc::c_int, protocol: libc::c_int) -> io::Result<OwnedFd> {
    // SAFETY: plain socket(2) call; the result is checked before use.
    let fd = unsafe { libc::socket(domain, kind, protocol) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: fd is a freshly opened descriptor owned by nobody else.
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

/// Converts an `ioctl`/`write` style return value into a result.
pub fn check(ret: libc::c_int) -> io::Result<()> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}
