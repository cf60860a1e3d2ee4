//! Routing-socket dump decoding.
//!
//! A dump is a packed stream of variable-length routing messages. Each
//! message starts with a header whose first four bytes are the total
//! message length (`u16`, native order), a protocol version and a message
//! type. The header is followed by socket-address slots that are decoded
//! with [`decode`](super::decode).
//!
//! Parsing never fails. A header with a foreign version, a zero or short
//! length, or a length running past the buffer end terminates the stream
//! and the messages decoded so far are returned.

use serde::Serialize;
use tracing::{debug, warn};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use super::{AddressFamily, DecodedAddress, SOCKADDR_LEN, decode};

/// The prefix shared by every routing message header.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
struct MessagePrefix {
    msglen: u16,
    version: u8,
    _msg_type: u8,
}

/// Geometry of routing messages on a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingLayout {
    /// Size of the fixed message header (`sizeof(struct rt_msghdr)`).
    pub header_len: usize,
    /// Expected protocol version (`RTM_VERSION`).
    pub version: u8,
    /// Bytes per socket-address slot.
    pub stride: usize,
}

impl RoutingLayout {
    /// Creates a layout with the generic `sockaddr` slot stride.
    #[must_use]
    pub const fn new(header_len: usize, version: u8) -> Self {
        Self {
            header_len,
            version,
            stride: SOCKADDR_LEN,
        }
    }

    /// The layout of the running kernel.
    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly",
    ))]
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn native() -> Self {
        Self::new(
            std::mem::size_of::<libc::rt_msghdr>(),
            libc::RTM_VERSION as u8,
        )
    }

    /// Number of address slots carried by a message of `msglen` bytes.
    #[must_use]
    pub const fn slot_count(&self, msglen: usize) -> usize {
        if self.stride == 0 {
            return 0;
        }
        msglen.saturating_sub(self.header_len) / self.stride
    }
}

/// One decoded routing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteMessage {
    /// Family the dump was requested for.
    pub family: AddressFamily,
    /// Every socket-address slot, unsupported ones included.
    pub entries: Vec<DecodedAddress>,
}

impl RouteMessage {
    /// Creates a message.
    #[must_use]
    pub const fn new(family: AddressFamily, entries: Vec<DecodedAddress>) -> Self {
        Self { family, entries }
    }

    /// Entries of a supported family.
    pub fn supported(&self) -> impl Iterator<Item = &DecodedAddress> {
        self.entries.iter().filter(|e| e.is_supported())
    }
}

/// Cursor over the messages of a dump buffer.
///
/// Yields one byte slice per well-formed message, exactly `msglen` bytes
/// long, and stops at the first malformed header.
#[derive(Debug)]
pub struct MessageCursor<'a> {
    buffer: &'a [u8],
    offset: usize,
    layout: RoutingLayout,
    finished: bool,
}

impl<'a> MessageCursor<'a> {
    /// Creates a cursor at the start of `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8], layout: RoutingLayout) -> Self {
        Self {
            buffer,
            offset: 0,
            layout,
            finished: false,
        }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    fn stop(&mut self) -> Option<&'a [u8]> {
        self.finished = true;
        None
    }
}

impl<'a> Iterator for MessageCursor<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let remaining = self.buffer.get(self.offset..).unwrap_or_default();
        if remaining.len() < self.layout.header_len {
            if !remaining.is_empty() {
                debug!(trailing = remaining.len(), "Ignoring bytes shorter than a header");
            }
            return self.stop();
        }

        let Ok((prefix, _)) = MessagePrefix::read_from_prefix(remaining) else {
            return self.stop();
        };

        if prefix.version != self.layout.version {
            debug!(
                version = prefix.version,
                expected = self.layout.version,
                "Foreign message version, ending dump"
            );
            return self.stop();
        }

        let msglen = usize::from(prefix.msglen);
        if msglen == 0 || msglen < self.layout.header_len || msglen > remaining.len() {
            warn!(
                msglen,
                remaining = remaining.len(),
                offset = self.offset,
                "Routing message length out of bounds, returning partial dump"
            );
            return self.stop();
        }

        self.offset += msglen;
        Some(&remaining[..msglen])
    }
}

/// Decodes a single message slice produced by [`MessageCursor`].
#[must_use]
pub fn decode_message(
    message: &[u8],
    family: AddressFamily,
    layout: RoutingLayout,
) -> RouteMessage {
    let slots = layout.slot_count(message.len());
    let entries = (0..slots)
        .map(|slot| {
            let start = layout.header_len + slot * layout.stride;
            message.get(start..).map_or_else(DecodedAddress::unsupported, decode)
        })
        .collect();

    RouteMessage::new(family, entries)
}

/// Parses a whole dump buffer.
#[must_use]
pub fn parse_dump(buffer: &[u8], family: AddressFamily, layout: RoutingLayout) -> Vec<RouteMessage> {
    let mut cursor = MessageCursor::new(buffer, layout);
    let messages: Vec<_> = cursor
        .by_ref()
        .map(|message| decode_message(message, family, layout))
        .collect();

    debug!(
        %family,
        messages = messages.len(),
        consumed = cursor.offset(),
        total = buffer.len(),
        "Parsed routing dump"
    );
    messages
}
