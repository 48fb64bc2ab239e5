//! Defines constants used by the transport layer.

use std::{mem::size_of, time::Duration};

pub use definitions::consts::PROTOCOL_VERSION;

/// The size, in bytes, of the packet length field of a packet.
pub(crate) const PACKET_LEN_SIZE: usize = size_of::<u32>();

/// The size, in bytes, of the padding length field of a packet.
pub(crate) const PADDING_LEN_SIZE: usize = size_of::<u8>();

/// The minimum padding size of a packet.
pub(crate) const MIN_PADDING_SIZE: usize = definitions::consts::MIN_PADDING_LENGTH;

/// The maximum padding size of a packet.
pub(crate) const MAX_PADDING_SIZE: usize = 0xff;

/// The minimum size that the packet length must be a multiple of.
pub(crate) const MIN_PACKET_LEN_ALIGN: usize = definitions::consts::MIN_PACKET_ALIGNMENT;

/// The smallest value of the packet length field that can hold a valid packet.
///
/// A packet consists of at least the padding length byte, one payload byte and four bytes of
/// padding, aligned to eight bytes including the length field.
pub(crate) const MIN_PACKET_LEN: usize = 2 * MIN_PACKET_LEN_ALIGN - PACKET_LEN_SIZE;

/// The maximum length of an identification line, including the terminating `"\r\n"`.
pub(crate) const MAX_IDENTIFICATION_LINE_LEN: usize =
    definitions::consts::MAX_IDENTIFICATION_LINE_LENGTH;

/// The maximum number of extra padding blocks.
///
/// Note that this refers to "padding blocks", which consist of a number of
/// bytes equal to the cipher block size or 8, whichever is higher.
pub const MAX_EXTRA_PADDING_BLOCKS: usize = MAX_PADDING_SIZE / MIN_PACKET_LEN_ALIGN;

/// The largest payload the application may send.
///
/// Every implementation must accept payloads of this size, larger ones may be rejected.
pub const MAX_PAYLOAD_SIZE: usize = definitions::consts::REQUIRED_PAYLOAD_SIZE;

/// The default maximum size of an incoming packet.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 256 * 1024;

/// The default number of bytes transferred in one direction after which new keys are exchanged.
pub const DEFAULT_REKEY_AFTER_BYTES: u64 = 1 << 30;

/// The default time after which new keys are exchanged.
pub const DEFAULT_REKEY_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// The default time a single key exchange may take.
pub const DEFAULT_KEX_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// The default depth of the outbound queue and the inbound application channel.
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

/// The largest depth accepted for the outbound queue and the inbound application channel.
pub const MAX_QUEUE_DEPTH: usize = 64;

/// The time the teardown waits for a disconnect message to be written.
pub(crate) const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// The size of the buffer used for a single read from the stream.
pub(crate) const READ_SIZE: usize = 0x1000;

static_assertions::const_assert!(MIN_PACKET_LEN == 12);
static_assertions::const_assert!(DEFAULT_MAX_PACKET_SIZE >= definitions::consts::REQUIRED_PACKET_SIZE);
static_assertions::const_assert!(DEFAULT_QUEUE_DEPTH <= MAX_QUEUE_DEPTH);
