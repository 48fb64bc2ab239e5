//! Constants assigned by the SSH RFCs.

pub use message_type::MessageType;

pub mod disconnect_reasons;
pub mod message_numbers;

mod message_type;

/// The protocol version this implementation speaks.
pub const PROTOCOL_VERSION: &str = "2.0";

/// The maximum length of the identification line, including the terminating `"\r\n"`.
pub const MAX_IDENTIFICATION_LINE_LENGTH: usize = 255;

/// The smallest uncompressed payload every implementation must be able to handle.
///
/// See [RFC 4253 section 6.1](https://tools.ietf.org/html/rfc4253#section-6.1).
pub const REQUIRED_PAYLOAD_SIZE: usize = 32768;

/// The smallest total packet size every implementation must be able to handle.
pub const REQUIRED_PACKET_SIZE: usize = 35000;

/// The minimum number of random padding bytes in a packet.
pub const MIN_PADDING_LENGTH: usize = 4;

/// The minimum alignment of a packet, even if the cipher has a smaller block size.
pub const MIN_PACKET_ALIGNMENT: usize = 8;
