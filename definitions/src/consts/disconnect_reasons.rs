//! Reason codes sent in `SSH_MSG_DISCONNECT`.
//!
//! See [RFC 4253 section 11.1](https://tools.ietf.org/html/rfc4253#section-11.1).

/// The host is not allowed to connect.
pub const SSH_DISCONNECT_HOST_NOT_ALLOWED_TO_CONNECT: u32 = 1;
/// The peer violated the protocol.
pub const SSH_DISCONNECT_PROTOCOL_ERROR: u32 = 2;
/// The key exchange failed.
pub const SSH_DISCONNECT_KEY_EXCHANGE_FAILED: u32 = 3;
/// Reserved, formerly `SSH_DISCONNECT_HOST_AUTHENTICATION_FAILED`.
pub const SSH_DISCONNECT_RESERVED: u32 = 4;
/// A packet failed authentication.
pub const SSH_DISCONNECT_MAC_ERROR: u32 = 5;
/// Decompressing a packet failed.
pub const SSH_DISCONNECT_COMPRESSION_ERROR: u32 = 6;
/// The requested service is not available.
pub const SSH_DISCONNECT_SERVICE_NOT_AVAILABLE: u32 = 7;
/// The protocol version of the peer is not supported.
pub const SSH_DISCONNECT_PROTOCOL_VERSION_NOT_SUPPORTED: u32 = 8;
/// The host key could not be verified.
pub const SSH_DISCONNECT_HOST_KEY_NOT_VERIFIABLE: u32 = 9;
/// The connection was lost.
pub const SSH_DISCONNECT_CONNECTION_LOST: u32 = 10;
/// The application closed the connection.
pub const SSH_DISCONNECT_BY_APPLICATION: u32 = 11;
/// There are too many connections.
pub const SSH_DISCONNECT_TOO_MANY_CONNECTIONS: u32 = 12;
/// The user cancelled the authentication.
pub const SSH_DISCONNECT_AUTH_CANCELLED_BY_USER: u32 = 13;
/// No further authentication methods are available.
pub const SSH_DISCONNECT_NO_MORE_AUTH_METHODS_AVAILABLE: u32 = 14;
/// The user name is not valid.
pub const SSH_DISCONNECT_ILLEGAL_USER_NAME: u32 = 15;
