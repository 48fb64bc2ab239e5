//! Message numbers of the SSH transport layer and the numbers it needs to route other messages.
//!
//! See [RFC 4250 section 4.1](https://tools.ietf.org/html/rfc4250#section-4.1).

/// Causes immediate termination of the connection.
pub const SSH_MSG_DISCONNECT: u8 = 1;

/// Must be understood and ignored at any time.
pub const SSH_MSG_IGNORE: u8 = 2;

/// The response to an unrecognized message.
pub const SSH_MSG_UNIMPLEMENTED: u8 = 3;

/// Debugging information that may be ignored.
pub const SSH_MSG_DEBUG: u8 = 4;

/// A service request by the client.
pub const SSH_MSG_SERVICE_REQUEST: u8 = 5;

/// The server accepted a service request.
pub const SSH_MSG_SERVICE_ACCEPT: u8 = 6;

/// Starts the algorithm negotiation of a key exchange.
pub const SSH_MSG_KEXINIT: u8 = 20;

/// The key exchange finished and the new keys are used from now on.
pub const SSH_MSG_NEWKEYS: u8 = 21;

/// The client's ephemeral key of an ECDH key exchange.
pub const SSH_MSG_KEX_ECDH_INIT: u8 = 30;

/// The server's reply in an ECDH key exchange.
pub const SSH_MSG_KEX_ECDH_REPLY: u8 = 31;

/// Starts a new user authentication.
pub const SSH_MSG_USERAUTH_REQUEST: u8 = 50;

/// A request that is independent of channels.
pub const SSH_MSG_GLOBAL_REQUEST: u8 = 80;

/// Data for a channel.
pub const SSH_MSG_CHANNEL_DATA: u8 = 94;
