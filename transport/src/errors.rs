//! Defines all the errors that can occur in the transport layer.

pub use definitions::{
    algorithms::{AlgorithmCategory, AlgorithmDirection, KeyExchangeAlgorithmError},
    ParseError,
};

use definitions::consts::disconnect_reasons::*;
use std::{fmt, io, sync::Arc};

/// The reason code sent in or received with a `SSH_MSG_DISCONNECT` message.
///
/// See [RFC 4253 section 11.1](https://tools.ietf.org/html/rfc4253#section-11.1).
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum DisconnectReason {
    /// `SSH_DISCONNECT_HOST_NOT_ALLOWED_TO_CONNECT`
    HostNotAllowedToConnect,
    /// `SSH_DISCONNECT_PROTOCOL_ERROR`
    ProtocolError,
    /// `SSH_DISCONNECT_KEY_EXCHANGE_FAILED`
    KeyExchangeFailed,
    /// `SSH_DISCONNECT_RESERVED`
    Reserved,
    /// `SSH_DISCONNECT_MAC_ERROR`
    MacError,
    /// `SSH_DISCONNECT_COMPRESSION_ERROR`
    CompressionError,
    /// `SSH_DISCONNECT_SERVICE_NOT_AVAILABLE`
    ServiceNotAvailable,
    /// `SSH_DISCONNECT_PROTOCOL_VERSION_NOT_SUPPORTED`
    ProtocolVersionNotSupported,
    /// `SSH_DISCONNECT_HOST_KEY_NOT_VERIFIABLE`
    HostKeyNotVerifiable,
    /// `SSH_DISCONNECT_CONNECTION_LOST`
    ConnectionLost,
    /// `SSH_DISCONNECT_BY_APPLICATION`
    ByApplication,
    /// `SSH_DISCONNECT_TOO_MANY_CONNECTIONS`
    TooManyConnections,
    /// `SSH_DISCONNECT_AUTH_CANCELLED_BY_USER`
    AuthCancelledByUser,
    /// `SSH_DISCONNECT_NO_MORE_AUTH_METHODS_AVAILABLE`
    NoMoreAuthMethodsAvailable,
    /// `SSH_DISCONNECT_ILLEGAL_USER_NAME`
    IllegalUserName,
    /// A reason code that is not assigned by the RFCs.
    Unknown(u32),
}

impl DisconnectReason {
    /// Returns the reason for the given reason code.
    pub fn from_code(code: u32) -> DisconnectReason {
        match code {
            SSH_DISCONNECT_HOST_NOT_ALLOWED_TO_CONNECT => DisconnectReason::HostNotAllowedToConnect,
            SSH_DISCONNECT_PROTOCOL_ERROR => DisconnectReason::ProtocolError,
            SSH_DISCONNECT_KEY_EXCHANGE_FAILED => DisconnectReason::KeyExchangeFailed,
            SSH_DISCONNECT_RESERVED => DisconnectReason::Reserved,
            SSH_DISCONNECT_MAC_ERROR => DisconnectReason::MacError,
            SSH_DISCONNECT_COMPRESSION_ERROR => DisconnectReason::CompressionError,
            SSH_DISCONNECT_SERVICE_NOT_AVAILABLE => DisconnectReason::ServiceNotAvailable,
            SSH_DISCONNECT_PROTOCOL_VERSION_NOT_SUPPORTED => {
                DisconnectReason::ProtocolVersionNotSupported
            }
            SSH_DISCONNECT_HOST_KEY_NOT_VERIFIABLE => DisconnectReason::HostKeyNotVerifiable,
            SSH_DISCONNECT_CONNECTION_LOST => DisconnectReason::ConnectionLost,
            SSH_DISCONNECT_BY_APPLICATION => DisconnectReason::ByApplication,
            SSH_DISCONNECT_TOO_MANY_CONNECTIONS => DisconnectReason::TooManyConnections,
            SSH_DISCONNECT_AUTH_CANCELLED_BY_USER => DisconnectReason::AuthCancelledByUser,
            SSH_DISCONNECT_NO_MORE_AUTH_METHODS_AVAILABLE => {
                DisconnectReason::NoMoreAuthMethodsAvailable
            }
            SSH_DISCONNECT_ILLEGAL_USER_NAME => DisconnectReason::IllegalUserName,
            other => DisconnectReason::Unknown(other),
        }
    }

    /// Returns the reason code sent on the wire.
    pub fn code(self) -> u32 {
        match self {
            DisconnectReason::HostNotAllowedToConnect => SSH_DISCONNECT_HOST_NOT_ALLOWED_TO_CONNECT,
            DisconnectReason::ProtocolError => SSH_DISCONNECT_PROTOCOL_ERROR,
            DisconnectReason::KeyExchangeFailed => SSH_DISCONNECT_KEY_EXCHANGE_FAILED,
            DisconnectReason::Reserved => SSH_DISCONNECT_RESERVED,
            DisconnectReason::MacError => SSH_DISCONNECT_MAC_ERROR,
            DisconnectReason::CompressionError => SSH_DISCONNECT_COMPRESSION_ERROR,
            DisconnectReason::ServiceNotAvailable => SSH_DISCONNECT_SERVICE_NOT_AVAILABLE,
            DisconnectReason::ProtocolVersionNotSupported => {
                SSH_DISCONNECT_PROTOCOL_VERSION_NOT_SUPPORTED
            }
            DisconnectReason::HostKeyNotVerifiable => SSH_DISCONNECT_HOST_KEY_NOT_VERIFIABLE,
            DisconnectReason::ConnectionLost => SSH_DISCONNECT_CONNECTION_LOST,
            DisconnectReason::ByApplication => SSH_DISCONNECT_BY_APPLICATION,
            DisconnectReason::TooManyConnections => SSH_DISCONNECT_TOO_MANY_CONNECTIONS,
            DisconnectReason::AuthCancelledByUser => SSH_DISCONNECT_AUTH_CANCELLED_BY_USER,
            DisconnectReason::NoMoreAuthMethodsAvailable => {
                SSH_DISCONNECT_NO_MORE_AUTH_METHODS_AVAILABLE
            }
            DisconnectReason::IllegalUserName => SSH_DISCONNECT_ILLEGAL_USER_NAME,
            DisconnectReason::Unknown(code) => code,
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DisconnectReason::HostNotAllowedToConnect => write!(f, "host not allowed to connect"),
            DisconnectReason::ProtocolError => write!(f, "protocol error"),
            DisconnectReason::KeyExchangeFailed => write!(f, "key exchange failed"),
            DisconnectReason::Reserved => write!(f, "reserved"),
            DisconnectReason::MacError => write!(f, "mac error"),
            DisconnectReason::CompressionError => write!(f, "compression error"),
            DisconnectReason::ServiceNotAvailable => write!(f, "service not available"),
            DisconnectReason::ProtocolVersionNotSupported => {
                write!(f, "protocol version not supported")
            }
            DisconnectReason::HostKeyNotVerifiable => write!(f, "host key not verifiable"),
            DisconnectReason::ConnectionLost => write!(f, "connection lost"),
            DisconnectReason::ByApplication => write!(f, "disconnected by application"),
            DisconnectReason::TooManyConnections => write!(f, "too many connections"),
            DisconnectReason::AuthCancelledByUser => write!(f, "authentication cancelled by user"),
            DisconnectReason::NoMoreAuthMethodsAvailable => {
                write!(f, "no more authentication methods available")
            }
            DisconnectReason::IllegalUserName => write!(f, "illegal user name"),
            DisconnectReason::Unknown(code) => write!(f, "unknown reason {}", code),
        }
    }
}

/// The phase of the connection in which a timeout occurred.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TimeoutKind {
    /// The connection was not established in time.
    Connect,
    /// A key exchange did not finish in time.
    KeyExchange,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TimeoutKind::Connect => write!(f, "connection setup"),
            TimeoutKind::KeyExchange => write!(f, "key exchange"),
        }
    }
}

/// The byte stream could not be split into identification lines or packets.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum FramingError {
    /// A line sent before or as the identification line was too long.
    #[error("an identification line was too long")]
    LineTooLong,
    /// A line sent before or as the identification line was not terminated by `"\r\n"`.
    #[error("an identification line was malformed")]
    LineInvalid,
    /// The software version in the identification line contained illegal characters.
    #[error("the identification line contained an invalid software version")]
    InvalidSoftwareVersion,
    /// The other party uses a protocol version other than 2.0.
    #[error("the protocol version {0:?} is not supported")]
    ProtocolVersionNotSupported(String),
    /// The packet length of an incoming packet exceeded the configured maximum.
    #[error("a packet of length {0} exceeded the maximum packet size")]
    PacketTooLarge(usize),
}

/// No common set of algorithms could be agreed on.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NegotiationError {
    /// The `SSH_MSG_KEXINIT` message of the other party was malformed.
    #[error("the key exchange init message was malformed")]
    InvalidKexInit,
    /// The reserved field of the `SSH_MSG_KEXINIT` message was not zero.
    #[error("the reserved field of the key exchange init message was not zero")]
    ReservedNotZero,
    /// No key exchange algorithm with a suitable host key algorithm was found.
    #[error("no common key exchange algorithm found")]
    NoKexAlgorithmMatch,
    /// No host key algorithm with the capabilities the key exchange needs was found.
    #[error("no common host key algorithm found")]
    NoHostKeyAlgorithmMatch,
    /// No encryption algorithm was found for the given direction.
    #[error("no common encryption algorithm found for {0}")]
    NoEncryptionAlgorithmMatch(AlgorithmDirection),
    /// No MAC algorithm was found for the given direction.
    #[error("no common mac algorithm found for {0}")]
    NoMacAlgorithmMatch(AlgorithmDirection),
    /// The other party does not allow uncompressed packets.
    #[error("the other party does not support uncompressed packets")]
    CompressionUnsupported,
    /// The key exchange algorithm failed.
    #[error("the key exchange failed: {0}")]
    KeyExchange(#[from] KeyExchangeAlgorithmError),
}

/// The other party sent something that is not allowed at this point.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum ProtocolViolation {
    /// A packet without a message number was received.
    #[error("a packet without payload was received")]
    EmptyPayload,
    /// `SSH_MSG_NEWKEYS` arrived or was sent before a key exchange staged new algorithms.
    #[error("new keys were requested, but no key exchange staged them")]
    UnexpectedNewKeys,
    /// `SSH_MSG_KEXINIT` arrived while the previous key exchange was still running.
    #[error("a key exchange was started while another one was running")]
    UnexpectedKexInit,
    /// A message arrived that is not allowed in the current state.
    #[error("unexpected message {0}")]
    UnexpectedPacket(u8),
    /// The other party did not implement a message this implementation requires.
    #[error("the other party did not implement packet {0}")]
    Unimplemented(u32),
    /// A transport layer message had an invalid format.
    #[error("message {0} had an invalid format")]
    InvalidMessage(u8),
}

/// An error that ended the connection or prevented an operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The incoming byte stream could not be split into lines or packets.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    /// An incoming packet failed authentication or had an invalid padding.
    ///
    /// Both cases are reported identically.
    #[error("mac error")]
    Crypto,
    /// The algorithm negotiation or the key exchange failed.
    #[error("negotiation failed: {0}")]
    Negotiation(#[from] NegotiationError),
    /// The other party violated the protocol.
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),
    /// The other party ended the connection with `SSH_MSG_DISCONNECT`.
    #[error("disconnected by the other party ({reason}): {description}")]
    PeerDisconnected {
        /// The reason the other party gave.
        reason: DisconnectReason,
        /// The description the other party gave.
        description: String,
    },
    /// An operation did not finish in time.
    #[error("timeout during {0}")]
    Timeout(TimeoutKind),
    /// The underlying stream failed.
    #[error("io error: {0}")]
    Io(Arc<io::Error>),
    /// The underlying stream ended without a disconnect message.
    #[error("the connection was closed unexpectedly")]
    UnexpectedClose,
    /// The connection was killed locally.
    #[error("the connection was killed")]
    Killed,
    /// An internal invariant was violated by an operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
    /// The connection is not established or already closed.
    #[error("the connection is not established")]
    NotConnected,
    /// The application tried to send a message number reserved for the transport layer.
    #[error("message number {0} is reserved for the transport layer")]
    ReservedMessageNumber(u8),
    /// The application tried to send a packet with an empty or too large payload.
    #[error("a payload of length {0} cannot be sent")]
    InvalidPayloadLength(usize),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> TransportError {
        TransportError::Io(Arc::new(err))
    }
}

impl From<KeyExchangeAlgorithmError> for TransportError {
    fn from(err: KeyExchangeAlgorithmError) -> TransportError {
        TransportError::Negotiation(NegotiationError::KeyExchange(err))
    }
}

impl TransportError {
    /// Returns the reason to send to the other party when this error ends the connection.
    ///
    /// `None` means that no disconnect message is sent.
    pub fn disconnect_reason(&self) -> Option<DisconnectReason> {
        match self {
            TransportError::Framing(FramingError::ProtocolVersionNotSupported(_)) => {
                Some(DisconnectReason::ProtocolVersionNotSupported)
            }
            TransportError::Framing(_) => Some(DisconnectReason::ProtocolError),
            TransportError::Crypto => Some(DisconnectReason::MacError),
            TransportError::Negotiation(_) => Some(DisconnectReason::KeyExchangeFailed),
            TransportError::ProtocolViolation(_) => Some(DisconnectReason::ProtocolError),
            TransportError::Timeout(TimeoutKind::KeyExchange) => {
                Some(DisconnectReason::KeyExchangeFailed)
            }
            TransportError::InvalidOperation(_) => Some(DisconnectReason::ByApplication),
            TransportError::PeerDisconnected { .. }
            | TransportError::Timeout(TimeoutKind::Connect)
            | TransportError::Io(_)
            | TransportError::UnexpectedClose
            | TransportError::Killed
            | TransportError::NotConnected
            | TransportError::ReservedMessageNumber(_)
            | TransportError::InvalidPayloadLength(_) => None,
        }
    }
}

/// The configuration of the transport layer was invalid.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum ConfigError {
    /// The software version was illegal.
    #[error("invalid software version: {0}")]
    SoftwareVersion(#[from] IllegalVersionError),
    /// The comment contained characters that are not allowed in the identification line.
    #[error("the comment can only contain printable ascii characters and spaces")]
    InvalidComment,
    /// The identification line would exceed 255 bytes.
    #[error("the identification line is too long")]
    IdentificationTooLong,
    /// The given algorithm category had no algorithms in it.
    #[error("no {0:?} algorithm available")]
    EmptyAlgorithmCategory(AlgorithmCategory),
    /// The maximum packet size is smaller than every implementation must support.
    #[error("the maximum packet size must be at least {0}")]
    MaxPacketSizeTooSmall(usize),
}

/// The software version was illegal according to the specification.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum IllegalVersionError {
    /// The proposed version was empty.
    #[error("the version cannot be empty")]
    Empty,
    /// The proposed version contained a non-ascii character.
    #[error("the version can only contain ascii characters")]
    NonAscii(usize),
    /// The proposed version contained a whitespace character.
    #[error("the version cannot contain whitespace characters")]
    Whitespace(usize),
    /// The proposed version contained a non printable character.
    #[error("the version can only contain printable characters")]
    NonPrintable(usize),
    /// The proposed version contained the `'-'` character.
    #[error("the version cannot contain the '-' character")]
    Minus(usize),
}

/// Contains the reason why an algorithm name is invalid.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
pub enum InvalidNameError {
    /// The name was empty.
    #[error("algorithm name was empty")]
    EmptyName,
    /// The name was too long.
    #[error("algorithm name was too long")]
    TooLong,
    /// The name contained more than one `'@'` character.
    #[error("algorithm name contained too many '@' symbols")]
    TooManyAtSymbols,
    /// The name contained a comma.
    #[error("algorithm name contained the ',' character")]
    CommaUsed,
    /// The name contained the given non ascii character.
    #[error("algorithm name contained a non ascii character: {0:?}")]
    NonAscii(char),
    /// The name contained the given whitespace character.
    #[error("algorithm name contained a whitespace character")]
    Whitespace(char),
    /// The name contained the given non printable character.
    #[error("algorithm name contained a non printable character")]
    NonPrintable(char),
    /// The domain in the algorithm name is not a valid domain.
    #[error("algorithm name contained an invalid domain")]
    InvalidDomain,
}
