//! The generic transport layer messages.
//!
//! See [RFC 4253 section 11](https://tools.ietf.org/html/rfc4253#section-11).

use definitions::{
    consts::message_numbers::{
        SSH_MSG_DEBUG, SSH_MSG_DISCONNECT, SSH_MSG_NEWKEYS, SSH_MSG_UNIMPLEMENTED,
    },
    parse::{self, Parse, ParsedValue},
    write, Compose,
};
use std::io::{self, Write};

use crate::errors::{DisconnectReason, ProtocolViolation, TransportError};

/// A `SSH_MSG_DISCONNECT` message.
#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) struct Disconnect<'a> {
    /// The reason for the disconnect.
    pub(crate) reason: DisconnectReason,
    /// A human readable description of the reason.
    pub(crate) description: &'a str,
    /// The language tag of the description.
    pub(crate) language: &'a str,
}

impl<'input> Parse<'input> for Disconnect<'input> {
    fn parse(input: &'input [u8]) -> parse::Result<'input, Self> {
        let ParsedValue { rest_input, .. } = parse::message_number(input, SSH_MSG_DISCONNECT)?;
        let ParsedValue {
            value: code,
            rest_input,
        } = parse::uint32(rest_input)?;
        let ParsedValue {
            value: description,
            rest_input,
        } = parse::utf8_string(rest_input)?;
        let ParsedValue {
            value: language,
            rest_input,
        } = parse::utf8_string(rest_input)?;

        Ok(ParsedValue {
            value: Disconnect {
                reason: DisconnectReason::from_code(code),
                description,
                language,
            },
            rest_input,
        })
    }
}

impl Compose for Disconnect<'_> {
    fn compose(&self, output: &mut impl Write) -> io::Result<()> {
        write::byte(SSH_MSG_DISCONNECT, output)?;
        write::uint32(self.reason.code(), output)?;
        write::string(self.description.as_bytes(), output)?;
        write::string(self.language.as_bytes(), output)
    }
}

/// A `SSH_MSG_DEBUG` message.
#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) struct DebugMessage<'a> {
    /// Whether the message should be shown to the user.
    pub(crate) always_display: bool,
    /// The debug message.
    pub(crate) message: &'a str,
    /// The language tag of the message.
    pub(crate) language: &'a str,
}

impl<'input> Parse<'input> for DebugMessage<'input> {
    fn parse(input: &'input [u8]) -> parse::Result<'input, Self> {
        let ParsedValue { rest_input, .. } = parse::message_number(input, SSH_MSG_DEBUG)?;
        let ParsedValue {
            value: always_display,
            rest_input,
        } = parse::boolean(rest_input)?;
        let ParsedValue {
            value: message,
            rest_input,
        } = parse::utf8_string(rest_input)?;
        let ParsedValue {
            value: language,
            rest_input,
        } = parse::utf8_string(rest_input)?;

        Ok(ParsedValue {
            value: DebugMessage {
                always_display,
                message,
                language,
            },
            rest_input,
        })
    }
}

/// A `SSH_MSG_UNIMPLEMENTED` message.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) struct Unimplemented {
    /// The sequence number of the rejected packet.
    pub(crate) sequence_number: u32,
}

impl<'input> Parse<'input> for Unimplemented {
    fn parse(input: &'input [u8]) -> parse::Result<'input, Self> {
        let ParsedValue { rest_input, .. } =
            parse::message_number(input, SSH_MSG_UNIMPLEMENTED)?;

        parse::uint32(rest_input).map(|parsed| {
            parsed.map(|sequence_number| Unimplemented { sequence_number })
        })
    }
}

/// Parses a transport layer message of the other party.
///
/// Trailing data is ignored, as the RFCs allow for extensions of these messages.
pub(crate) fn parse_message<'input, T: Parse<'input>>(
    payload: &'input [u8],
) -> Result<T, TransportError> {
    T::parse(payload)
        .map(|parsed| parsed.value)
        .map_err(|_| ProtocolViolation::InvalidMessage(payload[0]).into())
}

/// Returns the payload of a `SSH_MSG_DISCONNECT` message.
pub(crate) fn disconnect(reason: DisconnectReason, description: &str) -> Vec<u8> {
    Disconnect {
        reason,
        description,
        language: "",
    }
    .compose_to_vec()
}

/// Returns the payload of a `SSH_MSG_NEWKEYS` message.
pub(crate) fn new_keys() -> Vec<u8> {
    vec![SSH_MSG_NEWKEYS]
}

/// Returns `true` if `payload` is a valid `SSH_MSG_NEWKEYS` message.
pub(crate) fn is_new_keys(payload: &[u8]) -> bool {
    payload == [SSH_MSG_NEWKEYS]
}
