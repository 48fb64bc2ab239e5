//! Parsers for the identification line and the binary packets of the transport layer.
//!
//! Both formats are described in [RFC 4253](https://tools.ietf.org/html/rfc4253).

use definitions::parse::{self, ParseError, ParsedValue};

use crate::{
    constants::{MAX_IDENTIFICATION_LINE_LEN, MIN_PADDING_SIZE, PROTOCOL_VERSION},
    errors::FramingError,
    version::VersionInformation,
};

/// The prefix of the identification line.
const IDENTIFICATION_PREFIX: &[u8] = b"SSH-";

/// One line received before the first packet.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Line<'data> {
    /// A line that does not start with `"SSH-"` and is ignored.
    Banner,
    /// The identification line of the other party.
    Identification {
        /// The parsed version information.
        version: VersionInformation,
        /// The whole line without the terminating `"\r\n"`.
        line: &'data [u8],
    },
}

/// Checks that a software version only contains printable ascii characters.
///
/// See [RFC 4253 section 4.2](https://tools.ietf.org/html/rfc4253#section-4.2).
fn software_version(input: &[u8]) -> Result<&str, FramingError> {
    if input.is_empty() || !input.iter().all(|&c| c > 0x20 && c < 0x7f) {
        return Err(FramingError::InvalidSoftwareVersion);
    }

    std::str::from_utf8(input).map_err(|_| FramingError::InvalidSoftwareVersion)
}

/// Splits an identification line into its parts.
///
/// `line` starts with `"SSH-"` and excludes the terminating `"\r\n"`.
fn identification(line: &[u8]) -> Result<VersionInformation, FramingError> {
    let rest = &line[IDENTIFICATION_PREFIX.len()..];

    let (protocol_version, rest) = match rest.iter().position(|&c| c == b'-') {
        Some(end) => (&rest[..end], &rest[end + 1..]),
        None => (rest, &[][..]),
    };

    if protocol_version != PROTOCOL_VERSION.as_bytes() {
        return Err(FramingError::ProtocolVersionNotSupported(
            String::from_utf8_lossy(protocol_version).into_owned(),
        ));
    }

    let (software, comment) = match rest.iter().position(|&c| c == b' ') {
        Some(space) => (&rest[..space], Some(&rest[space + 1..])),
        None => (rest, None),
    };

    let software = software_version(software)?;
    let comment = comment.map(|comment| String::from_utf8_lossy(comment).into_owned());

    Ok(VersionInformation::new_unchecked(
        PROTOCOL_VERSION,
        software.to_string(),
        comment,
    ))
}

/// Parses the next line received before the first packet.
///
/// `Err(None)` means that more input is required.
/// The rest input starts after the `'\n'` that terminates the line.
pub(super) fn line(input: &[u8]) -> Result<ParsedValue<Line>, Option<FramingError>> {
    let line_feed = match input.iter().position(|&c| c == b'\n') {
        Some(pos) => pos,
        None if input.len() >= MAX_IDENTIFICATION_LINE_LEN => {
            return Err(Some(FramingError::LineTooLong))
        }
        None => return Err(None),
    };

    if line_feed >= MAX_IDENTIFICATION_LINE_LEN {
        return Err(Some(FramingError::LineTooLong));
    }

    let rest_input = &input[line_feed + 1..];
    let line = match &input[..line_feed] {
        [line @ .., b'\r'] => line,
        _ => return Err(Some(FramingError::LineInvalid)),
    };

    let value = if line.starts_with(IDENTIFICATION_PREFIX) {
        Line::Identification {
            version: identification(line).map_err(Some)?,
            line,
        }
    } else {
        Line::Banner
    };

    Ok(ParsedValue { value, rest_input })
}

/// A decrypted packet of the SSH transport layer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct ParsedPacket<'data> {
    /// The payload of the packet.
    pub(crate) payload: &'data [u8],
    /// The random padding of the packet.
    pub(crate) padding: &'data [u8],
    /// The whole packet excluding the MAC or tag.
    ///
    /// This includes the length, payload and padding and therefore overlaps with other fields.
    /// It is the input of the MAC computation.
    pub(crate) whole_packet: &'data [u8],
    /// The MAC or tag of the packet.
    pub(crate) mac: &'data [u8],
}

/// Parses the already decrypted packet length.
pub(super) fn packet_length(input: &[u8]) -> parse::Result<u32> {
    parse::uint32(input)
}

/// Parses an already decrypted packet followed by `mac_len` bytes of MAC or tag.
pub(super) fn packet(input: &[u8], mac_len: usize) -> parse::Result<ParsedPacket> {
    let ParsedValue {
        value: packet_length,
        rest_input,
    } = packet_length(input)?;
    let ParsedValue {
        value: padding_length,
        rest_input,
    } = parse::byte(rest_input)?;

    let packet_length = packet_length as usize;
    let padding_length = padding_length as usize;

    if padding_length < MIN_PADDING_SIZE || packet_length < padding_length + 1 {
        return Err(ParseError::Invalid);
    }

    let ParsedValue {
        value: payload,
        rest_input,
    } = parse::bytes(rest_input, packet_length - padding_length - 1)?;
    let ParsedValue {
        value: padding,
        rest_input,
    } = parse::bytes(rest_input, padding_length)?;
    let ParsedValue {
        value: mac,
        rest_input,
    } = parse::bytes(rest_input, mac_len)?;

    Ok(ParsedValue {
        value: ParsedPacket {
            payload,
            padding,
            whole_packet: &input[..4 + packet_length],
            mac,
        },
        rest_input,
    })
}
