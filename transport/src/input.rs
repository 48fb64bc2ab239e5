//! Handles the input side of the SSH connection.

use definitions::{ParseError, ParsedValue};
use std::cmp::{max, min};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::{
    algorithms::{DirectionAlgorithms, EncryptionContext},
    constants::{MIN_PACKET_LEN, PACKET_LEN_SIZE, READ_SIZE},
    errors::{FramingError, ProtocolViolation, TransportError},
    version::VersionInformation,
};

use self::parse::Line;
pub(crate) use self::parse::ParsedPacket;

mod parse;

/// Make some sanity checks to verify that the internal state is valid.
macro_rules! assert_valid_state {
    ($self:ident) => {
        debug_assert!($self.parsed_until <= $self.decrypted_until);
        debug_assert!($self.decrypted_until <= $self.initialized_until);
        debug_assert!($self.initialized_until <= $self.data.len());
    };
}

/// A packet received from the other party.
#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) struct Packet {
    /// The sequence number the packet was received with.
    pub(crate) sequence_number: u32,
    /// The payload of the packet, starting with the message number.
    pub(crate) payload: Vec<u8>,
    /// The number of padding bytes the packet had.
    pub(crate) padding_length: u8,
}

impl Packet {
    /// Returns the message number of the packet.
    pub(crate) fn message_number(&self) -> u8 {
        self.payload[0]
    }
}

/// Handles input transformations and buffering.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct InputBuffer {
    /// The underlying buffer.
    data: Vec<u8>,
    /// The index of the first byte that has not yet been parsed.
    parsed_until: usize,
    /// The index of the first byte that has not yet been decrypted.
    decrypted_until: usize,
    /// The index of the first byte that has not yet been initialized.
    initialized_until: usize,
    /// The number of packets that have arrived (modulo 32 bits).
    sequence_number: u32,
}

impl InputBuffer {
    /// Creates a new empty input buffer.
    pub(crate) fn new() -> InputBuffer {
        InputBuffer {
            data: Vec::new(),
            parsed_until: 0,
            decrypted_until: 0,
            initialized_until: 0,
            sequence_number: 0,
        }
    }

    /// Returns the sequence number of the next packet.
    pub(crate) fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Reserves at least `size` bytes for input and returns access to them.
    fn reserve(&mut self, size: usize) -> &mut [u8] {
        assert_valid_state!(self);

        let additional_capacity = self.data.len() - self.initialized_until;
        let space_needed = size.saturating_sub(additional_capacity);

        self.data.resize(self.data.len() + space_needed, 0);

        assert_valid_state!(self);

        &mut self.data[self.initialized_until..]
    }

    /// Appends already received data to the buffer.
    pub(crate) fn extend_from_slice(&mut self, input: &[u8]) {
        let buf = self.reserve(input.len());
        buf[..input.len()].copy_from_slice(input);

        self.initialized_until += input.len();
    }

    /// Reads more data from the source into the buffer.
    ///
    /// The end of the input is reported as [`TransportError::UnexpectedClose`].
    pub(crate) async fn read_more_data<I: AsyncRead + Unpin + ?Sized>(
        &mut self,
        input: &mut I,
    ) -> Result<usize, TransportError> {
        assert_valid_state!(self);

        let buf = self.reserve(READ_SIZE);

        let size = input.read(buf).await?;

        if size == 0 {
            return Err(TransportError::UnexpectedClose);
        }

        self.initialized_until += size;

        assert_valid_state!(self);

        Ok(size)
    }

    /// Parses the identification line of the other party.
    ///
    /// Lines before it that don't start with `"SSH-"` are skipped.
    /// Returns the version and the line without `"\r\n"`, or `Ok(None)` if more input is needed.
    /// This should not be called again, after the first `Ok(Some(_))` was returned.
    pub(crate) fn read_identification(
        &mut self,
    ) -> Result<Option<(VersionInformation, Vec<u8>)>, TransportError> {
        assert_valid_state!(self);

        loop {
            let ParsedValue { value, rest_input } =
                match parse::line(&self.data[self.parsed_until..self.initialized_until]) {
                    Ok(parsed) => parsed,
                    Err(None) => {
                        self.remove_old_data();
                        return Ok(None);
                    }
                    Err(Some(err)) => return Err(err.into()),
                };

            let result = match value {
                Line::Banner => {
                    trace!("skipping banner line");
                    None
                }
                Line::Identification { version, line } => Some((version, line.to_vec())),
            };

            self.parsed_until = self.initialized_until - rest_input.len();
            self.decrypted_until = self.parsed_until;

            if result.is_some() {
                self.remove_old_data();
                assert_valid_state!(self);

                return Ok(result);
            }
        }
    }

    /// Advances the decryption of the current packet to the index `to`.
    ///
    /// If there isn't enough data available the data is decrypted as far as possible.
    fn decrypt(
        &mut self,
        to: usize,
        sequence_number: u32,
        algorithms: &mut DirectionAlgorithms,
    ) -> Result<(), TransportError> {
        assert_valid_state!(self);

        let end = min(to, self.initialized_until);

        match &mut algorithms.encryption {
            Some(encryption) => {
                let processed = self.decrypted_until - self.parsed_until;
                let context = EncryptionContext::new(
                    sequence_number,
                    &mut self.data[self.parsed_until..end],
                    processed,
                );

                self.decrypted_until += encryption
                    .decrypt_packet(context)
                    .map_err(|_| TransportError::Crypto)?;
            }
            None => self.decrypted_until = max(self.decrypted_until, end),
        }

        assert_valid_state!(self);

        Ok(())
    }

    /// Parses the length of the current packet, once it is decrypted.
    fn parse_packet_length(&self) -> Option<usize> {
        match parse::packet_length(&self.data[self.parsed_until..self.decrypted_until]) {
            Ok(ParsedValue { value: length, .. }) => Some(length as usize),
            Err(_) => None,
        }
    }

    /// Reads the next packet from the buffer.
    ///
    /// Returns `Ok(None)` without consuming anything if the buffer does not contain all of the
    /// next packet.
    /// Once the packet is complete, its sequence number is consumed even if it turns out to be
    /// invalid.
    pub(crate) fn read_packet(
        &mut self,
        algorithms: &mut DirectionAlgorithms,
        max_packet_size: usize,
    ) -> Result<Option<Packet>, TransportError> {
        self.remove_old_data();

        let bytes_to_decrypt_length = algorithms.bytes_to_decrypt_length();

        let packet_length = match self.parse_packet_length() {
            Some(len) => len,
            None => {
                if self.initialized_until - self.parsed_until < bytes_to_decrypt_length {
                    return Ok(None);
                }

                self.decrypt(
                    self.parsed_until + bytes_to_decrypt_length,
                    self.sequence_number,
                    algorithms,
                )?;

                self.parse_packet_length().ok_or(TransportError::Crypto)?
            }
        };

        if packet_length > max_packet_size {
            return Err(FramingError::PacketTooLarge(packet_length).into());
        }
        if packet_length < max(MIN_PACKET_LEN, bytes_to_decrypt_length - PACKET_LEN_SIZE) {
            return Err(TransportError::Crypto);
        }

        let tag_size = algorithms.tag_size().unwrap_or(0);
        let packet_end = self.parsed_until + PACKET_LEN_SIZE + packet_length;
        let total_end = packet_end + algorithms.trailer_size();

        if self.initialized_until < total_end {
            return Ok(None);
        }

        let sequence_number = self.sequence_number;
        self.sequence_number = self.sequence_number.wrapping_add(1);

        if self.decrypted_until < packet_end + tag_size {
            self.decrypt(packet_end + tag_size, sequence_number, algorithms)?;
        }
        if self.decrypted_until < packet_end {
            return Err(TransportError::Crypto);
        }

        let packet = match parse::packet(
            &self.data[self.parsed_until..total_end],
            algorithms.trailer_size(),
        ) {
            Ok(ParsedValue { value, .. }) => value,
            Err(ParseError::Incomplete) | Err(ParseError::Invalid) => {
                return Err(TransportError::Crypto)
            }
        };

        verify_packet(&packet, sequence_number, algorithms)?;

        if packet.payload.is_empty() {
            return Err(ProtocolViolation::EmptyPayload.into());
        }

        let packet = Packet {
            sequence_number,
            payload: packet.payload.to_vec(),
            padding_length: packet.padding.len() as u8,
        };

        self.parsed_until = total_end;
        self.decrypted_until = total_end;

        assert_valid_state!(self);

        trace!(
            sequence_number,
            message_number = packet.message_number(),
            len = packet.payload.len(),
            "received packet"
        );

        Ok(Some(packet))
    }

    /// Returns the number of bytes the packet that was last read took on the wire.
    pub(crate) fn consumed_bytes(&self) -> usize {
        self.parsed_until
    }

    /// Shrinks the input to the smallest possible size.
    fn remove_old_data(&mut self) {
        assert_valid_state!(self);

        self.data.drain(..self.parsed_until);

        self.decrypted_until -= self.parsed_until;
        self.initialized_until -= self.parsed_until;
        self.data.truncate(max(self.initialized_until, READ_SIZE));
        self.parsed_until = 0;

        assert_valid_state!(self);
    }
}

/// Verifies that a decrypted packet is authentic and correctly padded.
///
/// Both failures are reported identically.
fn verify_packet(
    packet: &ParsedPacket,
    sequence_number: u32,
    algorithms: &mut DirectionAlgorithms,
) -> Result<(), TransportError> {
    if let Some(mac) = &mut algorithms.mac {
        mac.check_packet(sequence_number, packet.whole_packet, packet.mac)
            .map_err(|_| TransportError::Crypto)?;
    }

    // The length field is not part of the aligned data for ciphers with a tag.
    let unaligned_prefix = if algorithms.tag_size().is_some() {
        PACKET_LEN_SIZE
    } else {
        0
    };
    if (packet.whole_packet.len() - unaligned_prefix) % algorithms.alignment() != 0 {
        return Err(TransportError::Crypto);
    }

    Ok(())
}
