//! Handles aggregating of data into packets.
//!
//! This is the counter part to the input module.

use definitions::write;
use rand::{CryptoRng, RngCore};
use std::{
    cmp::min,
    convert::TryFrom,
    io::{self, ErrorKind},
};

use crate::{
    algorithms::{DirectionAlgorithms, EncryptionContext},
    constants::{MAX_PADDING_SIZE, MIN_PADDING_SIZE, PACKET_LEN_SIZE, PADDING_LEN_SIZE},
    padding_length::PaddingLengthDistribution,
    version::VersionInformation,
};

/// Collects outgoing data until it is written to the network.
#[derive(Debug)]
pub(crate) struct WriterOutputStream {
    /// The data that was not yet written to the network.
    data: Vec<u8>,
    /// The number of packets that have been sent (modulo 32 bits).
    sequence_number: u32,
    /// Chooses the number of extra padding blocks.
    padding_distribution: PaddingLengthDistribution,
}

impl WriterOutputStream {
    /// Creates a new writer output stream.
    pub(crate) fn new(padding_distribution: PaddingLengthDistribution) -> WriterOutputStream {
        WriterOutputStream {
            data: Vec::new(),
            sequence_number: 0,
            padding_distribution,
        }
    }

    /// Returns the sequence number of the next packet.
    pub(crate) fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Generates a valid padding length for the given payload.
    ///
    /// `aligned_prefix` is the number of bytes before the padding length field that count
    /// towards the alignment.
    fn generate_padding_len<R: RngCore + ?Sized>(
        &self,
        payload_len: usize,
        align: usize,
        aligned_prefix: usize,
        rng: &mut R,
    ) -> usize {
        let unaligned = aligned_prefix + PADDING_LEN_SIZE + payload_len;

        let mut padding_len = align - unaligned % align;
        if padding_len < MIN_PADDING_SIZE {
            padding_len += align;
        }

        let max_extra_blocks = (MAX_PADDING_SIZE - padding_len) / align;
        let extra_blocks = self.padding_distribution.extra_blocks(rng);

        padding_len + min(extra_blocks, max_extra_blocks) * align
    }

    /// Writes a packet with the given payload to the output stream.
    ///
    /// The padding is filled with random bytes, the MAC is computed over the plain packet and
    /// the packet is encrypted in place.
    pub(crate) fn write_packet<R: RngCore + CryptoRng + ?Sized>(
        &mut self,
        payload: &[u8],
        algorithms: &mut DirectionAlgorithms,
        rng: &mut R,
    ) -> io::Result<()> {
        let align = algorithms.alignment();
        let tag_size = algorithms.tag_size();
        let mac_size = algorithms.mac_size();

        // Ciphers with a tag leave the length field out of the aligned data.
        let aligned_prefix = if tag_size.is_some() { 0 } else { PACKET_LEN_SIZE };

        let padding_len = self.generate_padding_len(payload.len(), align, aligned_prefix, rng);
        let packet_len = u32::try_from(PADDING_LEN_SIZE + payload.len() + padding_len)
            .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "packet too large"))?;

        let packet_start = self.data.len();
        let packet_end = packet_start + PACKET_LEN_SIZE + packet_len as usize;
        let encrypted_end = packet_end + tag_size.unwrap_or(0);

        self.data.reserve(encrypted_end + mac_size - packet_start);

        write::uint32(packet_len, &mut self.data)?;
        write::byte(padding_len as u8, &mut self.data)?;
        self.data.extend_from_slice(payload);

        let padding_start = self.data.len();
        self.data.resize(padding_start + padding_len, 0);
        rng.fill_bytes(&mut self.data[padding_start..]);

        self.data.resize(encrypted_end + mac_size, 0);

        if let Some(mac) = &mut algorithms.mac {
            let (packet, mac_data) =
                self.data[packet_start..].split_at_mut(encrypted_end - packet_start);
            mac.sign_packet(
                self.sequence_number,
                &packet[..packet_end - packet_start],
                mac_data,
            );
        }

        if let Some(encryption) = &mut algorithms.encryption {
            encryption.encrypt_packet(EncryptionContext::new(
                self.sequence_number,
                &mut self.data[packet_start..encrypted_end],
                0,
            ));
        }

        self.sequence_number = self.sequence_number.wrapping_add(1);

        Ok(())
    }

    /// Writes the identification line for the given version to the output stream.
    pub(crate) fn write_identification(&mut self, version: &VersionInformation) {
        self.data
            .extend_from_slice(version.identification_line().as_bytes());
        self.data.extend_from_slice(b"\r\n");
    }

    /// Returns all the data that has been written so far and was not yet removed.
    ///
    /// This function is meant to be used to output the data to the network.
    /// Afterwards the amount of data written to the network should be removed with `remove_to`.
    pub(crate) fn written_data(&self) -> &[u8] {
        &self.data
    }

    /// Removes data up to the given index.
    pub(crate) fn remove_to(&mut self, index: usize) {
        self.data.drain(..index);
    }
}
