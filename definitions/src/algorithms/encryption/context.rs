//! Defines the context used for encryption and decryption of packets.

/// The view of one packet that an encryption algorithm works on.
///
/// The packet is split into a processed front and an unprocessed back.
/// During encryption the whole packet is unprocessed.
/// During decryption the processed part is the already decrypted plaintext.
#[derive(Debug)]
pub struct EncryptionContext<'packet> {
    packet_sequence_number: u32,
    data: &'packet mut [u8],
    processed_until: usize,
}

impl<'packet> EncryptionContext<'packet> {
    /// Creates a new `EncryptionContext` from the given data.
    ///
    /// # Panics
    /// Panics if `processed_until > data.len()`.
    pub fn new(
        packet_sequence_number: u32,
        data: &'packet mut [u8],
        processed_until: usize,
    ) -> EncryptionContext<'packet> {
        assert!(processed_until <= data.len());

        EncryptionContext {
            packet_sequence_number,
            data,
            processed_until,
        }
    }

    /// Returns the sequence number of the packet that is being processed.
    pub fn packet_sequence_number(&self) -> u32 {
        self.packet_sequence_number
    }

    /// Returns the part of the packet that was already processed.
    pub fn processed_part(&self) -> &[u8] {
        &self.data[..self.processed_until]
    }

    /// Returns the part of the packet that has yet to be processed.
    pub fn unprocessed_part(&mut self) -> &mut [u8] {
        &mut self.data[self.processed_until..]
    }

    /// Returns all packet data in the context.
    pub fn all_data(&self) -> &[u8] {
        self.data
    }

    /// Returns mutable access to all packet data in the context.
    ///
    /// **The processed part must be restored before the algorithm returns.**
    ///
    /// Algorithms that authenticate the ciphertext, such as `chacha20-poly1305@openssh.com`, need
    /// the ciphertext of the already decrypted length field and may re-encrypt it temporarily.
    pub fn all_data_mut(&mut self) -> &mut [u8] {
        self.data
    }

    /// Marks that an additional `num_bytes` have been processed.
    ///
    /// # Panics
    /// Panics if more bytes than available are marked.
    pub fn mark_processed(&mut self, num_bytes: usize) {
        assert!(self.processed_until + num_bytes <= self.data.len());

        self.processed_until += num_bytes;
    }
}
