//! Provides an implementation of the "chacha20-poly1305@openssh.com" encryption algorithm.
//!
//! The algorithm is described in
//! [PROTOCOL.chacha20poly1305](https://cvsweb.openbsd.org/src/usr.bin/ssh/PROTOCOL.chacha20poly1305).

use chacha20::{
    cipher::{KeyIvInit as _, StreamCipher as _, StreamCipherSeek as _},
    ChaCha20,
};
use definitions::algorithms::{
    EncryptionAlgorithm, EncryptionContext, InvalidMacError, MacComputingEncryptionAlgorithm,
};
use poly1305::{universal_hash::KeyInit as _, Poly1305};
use std::fmt;
use subtle::ConstantTimeEq as _;
use zeroize::Zeroizing;

const LENGTH_SIZE: usize = 4;
const TAG_SIZE: usize = 16;
const HALF_KEY_SIZE: usize = 32;

/// The two keys derived from the 64 bytes of key material.
struct Keys {
    /// Encrypts the payload and derives the Poly1305 key.
    main: Zeroizing<[u8; HALF_KEY_SIZE]>,
    /// Encrypts the packet length.
    header: Zeroizing<[u8; HALF_KEY_SIZE]>,
}

impl Keys {
    fn cipher(key: &[u8; HALF_KEY_SIZE], sequence_number: u32) -> ChaCha20 {
        // The 64 bit big endian sequence number is the nonce, the upper half of it is always 0.
        let mut nonce = [0u8; 12];
        nonce[8..].copy_from_slice(&sequence_number.to_be_bytes());

        ChaCha20::new(key.into(), (&nonce).into())
    }

    fn apply_length_keystream(&self, sequence_number: u32, length: &mut [u8]) {
        Self::cipher(&self.header, sequence_number).apply_keystream(length);
    }

    /// Returns the payload cipher positioned at the first payload block and the Poly1305 instance.
    fn payload_cipher(&self, sequence_number: u32) -> (ChaCha20, Poly1305) {
        let mut cipher = Self::cipher(&self.main, sequence_number);

        let mut poly_key = Zeroizing::new([0u8; 32]);
        cipher.apply_keystream(&mut poly_key[..]);
        cipher.seek(64u32);

        let poly = Poly1305::new((&*poly_key).into());

        (cipher, poly)
    }
}

/// Implements the `chacha20-poly1305@openssh.com` encryption algorithm.
///
/// The existence of this struct is controlled by the `chacha20-poly1305_at_openssh_com` feature.
#[derive(Default)]
pub struct ChaCha20Poly1305 {
    keys: Option<Keys>,
}

impl ChaCha20Poly1305 {
    /// Creates a new `chacha20-poly1305@openssh.com` encryption algorithm.
    pub fn new() -> Self {
        ChaCha20Poly1305 { keys: None }
    }

    fn keys(&self) -> &Keys {
        self.keys.as_ref().expect("`load_key` was called before")
    }
}

impl fmt::Debug for ChaCha20Poly1305 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ChaCha20Poly1305").finish_non_exhaustive()
    }
}

impl EncryptionAlgorithm for ChaCha20Poly1305 {
    type AlgorithmType = MacComputingEncryptionAlgorithm<TAG_SIZE>;

    const NAME: &'static str = "chacha20-poly1305@openssh.com";
    const CIPHER_BLOCK_SIZE: usize = 8;
    const KEY_SIZE: usize = 2 * HALF_KEY_SIZE;
    const IV_SIZE: usize = 0;
    const BYTES_TO_DECRYPT_LENGTH: usize = LENGTH_SIZE;

    fn load_key(&mut self, _iv: &[u8], key: &[u8]) {
        assert_eq!(key.len(), Self::KEY_SIZE);

        let mut main = Zeroizing::new([0; HALF_KEY_SIZE]);
        let mut header = Zeroizing::new([0; HALF_KEY_SIZE]);
        main.copy_from_slice(&key[..HALF_KEY_SIZE]);
        header.copy_from_slice(&key[HALF_KEY_SIZE..]);

        let old_keys = self.keys.replace(Keys { main, header });
        debug_assert!(old_keys.is_none());
    }

    fn unload_key(&mut self) {
        self.keys.take();
    }

    fn encrypt_packet(&mut self, mut context: EncryptionContext) {
        let sequence_number = context.packet_sequence_number();
        let keys = self.keys();

        let data = context.unprocessed_part();
        let (packet, tag) = data.split_at_mut(data.len() - TAG_SIZE);

        keys.apply_length_keystream(sequence_number, &mut packet[..LENGTH_SIZE]);

        let (mut cipher, poly) = keys.payload_cipher(sequence_number);
        cipher.apply_keystream(&mut packet[LENGTH_SIZE..]);

        tag.copy_from_slice(&poly.compute_unpadded(packet));
    }

    fn decrypt_packet(&mut self, mut context: EncryptionContext) -> Result<usize, InvalidMacError> {
        let sequence_number = context.packet_sequence_number();
        let keys = self.keys();

        let mut newly_processed = 0;

        if context.processed_part().is_empty() {
            if context.all_data().len() < LENGTH_SIZE {
                return Ok(0);
            }

            let length = &mut context.unprocessed_part()[..LENGTH_SIZE];
            keys.apply_length_keystream(sequence_number, length);
            context.mark_processed(LENGTH_SIZE);
            newly_processed += LENGTH_SIZE;
        }

        let mut length = [0; LENGTH_SIZE];
        length.copy_from_slice(&context.processed_part()[..LENGTH_SIZE]);
        let packet_end = LENGTH_SIZE + u32::from_be_bytes(length) as usize;

        if context.all_data().len() < packet_end + TAG_SIZE {
            return Ok(newly_processed);
        }

        // The tag covers the encrypted length, so it is recomputed from the plaintext.
        let mut encrypted_length = length;
        keys.apply_length_keystream(sequence_number, &mut encrypted_length);

        let (mut cipher, poly) = keys.payload_cipher(sequence_number);

        let data = context.unprocessed_part();
        let (payload, tag) = data.split_at_mut(packet_end - LENGTH_SIZE);

        let mut authenticated = Vec::with_capacity(packet_end);
        authenticated.extend_from_slice(&encrypted_length);
        authenticated.extend_from_slice(payload);
        let expected_tag = poly.compute_unpadded(&authenticated);

        if !bool::from(expected_tag.ct_eq(&tag[..TAG_SIZE])) {
            return Err(InvalidMacError::MacMismatch);
        }

        cipher.apply_keystream(payload);

        Ok(newly_processed + payload.len() + TAG_SIZE)
    }
}
