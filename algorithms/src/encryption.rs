//! Packet ciphers.
//!
//! `chacha20-poly1305@openssh.com` authenticates the packets itself, the `aesXXX-ctr` ciphers
//! need a MAC algorithm next to them.

use definitions::algorithms::{
    internal, EncryptionAlgorithm, EncryptionContext, PlainEncryptionAlgorithm,
};

#[cfg(feature = "chacha20-poly1305_at_openssh_com")]
#[doc(hidden)]
mod chacha20_poly1305;

#[cfg(feature = "chacha20-poly1305_at_openssh_com")]
#[doc(inline)]
pub use self::chacha20_poly1305::*;

#[cfg(any(feature = "aes128-ctr", feature = "aes192-ctr", feature = "aes256-ctr"))]
#[doc(hidden)]
mod aes_ctr;

#[cfg(any(feature = "aes128-ctr", feature = "aes192-ctr", feature = "aes256-ctr"))]
#[doc(inline)]
pub use self::aes_ctr::*;

/// Sends packets in the clear.
///
/// Both directions use it from the version exchange until the first `SSH_MSG_NEWKEYS`.
/// It is never offered during negotiation.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
#[non_exhaustive]
pub struct None {}

impl None {
    /// Creates the `none` cipher.
    pub fn new() -> None {
        None {}
    }
}

impl EncryptionAlgorithm for None {
    type AlgorithmType = PlainEncryptionAlgorithm;

    const NAME: &'static str = "none";
    const CIPHER_BLOCK_SIZE: usize = 8;
    const KEY_SIZE: usize = 0;
    const IV_SIZE: usize = 0;
    const BYTES_TO_DECRYPT_LENGTH: usize = 4;

    fn load_key(&mut self, _iv: &[u8], _key: &[u8]) {}

    fn unload_key(&mut self) {}

    fn encrypt_packet(&mut self, _context: EncryptionContext) {}

    fn decrypt_packet(&mut self, mut context: EncryptionContext) -> usize {
        context.unprocessed_part().len()
    }
}

/// Registers the enabled ciphers with `add`, most preferred first.
///
/// The authenticated cipher comes first, then the counter mode ciphers from the largest key down.
pub fn add_algorithms<F>(mut add: F)
where
    F: FnMut(internal::EncryptionAlgorithmEntry),
{
    #[cfg(feature = "chacha20-poly1305_at_openssh_com")]
    add(ChaCha20Poly1305::new().into());
    #[cfg(feature = "aes256-ctr")]
    add(Aes256Ctr::new().into());
    #[cfg(feature = "aes192-ctr")]
    add(Aes192Ctr::new().into());
    #[cfg(feature = "aes128-ctr")]
    add(Aes128Ctr::new().into());
}
