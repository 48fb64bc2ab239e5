//! Defines the `EncryptionAlgorithm` trait.

use super::InvalidMacError;
use std::{
    fmt,
    ops::{Deref, DerefMut},
};

mod context;

#[allow(unreachable_pub)]
pub use context::EncryptionContext;

mod private {
    #[allow(unreachable_pub)]
    pub trait Sealed {}
}

/// Differentiates ciphers that authenticate the packet themselves from those that don't.
///
/// This trait is sealed, only [`PlainEncryptionAlgorithm`] and
/// [`MacComputingEncryptionAlgorithm`] implement it.
pub trait EncryptionAlgorithmType: private::Sealed {
    /// The size of the authentication tag the cipher appends, if it computes one.
    ///
    /// Ciphers with a tag replace the negotiated MAC algorithm.
    const TAG_SIZE: Option<usize>;

    /// What `decrypt_packet` returns for this kind of cipher.
    type DecryptionResult;

    /// Converts the decryption result to the universal result type.
    fn convert_result(val: Self::DecryptionResult) -> Result<usize, InvalidMacError>;
}

/// The algorithm type of a cipher that relies on a separate MAC algorithm.
#[derive(Debug)]
pub struct PlainEncryptionAlgorithm;

impl private::Sealed for PlainEncryptionAlgorithm {}
impl EncryptionAlgorithmType for PlainEncryptionAlgorithm {
    const TAG_SIZE: Option<usize> = None;
    type DecryptionResult = usize;

    fn convert_result(val: usize) -> Result<usize, InvalidMacError> {
        Ok(val)
    }
}

/// The algorithm type of a cipher that appends a `TAG_SIZE` byte authentication tag.
#[derive(Debug)]
pub struct MacComputingEncryptionAlgorithm<const TAG_SIZE: usize>;

impl<const TAG_SIZE: usize> private::Sealed for MacComputingEncryptionAlgorithm<TAG_SIZE> {}
impl<const TAG_SIZE: usize> EncryptionAlgorithmType for MacComputingEncryptionAlgorithm<TAG_SIZE> {
    const TAG_SIZE: Option<usize> = Some(TAG_SIZE);
    type DecryptionResult = Result<usize, InvalidMacError>;

    fn convert_result(val: Result<usize, InvalidMacError>) -> Result<usize, InvalidMacError> {
        val
    }
}

/// Describes an encryption algorithm.
///
/// Implementations must implement `Default` so that every key exchange can start from a fresh,
/// unkeyed instance.
pub trait EncryptionAlgorithm: Default {
    /// Either [`PlainEncryptionAlgorithm`] or [`MacComputingEncryptionAlgorithm`].
    type AlgorithmType: EncryptionAlgorithmType;

    /// The name of the encryption algorithm.
    const NAME: &'static str;

    /// The size of the smallest amount of data that can be encrypted.
    const CIPHER_BLOCK_SIZE: usize;

    /// The size, in bytes, of the key used by this algorithm.
    const KEY_SIZE: usize;

    /// The size, in bytes, of the iv used by this algorithm.
    const IV_SIZE: usize;

    /// How many bytes of a packet must be available before its length can be decrypted.
    ///
    /// This is 4 for ciphers that decrypt the length field separately and the block size for
    /// block ciphers.
    const BYTES_TO_DECRYPT_LENGTH: usize;

    /// Loads a new key to use for the algorithm.
    ///
    /// The transport layer calls `unload_key` before it calls `load_key` again.
    ///
    /// # Panics
    /// The function may panic if `key.len() != Self::KEY_SIZE` or `iv.len() != Self::IV_SIZE`.
    fn load_key(&mut self, iv: &[u8], key: &[u8]);

    /// Unloads the key that was previously loaded.
    ///
    /// The memory holding the key must be overwritten.
    fn unload_key(&mut self);

    /// Encrypts a packet in place.
    ///
    /// For ciphers with a tag, the context covers the tag too and the tag must be written into
    /// its last `TAG_SIZE` bytes.
    ///
    /// # Panics
    /// The function may panic if no key is loaded or the packet is not aligned to the block size.
    fn encrypt_packet(&mut self, context: EncryptionContext);

    /// Decrypts a packet as far as possible and returns how many bytes are now decrypted.
    ///
    /// The function is called repeatedly with growing contexts while more of the packet arrives.
    /// Once at least `BYTES_TO_DECRYPT_LENGTH` bytes are available, the length field must be
    /// decrypted.
    /// Ciphers with a tag may only report the rest of the packet as decrypted once the tag was
    /// verified.
    ///
    /// # Panics
    /// The function may panic if no key is loaded.
    fn decrypt_packet(
        &mut self,
        context: EncryptionContext,
    ) -> <Self::AlgorithmType as EncryptionAlgorithmType>::DecryptionResult;
}

/// A runtime description of an encryption algorithm.
pub struct EncryptionAlgorithmEntry {
    /// The name of the encryption algorithm.
    pub name: &'static str,
    /// The size of the smallest amount of data that can be encrypted.
    pub cipher_block_size: usize,
    /// The size, in bytes, of the key used by this algorithm.
    pub key_size: usize,
    /// The size, in bytes, of the iv used by this algorithm.
    pub iv_size: usize,
    /// How many bytes are needed to decrypt the packet length.
    pub bytes_to_decrypt_length: usize,
    /// The size of the authentication tag, if the algorithm computes one.
    pub tag_size: Option<usize>,
    algorithm: Box<dyn DynEncryptionAlgorithm + Send>,
}

impl fmt::Debug for EncryptionAlgorithmEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EncryptionAlgorithmEntry")
            .field("name", &self.name)
            .field("cipher_block_size", &self.cipher_block_size)
            .field("bytes_to_decrypt_length", &self.bytes_to_decrypt_length)
            .field("tag_size", &self.tag_size)
            .finish_non_exhaustive()
    }
}

impl EncryptionAlgorithmEntry {
    /// Returns `true` if the algorithm makes a separate MAC algorithm unnecessary.
    pub fn replaces_mac(&self) -> bool {
        self.tag_size.is_some()
    }

    /// Creates a new unkeyed instance of the same algorithm.
    pub fn instantiate(&self) -> EncryptionAlgorithmEntry {
        EncryptionAlgorithmEntry {
            algorithm: self.algorithm.fresh(),
            ..*self
        }
    }
}

impl<T> From<T> for EncryptionAlgorithmEntry
where
    T: EncryptionAlgorithm + Send + 'static,
{
    fn from(alg: T) -> Self {
        EncryptionAlgorithmEntry {
            name: T::NAME,
            cipher_block_size: T::CIPHER_BLOCK_SIZE,
            key_size: T::KEY_SIZE,
            iv_size: T::IV_SIZE,
            bytes_to_decrypt_length: T::BYTES_TO_DECRYPT_LENGTH,
            tag_size: <T::AlgorithmType as EncryptionAlgorithmType>::TAG_SIZE,
            algorithm: Box::new(alg),
        }
    }
}

impl Deref for EncryptionAlgorithmEntry {
    type Target = dyn DynEncryptionAlgorithm + Send;

    fn deref(&self) -> &Self::Target {
        &*self.algorithm
    }
}

impl DerefMut for EncryptionAlgorithmEntry {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.algorithm
    }
}

/// A trait object friendly version of the [`EncryptionAlgorithm`] trait.
///
/// **DO NOT IMPLEMENT THIS TRAIT MANUALLY.**
/// Implement the [`EncryptionAlgorithm`] trait instead.
pub trait DynEncryptionAlgorithm {
    /// See [`EncryptionAlgorithm::load_key`].
    fn load_key(&mut self, iv: &[u8], key: &[u8]);

    /// See [`EncryptionAlgorithm::unload_key`].
    fn unload_key(&mut self);

    /// See [`EncryptionAlgorithm::encrypt_packet`].
    fn encrypt_packet(&mut self, context: EncryptionContext);

    /// See [`EncryptionAlgorithm::decrypt_packet`].
    fn decrypt_packet(&mut self, context: EncryptionContext) -> Result<usize, InvalidMacError>;

    /// Creates a new unkeyed instance of the algorithm.
    fn fresh(&self) -> Box<dyn DynEncryptionAlgorithm + Send>;
}

impl<T: EncryptionAlgorithm + Send + 'static> DynEncryptionAlgorithm for T {
    fn load_key(&mut self, iv: &[u8], key: &[u8]) {
        <Self as EncryptionAlgorithm>::load_key(self, iv, key)
    }

    fn unload_key(&mut self) {
        <Self as EncryptionAlgorithm>::unload_key(self)
    }

    fn encrypt_packet(&mut self, context: EncryptionContext) {
        <Self as EncryptionAlgorithm>::encrypt_packet(self, context)
    }

    fn decrypt_packet(&mut self, context: EncryptionContext) -> Result<usize, InvalidMacError> {
        <T::AlgorithmType as EncryptionAlgorithmType>::convert_result(
            <Self as EncryptionAlgorithm>::decrypt_packet(self, context),
        )
    }

    fn fresh(&self) -> Box<dyn DynEncryptionAlgorithm + Send> {
        Box::new(T::default())
    }
}
