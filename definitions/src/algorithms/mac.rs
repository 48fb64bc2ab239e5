//! Message authentication for the packets of one direction.
//!
//! A MAC covers the sequence number and the whole unencrypted packet, from the length field to
//! the end of the padding. It is appended to the packet after encryption.

use super::InvalidMacError;
use std::{
    fmt,
    ops::{Deref, DerefMut},
};
use subtle::ConstantTimeEq as _;

/// A MAC algorithm that authenticates packets.
///
/// A fresh instance is created from `Default` for every key exchange, so an instance only ever
/// holds the keys of a single direction and key exchange.
pub trait MacAlgorithm: Default {
    /// The name used during algorithm negotiation.
    const NAME: &'static str;

    /// The number of bytes appended to each packet.
    const MAC_SIZE: usize;

    /// The number of key bytes derived for this algorithm.
    const KEY_SIZE: usize;

    /// Takes the derived integrity key.
    ///
    /// # Panics
    /// May panic if `key.len() != Self::KEY_SIZE`.
    fn load_key(&mut self, key: &[u8]);

    /// Forgets the key and overwrites its memory.
    fn unload_key(&mut self);

    /// Writes the MAC of the unencrypted `packet` with the given sequence number to `mac`.
    ///
    /// # Panics
    /// May panic if no key is loaded or `mac.len() != Self::MAC_SIZE`.
    fn sign_packet(&mut self, sequence_number: u32, packet: &[u8], mac: &mut [u8]);

    /// Checks the MAC received for a decrypted `packet`.
    ///
    /// A `mac` of the wrong length never matches. The comparison runs in constant time.
    fn check_packet(
        &mut self,
        sequence_number: u32,
        packet: &[u8],
        mac: &[u8],
    ) -> Result<(), InvalidMacError> {
        let mut expected = vec![0; Self::MAC_SIZE];
        self.sign_packet(sequence_number, packet, &mut expected);

        if bool::from(expected.ct_eq(mac)) {
            Ok(())
        } else {
            Err(InvalidMacError::MacMismatch)
        }
    }
}

/// A MAC algorithm registered with the transport, usable without knowing its type.
pub struct MacAlgorithmEntry {
    /// The name used during algorithm negotiation.
    pub name: &'static str,
    /// The number of bytes appended to each packet.
    pub mac_size: usize,
    /// The number of key bytes derived for this algorithm.
    pub key_size: usize,
    algorithm: Box<dyn DynMacAlgorithm + Send>,
}

impl fmt::Debug for MacAlgorithmEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MacAlgorithmEntry")
            .field("name", &self.name)
            .field("mac_size", &self.mac_size)
            .finish_non_exhaustive()
    }
}

impl MacAlgorithmEntry {
    /// Creates a new unkeyed instance of the same algorithm.
    pub fn instantiate(&self) -> MacAlgorithmEntry {
        MacAlgorithmEntry {
            algorithm: self.algorithm.fresh(),
            ..*self
        }
    }
}

impl<T> From<T> for MacAlgorithmEntry
where
    T: MacAlgorithm + Send + 'static,
{
    fn from(alg: T) -> Self {
        MacAlgorithmEntry {
            name: T::NAME,
            mac_size: T::MAC_SIZE,
            key_size: T::KEY_SIZE,
            algorithm: Box::new(alg),
        }
    }
}

impl Deref for MacAlgorithmEntry {
    type Target = dyn DynMacAlgorithm + Send;

    fn deref(&self) -> &Self::Target {
        &*self.algorithm
    }
}

impl DerefMut for MacAlgorithmEntry {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.algorithm
    }
}

/// The object safe form of [`MacAlgorithm`], implemented for every MAC algorithm.
pub trait DynMacAlgorithm {
    /// See [`MacAlgorithm::load_key`].
    fn load_key(&mut self, key: &[u8]);

    /// See [`MacAlgorithm::unload_key`].
    fn unload_key(&mut self);

    /// See [`MacAlgorithm::sign_packet`].
    fn sign_packet(&mut self, sequence_number: u32, packet: &[u8], mac: &mut [u8]);

    /// See [`MacAlgorithm::check_packet`].
    fn check_packet(
        &mut self,
        sequence_number: u32,
        packet: &[u8],
        mac: &[u8],
    ) -> Result<(), InvalidMacError>;

    /// Creates a new unkeyed instance of the algorithm.
    fn fresh(&self) -> Box<dyn DynMacAlgorithm + Send>;
}

impl<T> DynMacAlgorithm for T
where
    T: MacAlgorithm + Send + 'static,
{
    fn load_key(&mut self, key: &[u8]) {
        <Self as MacAlgorithm>::load_key(self, key)
    }

    fn unload_key(&mut self) {
        <Self as MacAlgorithm>::unload_key(self)
    }

    fn sign_packet(&mut self, sequence_number: u32, packet: &[u8], mac: &mut [u8]) {
        <Self as MacAlgorithm>::sign_packet(self, sequence_number, packet, mac)
    }

    fn check_packet(
        &mut self,
        sequence_number: u32,
        packet: &[u8],
        mac: &[u8],
    ) -> Result<(), InvalidMacError> {
        <Self as MacAlgorithm>::check_packet(self, sequence_number, packet, mac)
    }

    fn fresh(&self) -> Box<dyn DynMacAlgorithm + Send> {
        Box::new(T::default())
    }
}
