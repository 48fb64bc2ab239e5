//! Defines the `KeyExchangeAlgorithm` trait.

use num_bigint::BigInt;
use rand::{CryptoRng, RngCore};
use std::{
    error::Error,
    fmt,
    ops::{Deref, DerefMut},
    sync::Arc,
};

use crate::algorithms::internal::{CryptoRngCore, HostKeyAlgorithmEntry};

/// The data of the current connection that goes into the exchange hash.
#[derive(Debug)]
pub struct KeyExchangeData<'data> {
    /// The identification line of the client, without `"\r\n"`.
    pub client_identification: &'data [u8],
    /// The identification line of the server, without `"\r\n"`.
    pub server_identification: &'data [u8],
    /// The payload of the `SSH_MSG_KEXINIT` message of the client.
    pub client_kexinit: &'data [u8],
    /// The payload of the `SSH_MSG_KEXINIT` message of the server.
    pub server_kexinit: &'data [u8],
}

/// What the key exchange algorithm wants to happen after it processed a message.
#[derive(Debug, PartialEq, Eq)]
pub enum KeyExchangeResponse {
    /// The key exchange continues by sending the contained message to the server.
    Packet(Vec<u8>),
    /// The key exchange is finished and the server's signature was verified.
    Finished {
        /// The public host key blob the server proved possession of.
        host_key: Vec<u8>,
        /// The shared secret `K`.
        shared_secret: BigInt,
        /// The exchange hash `H`.
        exchange_hash: Vec<u8>,
    },
}

/// The type of a hash function used by a key exchange algorithm.
pub type KeyExchangeHashFunction = fn(&[u8]) -> Vec<u8>;

/// Describes the client side of a key exchange algorithm.
///
/// Implementations must implement `Default` so that every key exchange can start from a fresh
/// instance.
pub trait KeyExchangeAlgorithm: Default {
    /// The name of the key exchange algorithm.
    const NAME: &'static str;

    /// Whether the key exchange algorithm requires an encryption capable host key algorithm.
    const REQUIRES_ENCRYPTION_CAPABLE_HOST_KEY_ALGORITHM: bool;

    /// Whether the key exchange algorithm requires a signature capable host key algorithm.
    const REQUIRES_SIGNATURE_CAPABLE_HOST_KEY_ALGORITHM: bool;

    /// The hash function used for the exchange hash and the key derivation.
    const HASH_FUNCTION: KeyExchangeHashFunction;

    /// Starts a new key exchange and returns the first message the client sends.
    fn start<Rng: RngCore + CryptoRng + ?Sized>(
        &mut self,
        key_exchange_data: &KeyExchangeData,
        rng: &mut Rng,
    ) -> Vec<u8>;

    /// Returns `true` if messages with the given number belong to this key exchange.
    fn handles_message(&self, message_number: u8) -> bool;

    /// Processes a message of the server.
    ///
    /// Once the exchange hash is computed, the algorithm verifies the server's signature with
    /// `host_key_algorithm` before returning [`KeyExchangeResponse::Finished`].
    /// A message that arrives before `start` was called is reported as
    /// [`KeyExchangeAlgorithmError::UnexpectedMessage`].
    fn filter_packet(
        &mut self,
        message: &[u8],
        key_exchange_data: &KeyExchangeData,
        host_key_algorithm: &HostKeyAlgorithmEntry,
    ) -> Result<KeyExchangeResponse, KeyExchangeAlgorithmError>;
}

/// There was an error while performing the key exchange algorithm.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KeyExchangeAlgorithmError {
    /// A message had an invalid format.
    #[error("a key exchange message had an invalid format")]
    InvalidFormat,
    /// The host key the server sent was not valid.
    #[error("the server sent an invalid host key")]
    InvalidHostKey,
    /// The signature sent by the server was invalid.
    #[error("the server sent an invalid signature")]
    InvalidSignature,
    /// The shared secret is degenerate, for example because the server sent a low order point.
    #[error("the key exchange produced an invalid shared secret")]
    InvalidSharedSecret,
    /// A message arrived that the key exchange did not expect at this point.
    #[error("unexpected key exchange message {0}")]
    UnexpectedMessage(u8),
    /// There was another error.
    #[error("{0}")]
    Other(Arc<dyn Error + Send + Sync>),
}

/// A runtime description of a key exchange algorithm.
pub struct KeyExchangeAlgorithmEntry {
    /// The name of the key exchange algorithm.
    pub name: &'static str,
    /// Whether the key exchange algorithm requires an encryption capable host key algorithm.
    pub requires_encryption_capable_host_key_algorithm: bool,
    /// Whether the key exchange algorithm requires a signature capable host key algorithm.
    pub requires_signature_capable_host_key_algorithm: bool,
    /// The hash function used by this key exchange algorithm.
    pub hash_function: KeyExchangeHashFunction,
    algorithm: Box<dyn DynKeyExchangeAlgorithm + Send>,
}

impl fmt::Debug for KeyExchangeAlgorithmEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KeyExchangeAlgorithmEntry")
            .field("name", &self.name)
            .field(
                "requires_encryption_capable_host_key_algorithm",
                &self.requires_encryption_capable_host_key_algorithm,
            )
            .field(
                "requires_signature_capable_host_key_algorithm",
                &self.requires_signature_capable_host_key_algorithm,
            )
            .finish_non_exhaustive()
    }
}

impl KeyExchangeAlgorithmEntry {
    /// Returns `true` if `host_key_algorithm` has the capabilities this key exchange needs.
    pub fn is_compatible_with(&self, host_key_algorithm: &HostKeyAlgorithmEntry) -> bool {
        (!self.requires_encryption_capable_host_key_algorithm
            || host_key_algorithm.encryption_capable)
            && (!self.requires_signature_capable_host_key_algorithm
                || host_key_algorithm.signature_capable)
    }

    /// Creates a new instance of the same algorithm without any exchange state.
    pub fn instantiate(&self) -> KeyExchangeAlgorithmEntry {
        KeyExchangeAlgorithmEntry {
            algorithm: self.algorithm.fresh(),
            ..*self
        }
    }
}

impl<T> From<T> for KeyExchangeAlgorithmEntry
where
    T: KeyExchangeAlgorithm + Send + 'static,
{
    fn from(alg: T) -> Self {
        KeyExchangeAlgorithmEntry {
            name: T::NAME,
            requires_encryption_capable_host_key_algorithm:
                T::REQUIRES_ENCRYPTION_CAPABLE_HOST_KEY_ALGORITHM,
            requires_signature_capable_host_key_algorithm:
                T::REQUIRES_SIGNATURE_CAPABLE_HOST_KEY_ALGORITHM,
            hash_function: T::HASH_FUNCTION,
            algorithm: Box::new(alg),
        }
    }
}

impl Deref for KeyExchangeAlgorithmEntry {
    type Target = dyn DynKeyExchangeAlgorithm + Send;

    fn deref(&self) -> &Self::Target {
        &*self.algorithm
    }
}

impl DerefMut for KeyExchangeAlgorithmEntry {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.algorithm
    }
}

/// A trait object friendly version of the [`KeyExchangeAlgorithm`] trait.
///
/// **DO NOT IMPLEMENT THIS TRAIT MANUALLY.**
/// Implement the [`KeyExchangeAlgorithm`] trait instead.
pub trait DynKeyExchangeAlgorithm {
    /// See [`KeyExchangeAlgorithm::start`].
    fn start(
        &mut self,
        key_exchange_data: &KeyExchangeData,
        rng: &mut dyn CryptoRngCore,
    ) -> Vec<u8>;

    /// See [`KeyExchangeAlgorithm::handles_message`].
    fn handles_message(&self, message_number: u8) -> bool;

    /// See [`KeyExchangeAlgorithm::filter_packet`].
    fn filter_packet(
        &mut self,
        message: &[u8],
        key_exchange_data: &KeyExchangeData,
        host_key_algorithm: &HostKeyAlgorithmEntry,
    ) -> Result<KeyExchangeResponse, KeyExchangeAlgorithmError>;

    /// Creates a new instance of the algorithm.
    fn fresh(&self) -> Box<dyn DynKeyExchangeAlgorithm + Send>;
}

impl<T> DynKeyExchangeAlgorithm for T
where
    T: KeyExchangeAlgorithm + Send + 'static,
{
    fn start(
        &mut self,
        key_exchange_data: &KeyExchangeData,
        rng: &mut dyn CryptoRngCore,
    ) -> Vec<u8> {
        <Self as KeyExchangeAlgorithm>::start(self, key_exchange_data, rng)
    }

    fn handles_message(&self, message_number: u8) -> bool {
        <Self as KeyExchangeAlgorithm>::handles_message(self, message_number)
    }

    fn filter_packet(
        &mut self,
        message: &[u8],
        key_exchange_data: &KeyExchangeData,
        host_key_algorithm: &HostKeyAlgorithmEntry,
    ) -> Result<KeyExchangeResponse, KeyExchangeAlgorithmError> {
        <Self as KeyExchangeAlgorithm>::filter_packet(
            self,
            message,
            key_exchange_data,
            host_key_algorithm,
        )
    }

    fn fresh(&self) -> Box<dyn DynKeyExchangeAlgorithm + Send> {
        Box::new(T::default())
    }
}
