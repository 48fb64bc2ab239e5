//! Provides traits to define algorithms used in the transport layer.
//!
//! Every algorithm kind follows the same pattern:
//! - a trait with associated constants that algorithm implementations implement
//! - an `*Entry` type that describes an algorithm at runtime and can hold any implementation
//! - an object safe `Dyn*` trait that is implemented automatically and used by the entries

use std::fmt;

pub use encryption::{
    EncryptionAlgorithm, EncryptionContext, MacComputingEncryptionAlgorithm,
    PlainEncryptionAlgorithm,
};
pub use host_key::HostKeyAlgorithm;
pub use key_exchange::{
    KeyExchangeAlgorithm, KeyExchangeAlgorithmError, KeyExchangeData, KeyExchangeHashFunction,
    KeyExchangeResponse,
};
pub use mac::MacAlgorithm;

mod encryption;
mod host_key;
mod key_exchange;
mod mac;

/// Internal implementation details that likely of little importance to library users.
///
/// They are made only public, because they're used across crate borders.
pub mod internal {
    pub use super::encryption::{
        DynEncryptionAlgorithm, EncryptionAlgorithmEntry, EncryptionAlgorithmType,
    };
    pub use super::host_key::{DynHostKeyAlgorithm, HostKeyAlgorithmEntry};
    pub use super::key_exchange::{DynKeyExchangeAlgorithm, KeyExchangeAlgorithmEntry};
    pub use super::mac::{DynMacAlgorithm, MacAlgorithmEntry};
    pub use crate::CryptoRngCore;
}

/// Describes the possible categories for algorithms.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AlgorithmCategory {
    /// A key exchange algorithm.
    KeyExchange,
    /// A host key algorithm.
    HostKey,
    /// An encryption algorithm.
    Encryption,
    /// A MAC algorithm.
    Mac,
}

/// Describes the direction of an algorithm.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AlgorithmDirection {
    /// The algorithm is used for client to server communication.
    ClientToServer,
    /// The algorithm is used for server to client communication.
    ServerToClient,
}

impl fmt::Display for AlgorithmDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AlgorithmDirection::ClientToServer => write!(f, "client to server"),
            AlgorithmDirection::ServerToClient => write!(f, "server to client"),
        }
    }
}

/// An error for situations where the MAC is invalid.
#[derive(Debug, PartialEq, Eq, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum InvalidMacError {
    /// The computed MAC does not match the sent MAC.
    #[error("computed MAC does not match sent MAC")]
    MacMismatch,
}
