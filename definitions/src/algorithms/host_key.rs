//! Defines the `HostKeyAlgorithm` trait.

use std::{fmt, ops::Deref};

/// Describes a host key algorithm from the point of view of a client.
///
/// The client never signs anything, it only checks the server's signature over the exchange hash.
pub trait HostKeyAlgorithm: Default {
    /// The name of the host key algorithm.
    const NAME: &'static str;

    /// Whether the algorithm can create signatures.
    const SIGNATURE_CAPABLE: bool;

    /// Whether the algorithm can encrypt data.
    const ENCRYPTION_CAPABLE: bool;

    /// Checks that `signature` is a valid signature of `exchange_hash` by `public_key`.
    ///
    /// Both blobs are in the wire format of the algorithm.
    /// Malformed blobs are reported as an invalid signature.
    fn verify_exchange_hash(&self, public_key: &[u8], exchange_hash: &[u8], signature: &[u8])
        -> bool;
}

/// A runtime description of a host key algorithm.
pub struct HostKeyAlgorithmEntry {
    /// The name of the host key algorithm.
    pub name: &'static str,
    /// Whether the algorithm can create signatures.
    pub signature_capable: bool,
    /// Whether the algorithm can encrypt data.
    pub encryption_capable: bool,
    algorithm: Box<dyn DynHostKeyAlgorithm + Send + Sync>,
}

impl fmt::Debug for HostKeyAlgorithmEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HostKeyAlgorithmEntry")
            .field("name", &self.name)
            .field("signature_capable", &self.signature_capable)
            .field("encryption_capable", &self.encryption_capable)
            .finish_non_exhaustive()
    }
}

impl<T> From<T> for HostKeyAlgorithmEntry
where
    T: HostKeyAlgorithm + Send + Sync + 'static,
{
    fn from(alg: T) -> Self {
        HostKeyAlgorithmEntry {
            name: T::NAME,
            signature_capable: T::SIGNATURE_CAPABLE,
            encryption_capable: T::ENCRYPTION_CAPABLE,
            algorithm: Box::new(alg),
        }
    }
}

impl Deref for HostKeyAlgorithmEntry {
    type Target = dyn DynHostKeyAlgorithm + Send + Sync;

    fn deref(&self) -> &Self::Target {
        &*self.algorithm
    }
}

/// A trait object friendly version of the [`HostKeyAlgorithm`] trait.
///
/// **DO NOT IMPLEMENT THIS TRAIT MANUALLY.**
/// Implement the [`HostKeyAlgorithm`] trait instead.
pub trait DynHostKeyAlgorithm {
    /// See [`HostKeyAlgorithm::verify_exchange_hash`].
    fn verify_exchange_hash(&self, public_key: &[u8], exchange_hash: &[u8], signature: &[u8])
        -> bool;
}

impl<T: HostKeyAlgorithm> DynHostKeyAlgorithm for T {
    fn verify_exchange_hash(
        &self,
        public_key: &[u8],
        exchange_hash: &[u8],
        signature: &[u8],
    ) -> bool {
        <Self as HostKeyAlgorithm>::verify_exchange_hash(self, public_key, exchange_hash, signature)
    }
}
