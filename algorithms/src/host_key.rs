//! Provides the host key algorithms used by the SSH transport layer.

use definitions::algorithms::internal;

#[cfg(feature = "ssh-ed25519")]
#[doc(hidden)]
mod ed25519;
#[cfg(feature = "ssh-ed25519")]
#[doc(inline)]
pub use self::ed25519::*;

#[cfg(any(feature = "rsa-sha2-256", feature = "rsa-sha2-512"))]
#[doc(hidden)]
mod rsa_sha2;
#[cfg(any(feature = "rsa-sha2-256", feature = "rsa-sha2-512"))]
#[doc(inline)]
pub use self::rsa_sha2::*;

/// Calls the `add` function with all host key algorithms defined and enabled in this crate.
pub fn add_algorithms<F>(mut add: F)
where
    F: FnMut(internal::HostKeyAlgorithmEntry),
{
    #[cfg(feature = "ssh-ed25519")]
    add(Ed25519::new().into());
    #[cfg(feature = "rsa-sha2-512")]
    add(RsaSha2512::new().into());
    #[cfg(feature = "rsa-sha2-256")]
    add(RsaSha2256::new().into());
}
