//! Provides the MAC algorithms used by the SSH transport layer.

use definitions::algorithms::{internal, MacAlgorithm};

#[cfg(any(feature = "hmac-sha2-256", feature = "hmac-sha2-512"))]
#[doc(hidden)]
mod hmac_sha;
#[cfg(any(feature = "hmac-sha2-256", feature = "hmac-sha2-512"))]
#[doc(inline)]
pub use self::hmac_sha::*;

/// The MAC algorithm that does not authenticate anything.
///
/// It is active until the first key exchange finishes and is never negotiated.
#[derive(Debug, PartialEq, Eq, Default, Clone)]
#[non_exhaustive]
pub struct None {}

impl None {
    /// Creates a new `none` MAC algorithm.
    pub fn new() -> None {
        None {}
    }
}

impl MacAlgorithm for None {
    const NAME: &'static str = "none";
    const MAC_SIZE: usize = 0;
    const KEY_SIZE: usize = 0;

    fn load_key(&mut self, _key: &[u8]) {}

    fn unload_key(&mut self) {}

    fn sign_packet(&mut self, _sequence_number: u32, _packet: &[u8], _mac: &mut [u8]) {}
}

/// Calls the `add` function with all MAC algorithms defined and enabled in this crate.
///
/// The `none` algorithm is not included.
pub fn add_algorithms<F>(mut add: F)
where
    F: FnMut(internal::MacAlgorithmEntry),
{
    #[cfg(feature = "hmac-sha2-256")]
    add(HmacSha2256::new().into());
    #[cfg(feature = "hmac-sha2-512")]
    add(HmacSha2512::new().into());
}
