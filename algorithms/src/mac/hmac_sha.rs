//! Provides implementations of the "hmac-sha2-XXX" MAC algorithms.
//!
//! See [RFC 6668](https://tools.ietf.org/html/rfc6668).

use definitions::algorithms::MacAlgorithm;
use hmac::{Hmac, Mac};
use std::fmt;
use zeroize::Zeroizing;

macro_rules! impl_hmac_sha {
    ($name_str:expr, $name:ident, $alg:ty, $size:expr) => {
        #[doc = concat!("Implements the `", $name_str, "` MAC algorithm.")]
        #[doc = ""]
        #[doc = concat!("The existence of this struct is controlled by the `", $name_str, "` feature.")]
        #[derive(Default)]
        pub struct $name {
            key: Option<Zeroizing<Vec<u8>>>,
        }

        impl $name {
            #[doc = concat!("Creates a new `", $name_str, "` MAC algorithm.")]
            pub fn new() -> $name {
                $name { key: None }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("keyed", &self.key.is_some())
                    .finish_non_exhaustive()
            }
        }

        impl MacAlgorithm for $name {
            const NAME: &'static str = $name_str;
            const MAC_SIZE: usize = $size;
            const KEY_SIZE: usize = $size;

            fn load_key(&mut self, key: &[u8]) {
                debug_assert_eq!(key.len(), Self::KEY_SIZE);

                self.key.replace(Zeroizing::new(key.to_vec()));
            }

            fn unload_key(&mut self) {
                self.key.take();
            }

            fn sign_packet(&mut self, sequence_number: u32, packet: &[u8], result: &mut [u8]) {
                let key = self.key.as_ref().expect("`load_key` was called before");

                let mut mac = <Hmac<$alg> as Mac>::new_from_slice(key)
                    .expect("HMAC can take keys of any size");
                mac.update(&sequence_number.to_be_bytes());
                mac.update(packet);

                result.copy_from_slice(&mac.finalize().into_bytes());
            }
        }
    };
}

#[cfg(feature = "hmac-sha2-256")]
impl_hmac_sha!("hmac-sha2-256", HmacSha2256, sha2::Sha256, 32);

#[cfg(feature = "hmac-sha2-512")]
impl_hmac_sha!("hmac-sha2-512", HmacSha2512, sha2::Sha512, 64);
