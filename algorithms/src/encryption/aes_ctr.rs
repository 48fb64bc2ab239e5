//! Provides implementations of the "aesXXX-ctr" encryption algorithms.
//!
//! See [RFC 4344 section 4](https://tools.ietf.org/html/rfc4344#section-4).

use aes::cipher::{KeyIvInit as _, StreamCipher as _};
use definitions::algorithms::{EncryptionAlgorithm, EncryptionContext, PlainEncryptionAlgorithm};
use std::fmt;

macro_rules! impl_aes_ctr {
    ($name_str:expr, $name:ident, $alg:ty, $key_size:expr) => {
        #[doc = concat!("Implements the `", $name_str, "` encryption algorithm.")]
        #[doc = ""]
        #[doc = concat!("The existence of this struct is controlled by the `", $name_str, "` feature.")]
        #[derive(Default)]
        pub struct $name {
            /// The keyed counter mode stream, `None` until a key is loaded.
            stream: Option<$alg>,
        }

        impl $name {
            #[doc = concat!("Creates a new `", $name_str, "` encryption algorithm.")]
            pub fn new() -> Self {
                $name { stream: None }
            }

            fn stream(&mut self) -> &mut $alg {
                self.stream.as_mut().expect("`load_key` was called before")
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("keyed", &self.stream.is_some())
                    .finish_non_exhaustive()
            }
        }

        impl EncryptionAlgorithm for $name {
            type AlgorithmType = PlainEncryptionAlgorithm;

            const NAME: &'static str = $name_str;
            const CIPHER_BLOCK_SIZE: usize = 16;
            const KEY_SIZE: usize = $key_size;
            const IV_SIZE: usize = 16;
            const BYTES_TO_DECRYPT_LENGTH: usize = 16;

            fn load_key(&mut self, iv: &[u8], key: &[u8]) {
                let stream = <$alg>::new_from_slices(key, iv)
                    .expect("key and iv sizes match the algorithm");

                let previous = self.stream.replace(stream);
                debug_assert!(previous.is_none());
            }

            fn unload_key(&mut self) {
                // The cipher state zeroizes itself when dropped.
                self.stream.take();
            }

            fn encrypt_packet(&mut self, mut context: EncryptionContext) {
                self.stream().apply_keystream(context.unprocessed_part());
            }

            fn decrypt_packet(&mut self, mut context: EncryptionContext) -> usize {
                let unprocessed = context.unprocessed_part();
                self.stream().apply_keystream(unprocessed);

                unprocessed.len()
            }
        }
    };
}

#[cfg(feature = "aes128-ctr")]
impl_aes_ctr!("aes128-ctr", Aes128Ctr, ctr::Ctr128BE::<aes::Aes128>, 16);

#[cfg(feature = "aes192-ctr")]
impl_aes_ctr!("aes192-ctr", Aes192Ctr, ctr::Ctr128BE::<aes::Aes192>, 24);

#[cfg(feature = "aes256-ctr")]
impl_aes_ctr!("aes256-ctr", Aes256Ctr, ctr::Ctr128BE::<aes::Aes256>, 32);
