//! Provides an implementation of the "ssh-ed25519" host key algorithm.
//!
//! See [RFC 8709](https://tools.ietf.org/html/rfc8709).

use definitions::algorithms::HostKeyAlgorithm;
use ed25519_dalek::{Signature, Verifier as _, VerifyingKey};

/// The encoding of a public key is `string "ssh-ed25519"` followed by `string key`.
const PUBLIC_KEY_PREFIX: &[u8] = b"\x00\x00\x00\x0bssh-ed25519\x00\x00\x00\x20";

/// The encoding of a signature is `string "ssh-ed25519"` followed by `string signature`.
const SIGNATURE_PREFIX: &[u8] = b"\x00\x00\x00\x0bssh-ed25519\x00\x00\x00\x40";

/// Implements the `ssh-ed25519` host key algorithm.
///
/// The existence of this struct is controlled by the `ssh-ed25519` feature.
#[derive(Debug, Default, Clone)]
#[non_exhaustive]
pub struct Ed25519 {}

impl Ed25519 {
    /// Creates a new `ssh-ed25519` host key algorithm.
    pub fn new() -> Ed25519 {
        Ed25519 {}
    }

    /// Encodes a raw 32 byte public key in the wire format.
    pub fn encode_public_key(key: &[u8; 32]) -> Vec<u8> {
        [PUBLIC_KEY_PREFIX, &key[..]].concat()
    }

    /// Encodes a raw 64 byte signature in the wire format.
    pub fn encode_signature(signature: &[u8; 64]) -> Vec<u8> {
        [SIGNATURE_PREFIX, &signature[..]].concat()
    }
}

impl HostKeyAlgorithm for Ed25519 {
    const NAME: &'static str = "ssh-ed25519";
    const SIGNATURE_CAPABLE: bool = true;
    const ENCRYPTION_CAPABLE: bool = false;

    fn verify_exchange_hash(
        &self,
        public_key: &[u8],
        exchange_hash: &[u8],
        signature: &[u8],
    ) -> bool {
        let (Some(public_key), Some(signature)) = (
            public_key.strip_prefix(PUBLIC_KEY_PREFIX),
            signature.strip_prefix(SIGNATURE_PREFIX),
        ) else {
            return false;
        };

        let Ok(public_key) = <&[u8; 32]>::try_from(public_key) else {
            return false;
        };
        let Ok(signature) = <&[u8; 64]>::try_from(signature) else {
            return false;
        };

        let Ok(public_key) = VerifyingKey::from_bytes(public_key) else {
            return false;
        };

        public_key
            .verify(exchange_hash, &Signature::from_bytes(signature))
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer as _, SigningKey};
    use rand_chacha::rand_core::SeedableRng as _;

    #[test]
    fn verifies_only_matching_signatures() {
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(25519);
        let signing_key = SigningKey::generate(&mut rng);
        let public_key = Ed25519::encode_public_key(signing_key.verifying_key().as_bytes());

        let hash = [0x5a; 32];
        let signature = Ed25519::encode_signature(&signing_key.sign(&hash).to_bytes());

        let alg = Ed25519::new();
        assert!(alg.verify_exchange_hash(&public_key, &hash, &signature));
        assert!(!alg.verify_exchange_hash(&public_key, &[0x5b; 32], &signature));
        assert!(!alg.verify_exchange_hash(&public_key, &hash, &signature[..signature.len() - 1]));
        assert!(!alg.verify_exchange_hash(&signature, &hash, &public_key));
    }
}
