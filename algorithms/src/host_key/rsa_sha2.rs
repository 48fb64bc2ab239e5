//! Provides implementations of the "rsa-sha2-256" and "rsa-sha2-512" host key algorithms.
//!
//! See [RFC 8332](https://tools.ietf.org/html/rfc8332).

use definitions::{
    algorithms::HostKeyAlgorithm,
    parse::{self, ParsedValue},
    write,
};
use rsa::{pkcs1v15, signature::Verifier as _, BigUint, RsaPublicKey};
use sha2::digest::{const_oid::AssociatedOid, Digest};

/// The key type name in the public key blob, shared by all RSA signature algorithms.
const KEY_TYPE: &[u8] = b"ssh-rsa";

/// Parses a public key blob of the form `string "ssh-rsa"`, `mpint e`, `mpint n`.
fn parse_public_key(blob: &[u8]) -> Option<RsaPublicKey> {
    let ParsedValue {
        value: key_type,
        rest_input,
    } = parse::string(blob).ok()?;
    if key_type != KEY_TYPE {
        return None;
    }

    let ParsedValue {
        value: e,
        rest_input,
    } = parse::positive_mpint(rest_input).ok()?;
    let ParsedValue {
        value: n,
        rest_input,
    } = parse::positive_mpint(rest_input).ok()?;
    parse::end_of_input(rest_input).ok()?;

    RsaPublicKey::new(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e)).ok()
}

/// Parses a signature blob of the form `string name`, `string signature`.
fn parse_signature<'a>(blob: &'a [u8], name: &str) -> Option<&'a [u8]> {
    let ParsedValue {
        value: signature_name,
        rest_input,
    } = parse::string(blob).ok()?;
    if signature_name != name.as_bytes() {
        return None;
    }

    let ParsedValue {
        value: signature,
        rest_input,
    } = parse::string(rest_input).ok()?;
    parse::end_of_input(rest_input).ok()?;

    Some(signature)
}

fn verify<D: Digest + AssociatedOid>(
    name: &str,
    public_key: &[u8],
    exchange_hash: &[u8],
    signature: &[u8],
) -> bool {
    let (Some(public_key), Some(signature)) =
        (parse_public_key(public_key), parse_signature(signature, name))
    else {
        return false;
    };

    let Ok(signature) = pkcs1v15::Signature::try_from(signature) else {
        return false;
    };

    pkcs1v15::VerifyingKey::<D>::new(public_key)
        .verify(exchange_hash, &signature)
        .is_ok()
}

/// Encodes the public exponent and modulus of an RSA key in the wire format.
pub fn encode_rsa_public_key(e: &[u8], n: &[u8]) -> Vec<u8> {
    let mut blob = Vec::new();

    // Writing to a `Vec` does not fail for inputs of realistic sizes.
    let _ = write::string(KEY_TYPE, &mut blob)
        .and_then(|()| write::mpint_unsigned(e, &mut blob))
        .and_then(|()| write::mpint_unsigned(n, &mut blob));

    blob
}

macro_rules! impl_rsa_sha2 {
    ($name_str:expr, $name:ident, $digest:ty) => {
        #[doc = concat!("Implements the `", $name_str, "` host key algorithm.")]
        #[doc = ""]
        #[doc = concat!("The existence of this struct is controlled by the `", $name_str, "` feature.")]
        #[derive(Debug, Default, Clone)]
        #[non_exhaustive]
        pub struct $name {}

        impl $name {
            #[doc = concat!("Creates a new `", $name_str, "` host key algorithm.")]
            pub fn new() -> $name {
                $name {}
            }
        }

        impl HostKeyAlgorithm for $name {
            const NAME: &'static str = $name_str;
            const SIGNATURE_CAPABLE: bool = true;
            const ENCRYPTION_CAPABLE: bool = false;

            fn verify_exchange_hash(
                &self,
                public_key: &[u8],
                exchange_hash: &[u8],
                signature: &[u8],
            ) -> bool {
                verify::<$digest>(Self::NAME, public_key, exchange_hash, signature)
            }
        }
    };
}

#[cfg(feature = "rsa-sha2-256")]
impl_rsa_sha2!("rsa-sha2-256", RsaSha2256, sha2::Sha256);

#[cfg(feature = "rsa-sha2-512")]
impl_rsa_sha2!("rsa-sha2-512", RsaSha2512, sha2::Sha512);
