//! Implements the key derivation of [RFC 4253 section 7.2](https://tools.ietf.org/html/rfc4253#section-7.2).

use definitions::{algorithms::KeyExchangeHashFunction, write};
use num_bigint::BigInt;
use std::io;
use zeroize::Zeroizing;

/// The number of bytes to derive for each of the six keys.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub(crate) struct KeySizes {
    /// The size of the client to server IV.
    pub(crate) iv_c2s: usize,
    /// The size of the server to client IV.
    pub(crate) iv_s2c: usize,
    /// The size of the client to server encryption key.
    pub(crate) encryption_c2s: usize,
    /// The size of the server to client encryption key.
    pub(crate) encryption_s2c: usize,
    /// The size of the client to server MAC key.
    pub(crate) mac_c2s: usize,
    /// The size of the server to client MAC key.
    pub(crate) mac_s2c: usize,
}

/// The six keys derived after a key exchange.
///
/// All buffers are zeroed when they are dropped.
pub(crate) struct SessionKeys {
    /// Key `A`.
    pub(crate) iv_c2s: Zeroizing<Vec<u8>>,
    /// Key `B`.
    pub(crate) iv_s2c: Zeroizing<Vec<u8>>,
    /// Key `C`.
    pub(crate) encryption_c2s: Zeroizing<Vec<u8>>,
    /// Key `D`.
    pub(crate) encryption_s2c: Zeroizing<Vec<u8>>,
    /// Key `E`.
    pub(crate) mac_c2s: Zeroizing<Vec<u8>>,
    /// Key `F`.
    pub(crate) mac_s2c: Zeroizing<Vec<u8>>,
}

/// Derives a single key of length `len` for the given letter.
///
/// `prefix` is `mpint(K) || H`.
fn derive_key(
    hash_fn: KeyExchangeHashFunction,
    prefix: &[u8],
    letter: u8,
    session_id: &[u8],
    len: usize,
) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(Vec::with_capacity(len));
    if len == 0 {
        return key;
    }

    // HASH(K || H || X || session_id)
    let mut input = Zeroizing::new(Vec::with_capacity(prefix.len() + 1 + session_id.len()));
    input.extend_from_slice(prefix);
    input.push(letter);
    input.extend_from_slice(session_id);
    key.extend_from_slice(&Zeroizing::new(hash_fn(&input)));

    // K_n = HASH(K || H || K_1 || ... || K_(n-1))
    while key.len() < len {
        input.truncate(prefix.len());
        input.extend_from_slice(&key);
        key.extend_from_slice(&Zeroizing::new(hash_fn(&input)));
    }

    key.truncate(len);
    key
}

/// Derives all six keys from the result of a key exchange.
pub(crate) fn expand_keys(
    sizes: KeySizes,
    hash_fn: KeyExchangeHashFunction,
    shared_secret: &BigInt,
    exchange_hash: &[u8],
    session_id: &[u8],
) -> io::Result<SessionKeys> {
    let mut prefix = Zeroizing::new(Vec::new());
    write::mpint(shared_secret, &mut *prefix)?;
    prefix.extend_from_slice(exchange_hash);

    let derive = |letter, len| derive_key(hash_fn, &prefix, letter, session_id, len);

    Ok(SessionKeys {
        iv_c2s: derive(b'A', sizes.iv_c2s),
        iv_s2c: derive(b'B', sizes.iv_s2c),
        encryption_c2s: derive(b'C', sizes.encryption_c2s),
        encryption_s2c: derive(b'D', sizes.encryption_s2c),
        mac_c2s: derive(b'E', sizes.mac_c2s),
        mac_s2c: derive(b'F', sizes.mac_s2c),
    })
}
