//! Holds the algorithms available for negotiation and the algorithms in use per direction.

use definitions::algorithms::{
    EncryptionAlgorithm, HostKeyAlgorithm, KeyExchangeAlgorithm, MacAlgorithm,
};
pub(crate) use definitions::algorithms::{
    internal::{
        EncryptionAlgorithmEntry, HostKeyAlgorithmEntry, KeyExchangeAlgorithmEntry,
        MacAlgorithmEntry,
    },
    AlgorithmCategory, EncryptionContext,
};
use num_bigint::BigInt;
use std::cmp::max;

use crate::{
    constants::{MIN_PACKET_LEN_ALIGN, PACKET_LEN_SIZE},
    errors::{InvalidNameError, TransportError},
};
pub use list::{AlgorithmList, ListPosition, Nameable};

use self::key_expansion::{KeySizes, SessionKeys};

mod key_expansion;
mod list;

pub(crate) mod builtin;
pub(crate) mod helpers;

/// The lists of available packet algorithms in one communication direction.
#[derive(Debug)]
pub struct OneWayAlgorithms {
    /// The available encryption algorithms.
    pub encryption: AlgorithmList<EncryptionAlgorithmEntry>,
    /// The available MAC algorithms.
    pub mac: AlgorithmList<MacAlgorithmEntry>,
}

impl Default for OneWayAlgorithms {
    fn default() -> OneWayAlgorithms {
        OneWayAlgorithms {
            encryption: builtin::encryption_algorithms(),
            mac: builtin::mac_algorithms(),
        }
    }
}

impl OneWayAlgorithms {
    /// Creates a new one way algorithms struct containing no algorithms.
    pub fn new() -> OneWayAlgorithms {
        OneWayAlgorithms {
            encryption: AlgorithmList::new(),
            mac: AlgorithmList::new(),
        }
    }

    /// Returns `true` if a MAC algorithm is needed for the encryption algorithm `encryption`.
    pub(crate) fn needs_mac(&self, encryption: &str) -> bool {
        self.encryption
            .algorithm(encryption)
            .map(|alg| !alg.replaces_mac())
            .unwrap_or(true)
    }
}

/// Contains the algorithms available for negotiation, in order of preference.
///
/// The default contains every algorithm of the `slimssh-algorithms` crate, if the
/// `default-algorithms` feature is enabled, and nothing otherwise.
/// The "none" algorithms are never offered by default, since unencrypted packets are only used
/// before the first key exchange.
#[derive(Debug)]
pub struct AvailableAlgorithms {
    /// The available key exchange algorithms.
    pub kex: AlgorithmList<KeyExchangeAlgorithmEntry>,
    /// The available host key algorithms.
    pub host_key: AlgorithmList<HostKeyAlgorithmEntry>,
    /// The algorithms for client to server communication.
    pub c2s: OneWayAlgorithms,
    /// The algorithms for server to client communication.
    pub s2c: OneWayAlgorithms,
}

impl Default for AvailableAlgorithms {
    fn default() -> AvailableAlgorithms {
        AvailableAlgorithms {
            kex: builtin::key_exchange_algorithms(),
            host_key: builtin::host_key_algorithms(),
            c2s: Default::default(),
            s2c: Default::default(),
        }
    }
}

impl AvailableAlgorithms {
    /// Creates a new available algorithms struct containing no algorithms.
    pub fn new() -> AvailableAlgorithms {
        AvailableAlgorithms {
            kex: AlgorithmList::new(),
            host_key: AlgorithmList::new(),
            c2s: OneWayAlgorithms::new(),
            s2c: OneWayAlgorithms::new(),
        }
    }

    /// Adds a new key exchange algorithm with the highest priority.
    pub fn add_key_exchange_algorithm<A: KeyExchangeAlgorithm + Send + 'static>(
        &mut self,
        algorithm: A,
    ) -> Result<&mut Self, InvalidNameError> {
        self.kex.add(algorithm, ListPosition::Front)?;

        Ok(self)
    }

    /// Adds a new host key algorithm with the highest priority.
    pub fn add_host_key_algorithm<A: HostKeyAlgorithm + Send + Sync + 'static>(
        &mut self,
        algorithm: A,
    ) -> Result<&mut Self, InvalidNameError> {
        self.host_key.add(algorithm, ListPosition::Front)?;

        Ok(self)
    }

    /// Adds a new encryption algorithm with the highest priority for both directions.
    pub fn add_encryption_algorithm<A: EncryptionAlgorithm + Send + 'static>(
        &mut self,
        algorithm: A,
    ) -> Result<&mut Self, InvalidNameError> {
        self.c2s.encryption.add(A::default(), ListPosition::Front)?;
        self.s2c.encryption.add(algorithm, ListPosition::Front)?;

        Ok(self)
    }

    /// Adds a new MAC algorithm with the highest priority for both directions.
    pub fn add_mac_algorithm<A: MacAlgorithm + Send + 'static>(
        &mut self,
        algorithm: A,
    ) -> Result<&mut Self, InvalidNameError> {
        self.c2s.mac.add(A::default(), ListPosition::Front)?;
        self.s2c.mac.add(algorithm, ListPosition::Front)?;

        Ok(self)
    }

    /// Clears all algorithms from the available algorithms.
    pub fn clear(&mut self) {
        self.kex.clear();
        self.host_key.clear();
        self.c2s.encryption.clear();
        self.s2c.encryption.clear();
        self.c2s.mac.clear();
        self.s2c.mac.clear();
    }

    /// Returns the first algorithm category without any algorithm.
    ///
    /// The MAC lists may only be empty if every encryption algorithm of that direction replaces
    /// the MAC.
    pub(crate) fn empty_category(&self) -> Option<AlgorithmCategory> {
        let mac_missing = |one_way: &OneWayAlgorithms| {
            one_way.mac.is_empty()
                && one_way
                    .encryption
                    .iter()
                    .any(|encryption| !encryption.replaces_mac())
        };

        if self.kex.is_empty() {
            Some(AlgorithmCategory::KeyExchange)
        } else if self.host_key.is_empty() {
            Some(AlgorithmCategory::HostKey)
        } else if self.c2s.encryption.is_empty() || self.s2c.encryption.is_empty() {
            Some(AlgorithmCategory::Encryption)
        } else if mac_missing(&self.c2s) || mac_missing(&self.s2c) {
            Some(AlgorithmCategory::Mac)
        } else {
            None
        }
    }

    /// Creates fresh instances of the negotiated packet algorithms and loads the derived keys.
    ///
    /// Returns the algorithms for writing (client to server) and reading (server to client).
    pub(crate) fn load_packet_algorithms(
        &self,
        negotiated: &NegotiatedAlgorithms,
        shared_secret: &BigInt,
        exchange_hash: &[u8],
        session_id: &[u8],
    ) -> Result<(DirectionAlgorithms, DirectionAlgorithms), TransportError> {
        let hash_fn = self
            .kex
            .algorithm(negotiated.kex)
            .map(|kex| kex.hash_function)
            .ok_or(TransportError::InvalidOperation(
                "negotiated key exchange algorithm is not available",
            ))?;

        let mut write = DirectionAlgorithms::instantiate(
            &self.c2s,
            negotiated.encryption_c2s,
            negotiated.mac_c2s,
        )?;
        let mut read = DirectionAlgorithms::instantiate(
            &self.s2c,
            negotiated.encryption_s2c,
            negotiated.mac_s2c,
        )?;

        let sizes = KeySizes {
            iv_c2s: write.iv_size(),
            iv_s2c: read.iv_size(),
            encryption_c2s: write.key_size(),
            encryption_s2c: read.key_size(),
            mac_c2s: write.mac_key_size(),
            mac_s2c: read.mac_key_size(),
        };
        let keys = key_expansion::expand_keys(
            sizes,
            hash_fn,
            shared_secret,
            exchange_hash,
            session_id,
        )?;

        let SessionKeys {
            iv_c2s,
            iv_s2c,
            encryption_c2s,
            encryption_s2c,
            mac_c2s,
            mac_s2c,
        } = &keys;
        write.load_keys(iv_c2s, encryption_c2s, mac_c2s);
        read.load_keys(iv_s2c, encryption_s2c, mac_s2c);

        Ok((write, read))
    }
}

/// The algorithms chosen during one negotiation.
#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) struct NegotiatedAlgorithms {
    /// The key exchange algorithm.
    pub(crate) kex: &'static str,
    /// The host key algorithm.
    pub(crate) host_key: &'static str,
    /// The encryption algorithm for client to server communication.
    pub(crate) encryption_c2s: &'static str,
    /// The encryption algorithm for server to client communication.
    pub(crate) encryption_s2c: &'static str,
    /// The MAC algorithm for client to server communication.
    ///
    /// `None` if the encryption algorithm replaces the MAC.
    pub(crate) mac_c2s: Option<&'static str>,
    /// The MAC algorithm for server to client communication.
    ///
    /// `None` if the encryption algorithm replaces the MAC.
    pub(crate) mac_s2c: Option<&'static str>,
}

/// The encryption and MAC algorithm used for the packets of one direction.
///
/// `None` stands for the "none" algorithm used before the first key exchange.
#[derive(Debug, Default)]
pub(crate) struct DirectionAlgorithms {
    /// The encryption algorithm.
    pub(crate) encryption: Option<EncryptionAlgorithmEntry>,
    /// The MAC algorithm, if the encryption algorithm does not replace it.
    pub(crate) mac: Option<MacAlgorithmEntry>,
}

impl DirectionAlgorithms {
    /// Returns the algorithms used before the first key exchange.
    pub(crate) fn plaintext() -> DirectionAlgorithms {
        DirectionAlgorithms::default()
    }

    /// Creates unkeyed instances of the named algorithms.
    fn instantiate(
        available: &OneWayAlgorithms,
        encryption: &str,
        mac: Option<&str>,
    ) -> Result<DirectionAlgorithms, TransportError> {
        let encryption = available
            .encryption
            .algorithm(encryption)
            .ok_or(TransportError::InvalidOperation(
                "negotiated encryption algorithm is not available",
            ))?
            .instantiate();

        let mac = match mac {
            Some(name) if available.needs_mac(encryption.name) => Some(
                available
                    .mac
                    .algorithm(name)
                    .ok_or(TransportError::InvalidOperation(
                        "negotiated mac algorithm is not available",
                    ))?
                    .instantiate(),
            ),
            _ => None,
        };

        Ok(DirectionAlgorithms {
            encryption: Some(encryption),
            mac,
        })
    }

    /// Loads the derived keys into the algorithms.
    fn load_keys(&mut self, iv: &[u8], key: &[u8], mac_key: &[u8]) {
        if let Some(encryption) = &mut self.encryption {
            encryption.load_key(iv, key);
        }
        if let Some(mac) = &mut self.mac {
            mac.load_key(mac_key);
        }
    }

    /// Removes the keys from the algorithms.
    pub(crate) fn unload_keys(&mut self) {
        if let Some(encryption) = &mut self.encryption {
            encryption.unload_key();
        }
        if let Some(mac) = &mut self.mac {
            mac.unload_key();
        }
    }

    fn iv_size(&self) -> usize {
        self.encryption.as_ref().map_or(0, |alg| alg.iv_size)
    }

    fn key_size(&self) -> usize {
        self.encryption.as_ref().map_or(0, |alg| alg.key_size)
    }

    fn mac_key_size(&self) -> usize {
        self.mac.as_ref().map_or(0, |alg| alg.key_size)
    }

    /// Returns the number that packet lengths must be a multiple of.
    pub(crate) fn alignment(&self) -> usize {
        let block_size = self
            .encryption
            .as_ref()
            .map_or(MIN_PACKET_LEN_ALIGN, |alg| alg.cipher_block_size);

        max(block_size, MIN_PACKET_LEN_ALIGN)
    }

    /// Returns the number of bytes needed to decrypt the packet length.
    pub(crate) fn bytes_to_decrypt_length(&self) -> usize {
        self.encryption
            .as_ref()
            .map_or(PACKET_LEN_SIZE, |alg| alg.bytes_to_decrypt_length)
    }

    /// Returns the size of the authentication tag of the encryption algorithm, if it has one.
    pub(crate) fn tag_size(&self) -> Option<usize> {
        self.encryption.as_ref().and_then(|alg| alg.tag_size)
    }

    /// Returns the size of the MAC computed by the separate MAC algorithm.
    pub(crate) fn mac_size(&self) -> usize {
        self.mac.as_ref().map_or(0, |alg| alg.mac_size)
    }

    /// Returns the number of bytes following the packet.
    pub(crate) fn trailer_size(&self) -> usize {
        self.tag_size().unwrap_or(0) + self.mac_size()
    }

    /// Returns the name of the encryption algorithm for logging.
    pub(crate) fn encryption_name(&self) -> &'static str {
        self.encryption.as_ref().map_or("none", |alg| alg.name)
    }

    /// Returns the name of the MAC algorithm for logging.
    pub(crate) fn mac_name(&self) -> &'static str {
        match (&self.mac, self.tag_size()) {
            (Some(mac), _) => mac.name,
            (None, Some(_)) => "<implicit>",
            (None, None) => "none",
        }
    }
}
