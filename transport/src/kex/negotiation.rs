//! The `SSH_MSG_KEXINIT` message and the negotiation of algorithms from two of them.
//!
//! See [RFC 4253 section 7.1](https://tools.ietf.org/html/rfc4253#section-7.1).

use definitions::{
    consts::message_numbers::SSH_MSG_KEXINIT,
    parse::{self, Parse, ParsedValue},
    write, Compose,
};
use std::io::{self, Write};

use crate::{
    algorithms::{AvailableAlgorithms, NegotiatedAlgorithms, OneWayAlgorithms},
    errors::{AlgorithmDirection, NegotiationError},
};

/// The only compression algorithm supported.
const NO_COMPRESSION: &str = "none";

/// The size of the random cookie in the message.
const COOKIE_SIZE: usize = 16;

/// A parsed or composed `SSH_MSG_KEXINIT` message.
#[derive(Debug, PartialEq, Eq, Clone)]
pub(crate) struct KexInit<'a> {
    /// The random cookie.
    pub(crate) cookie: [u8; COOKIE_SIZE],
    /// The key exchange algorithms, in order of preference.
    pub(crate) kex: Vec<&'a str>,
    /// The host key algorithms, in order of preference.
    pub(crate) host_key: Vec<&'a str>,
    /// The encryption algorithms for client to server communication.
    pub(crate) encryption_c2s: Vec<&'a str>,
    /// The encryption algorithms for server to client communication.
    pub(crate) encryption_s2c: Vec<&'a str>,
    /// The MAC algorithms for client to server communication.
    pub(crate) mac_c2s: Vec<&'a str>,
    /// The MAC algorithms for server to client communication.
    pub(crate) mac_s2c: Vec<&'a str>,
    /// The compression algorithms for client to server communication.
    pub(crate) compression_c2s: Vec<&'a str>,
    /// The compression algorithms for server to client communication.
    pub(crate) compression_s2c: Vec<&'a str>,
    /// The languages for client to server communication.
    pub(crate) languages_c2s: Vec<&'a str>,
    /// The languages for server to client communication.
    pub(crate) languages_s2c: Vec<&'a str>,
    /// Whether a guessed key exchange packet follows.
    pub(crate) first_kex_packet_follows: bool,
    /// The reserved field, which must be zero.
    pub(crate) reserved: u32,
}

impl KexInit<'static> {
    /// Creates the message that offers all the available algorithms.
    pub(crate) fn from_available(
        available: &AvailableAlgorithms,
        cookie: [u8; COOKIE_SIZE],
    ) -> KexInit<'static> {
        KexInit {
            cookie,
            kex: available.kex.names(),
            host_key: available.host_key.names(),
            encryption_c2s: available.c2s.encryption.names(),
            encryption_s2c: available.s2c.encryption.names(),
            mac_c2s: available.c2s.mac.names(),
            mac_s2c: available.s2c.mac.names(),
            compression_c2s: vec![NO_COMPRESSION],
            compression_s2c: vec![NO_COMPRESSION],
            languages_c2s: Vec::new(),
            languages_s2c: Vec::new(),
            first_kex_packet_follows: false,
            reserved: 0,
        }
    }
}

impl<'a> KexInit<'a> {
    /// Returns `true` if a packet following this message guessed the wrong algorithms.
    ///
    /// The guess is right only if both parties prefer the same key exchange and host key
    /// algorithm.
    pub(crate) fn guess_is_wrong(&self, own: &KexInit) -> bool {
        self.first_kex_packet_follows
            && (self.kex.first() != own.kex.first()
                || self.host_key.first() != own.host_key.first())
    }
}

impl<'input> Parse<'input> for KexInit<'input> {
    fn parse(input: &'input [u8]) -> parse::Result<'input, Self> {
        let ParsedValue { rest_input, .. } = parse::message_number(input, SSH_MSG_KEXINIT)?;
        let ParsedValue {
            value: cookie,
            rest_input,
        } = parse::bytes_const(rest_input)?;

        let mut lists: [Vec<&str>; 10] = Default::default();
        let mut rest_input = rest_input;
        for list in &mut lists {
            let parsed = parse::name_list(rest_input)?;
            *list = parsed.value;
            rest_input = parsed.rest_input;
        }

        let ParsedValue {
            value: first_kex_packet_follows,
            rest_input,
        } = parse::boolean(rest_input)?;
        let ParsedValue {
            value: reserved,
            rest_input,
        } = parse::uint32(rest_input)?;

        let [
            kex,
            host_key,
            encryption_c2s,
            encryption_s2c,
            mac_c2s,
            mac_s2c,
            compression_c2s,
            compression_s2c,
            languages_c2s,
            languages_s2c,
        ] = lists;

        Ok(ParsedValue {
            value: KexInit {
                cookie,
                kex,
                host_key,
                encryption_c2s,
                encryption_s2c,
                mac_c2s,
                mac_s2c,
                compression_c2s,
                compression_s2c,
                languages_c2s,
                languages_s2c,
                first_kex_packet_follows,
                reserved,
            },
            rest_input,
        })
    }
}

impl Compose for KexInit<'_> {
    fn compose(&self, output: &mut impl Write) -> io::Result<()> {
        write::byte(SSH_MSG_KEXINIT, output)?;
        write::bytes(&self.cookie, output)?;

        for list in [
            &self.kex,
            &self.host_key,
            &self.encryption_c2s,
            &self.encryption_s2c,
            &self.mac_c2s,
            &self.mac_s2c,
            &self.compression_c2s,
            &self.compression_s2c,
            &self.languages_c2s,
            &self.languages_s2c,
        ] {
            write::name_list(list, output)?;
        }

        write::boolean(self.first_kex_packet_follows, output)?;
        write::uint32(self.reserved, output)
    }
}

/// Parses the `SSH_MSG_KEXINIT` of the other party and checks its structure.
pub(crate) fn parse_peer_kexinit(message: &[u8]) -> Result<KexInit, NegotiationError> {
    let ParsedValue { value, rest_input } =
        KexInit::parse(message).map_err(|_| NegotiationError::InvalidKexInit)?;
    parse::end_of_input(rest_input).map_err(|_| NegotiationError::InvalidKexInit)?;

    if value.reserved != 0 {
        return Err(NegotiationError::ReservedNotZero);
    }

    Ok(value)
}

/// Returns the first name of `own` that is also in `peer`.
fn first_match(own: &[&'static str], peer: &[&str]) -> Option<&'static str> {
    own.iter().copied().find(|name| peer.contains(name))
}

/// Chooses the key exchange and host key algorithm.
///
/// A key exchange algorithm is only chosen if a host key algorithm with the capabilities it
/// needs is available on both sides.
fn negotiate_kex(
    own: &KexInit<'static>,
    peer: &KexInit,
    available: &AvailableAlgorithms,
) -> Result<(&'static str, &'static str), NegotiationError> {
    let mut kex_matched = false;

    for kex_name in own.kex.iter().filter(|name| peer.kex.contains(name)) {
        let kex = match available.kex.algorithm(kex_name) {
            Some(kex) => kex,
            None => continue,
        };
        kex_matched = true;

        let host_key = own.host_key.iter().copied().find(|name| {
            peer.host_key.contains(name)
                && available
                    .host_key
                    .algorithm(name)
                    .map_or(false, |host_key| kex.is_compatible_with(host_key))
        });

        if let Some(host_key) = host_key {
            return Ok((kex.name, host_key));
        }
    }

    if kex_matched {
        Err(NegotiationError::NoHostKeyAlgorithmMatch)
    } else {
        Err(NegotiationError::NoKexAlgorithmMatch)
    }
}

/// Chooses the encryption and MAC algorithm for one direction.
fn negotiate_direction(
    (own_encryption, peer_encryption): (&[&'static str], &[&str]),
    (own_mac, peer_mac): (&[&'static str], &[&str]),
    available: &OneWayAlgorithms,
    direction: AlgorithmDirection,
) -> Result<(&'static str, Option<&'static str>), NegotiationError> {
    let encryption = first_match(own_encryption, peer_encryption)
        .ok_or(NegotiationError::NoEncryptionAlgorithmMatch(direction))?;

    let mac = if available.needs_mac(encryption) {
        Some(
            first_match(own_mac, peer_mac)
                .ok_or(NegotiationError::NoMacAlgorithmMatch(direction))?,
        )
    } else {
        None
    };

    Ok((encryption, mac))
}

/// Negotiates the algorithms for a key exchange from both `SSH_MSG_KEXINIT` messages.
///
/// The order of the own message decides between multiple common algorithms.
pub(crate) fn negotiate(
    own: &KexInit<'static>,
    peer: &KexInit,
    available: &AvailableAlgorithms,
) -> Result<NegotiatedAlgorithms, NegotiationError> {
    let (kex, host_key) = negotiate_kex(own, peer, available)?;

    let (encryption_c2s, mac_c2s) = negotiate_direction(
        (&own.encryption_c2s, &peer.encryption_c2s),
        (&own.mac_c2s, &peer.mac_c2s),
        &available.c2s,
        AlgorithmDirection::ClientToServer,
    )?;
    let (encryption_s2c, mac_s2c) = negotiate_direction(
        (&own.encryption_s2c, &peer.encryption_s2c),
        (&own.mac_s2c, &peer.mac_s2c),
        &available.s2c,
        AlgorithmDirection::ServerToClient,
    )?;

    if !peer.compression_c2s.contains(&NO_COMPRESSION)
        || !peer.compression_s2c.contains(&NO_COMPRESSION)
    {
        return Err(NegotiationError::CompressionUnsupported);
    }

    Ok(NegotiatedAlgorithms {
        kex,
        host_key,
        encryption_c2s,
        encryption_s2c,
        mac_c2s,
        mac_s2c,
    })
}
