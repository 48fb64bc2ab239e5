//! Implements the "curve25519-sha256" key exchange algorithm.
//!
//! See [RFC 8731](https://tools.ietf.org/html/rfc8731).

use definitions::{
    algorithms::{
        internal::HostKeyAlgorithmEntry, KeyExchangeAlgorithm, KeyExchangeAlgorithmError,
        KeyExchangeData, KeyExchangeResponse,
    },
    consts::message_numbers::{SSH_MSG_KEX_ECDH_INIT, SSH_MSG_KEX_ECDH_REPLY},
    parse::{self, ParsedValue},
    write,
};
use num_bigint::{BigInt, Sign};
use rand::{CryptoRng, RngCore};
use sha2::{Digest as _, Sha256};
use std::{fmt, io};
use x25519_dalek::{EphemeralSecret, PublicKey};

/// The parts of `SSH_MSG_KEX_ECDH_REPLY`.
struct EcdhReply<'a> {
    host_key: &'a [u8],
    server_public_key: [u8; 32],
    signature: &'a [u8],
}

fn parse_reply(message: &[u8]) -> Result<EcdhReply, KeyExchangeAlgorithmError> {
    let parsed = (|| {
        let ParsedValue { rest_input, .. } =
            parse::message_number(message, SSH_MSG_KEX_ECDH_REPLY)?;
        let ParsedValue {
            value: host_key,
            rest_input,
        } = parse::string(rest_input)?;
        let ParsedValue {
            value: server_public_key,
            rest_input,
        } = parse::string(rest_input)?;
        let ParsedValue {
            value: signature,
            rest_input,
        } = parse::string(rest_input)?;
        parse::end_of_input(rest_input)?;

        Ok::<_, parse::ParseError>((host_key, server_public_key, signature))
    })();
    let (host_key, server_public_key, signature) =
        parsed.map_err(|_| KeyExchangeAlgorithmError::InvalidFormat)?;

    let server_public_key = <[u8; 32]>::try_from(server_public_key)
        .map_err(|_| KeyExchangeAlgorithmError::InvalidFormat)?;

    Ok(EcdhReply {
        host_key,
        server_public_key,
        signature,
    })
}

/// Serializes everything the exchange hash covers, in order.
fn exchange_hash_input(
    key_exchange_data: &KeyExchangeData,
    host_key: &[u8],
    client_public_key: &[u8],
    server_public_key: &[u8],
    shared_secret: &[u8],
) -> io::Result<Vec<u8>> {
    let mut input = Vec::new();

    write::string(key_exchange_data.client_identification, &mut input)?;
    write::string(key_exchange_data.server_identification, &mut input)?;
    write::string(key_exchange_data.client_kexinit, &mut input)?;
    write::string(key_exchange_data.server_kexinit, &mut input)?;
    write::string(host_key, &mut input)?;
    write::string(client_public_key, &mut input)?;
    write::string(server_public_key, &mut input)?;
    write::mpint_unsigned(shared_secret, &mut input)?;

    Ok(input)
}

/// The client side of an ECDH exchange over curve25519.
///
/// Shared by all names this exchange is registered under.
#[derive(Default)]
struct Exchange {
    /// The ephemeral secret, present between `start` and the server's reply.
    secret: Option<(EphemeralSecret, PublicKey)>,
}

impl Exchange {
    fn start<Rng: RngCore + CryptoRng + ?Sized>(&mut self, rng: &mut Rng) -> Vec<u8> {
        let secret = EphemeralSecret::random_from_rng(rng);
        let public = PublicKey::from(&secret);

        let mut message = vec![SSH_MSG_KEX_ECDH_INIT];
        // A 32 byte string always fits into a `Vec`.
        let _ = write::string(public.as_bytes(), &mut message);

        let previous = self.secret.replace((secret, public));
        debug_assert!(previous.is_none());

        message
    }

    fn filter_packet(
        &mut self,
        message: &[u8],
        key_exchange_data: &KeyExchangeData,
        host_key_algorithm: &HostKeyAlgorithmEntry,
    ) -> Result<KeyExchangeResponse, KeyExchangeAlgorithmError> {
        let number = message.first().copied().unwrap_or_default();
        if number != SSH_MSG_KEX_ECDH_REPLY || self.secret.is_none() {
            return Err(KeyExchangeAlgorithmError::UnexpectedMessage(number));
        }

        let reply = parse_reply(message)?;

        let (secret, client_public) = self
            .secret
            .take()
            .ok_or(KeyExchangeAlgorithmError::UnexpectedMessage(number))?;
        let server_public = PublicKey::from(reply.server_public_key);

        let shared_secret = secret.diffie_hellman(&server_public);
        if !shared_secret.was_contributory() {
            return Err(KeyExchangeAlgorithmError::InvalidSharedSecret);
        }

        let hash_input = exchange_hash_input(
            key_exchange_data,
            reply.host_key,
            client_public.as_bytes(),
            server_public.as_bytes(),
            shared_secret.as_bytes(),
        )
        .map_err(|err| KeyExchangeAlgorithmError::Other(std::sync::Arc::new(err)))?;
        let exchange_hash = Sha256::digest(&hash_input).to_vec();

        if !host_key_algorithm.verify_exchange_hash(
            reply.host_key,
            &exchange_hash,
            reply.signature,
        ) {
            return Err(KeyExchangeAlgorithmError::InvalidSignature);
        }

        Ok(KeyExchangeResponse::Finished {
            host_key: reply.host_key.to_vec(),
            shared_secret: BigInt::from_bytes_be(Sign::Plus, shared_secret.as_bytes()),
            exchange_hash,
        })
    }
}

macro_rules! impl_curve25519_sha256 {
    ($name_str:expr, $name:ident) => {
        #[doc = concat!("Implements the `", $name_str, "` key exchange algorithm.")]
        #[doc = ""]
        #[doc = "The existence of this struct is controlled by the `curve25519-sha256` feature."]
        #[derive(Default)]
        pub struct $name {
            exchange: Exchange,
        }

        impl $name {
            #[doc = concat!("Creates a new `", $name_str, "` key exchange algorithm.")]
            pub fn new() -> $name {
                $name {
                    exchange: Exchange::default(),
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("started", &self.exchange.secret.is_some())
                    .finish_non_exhaustive()
            }
        }

        impl KeyExchangeAlgorithm for $name {
            const NAME: &'static str = $name_str;
            const REQUIRES_ENCRYPTION_CAPABLE_HOST_KEY_ALGORITHM: bool = false;
            const REQUIRES_SIGNATURE_CAPABLE_HOST_KEY_ALGORITHM: bool = true;
            const HASH_FUNCTION: fn(&[u8]) -> Vec<u8> = |data| Sha256::digest(data).to_vec();

            fn start<Rng: RngCore + CryptoRng + ?Sized>(
                &mut self,
                _key_exchange_data: &KeyExchangeData,
                rng: &mut Rng,
            ) -> Vec<u8> {
                self.exchange.start(rng)
            }

            fn handles_message(&self, message_number: u8) -> bool {
                message_number == SSH_MSG_KEX_ECDH_REPLY
            }

            fn filter_packet(
                &mut self,
                message: &[u8],
                key_exchange_data: &KeyExchangeData,
                host_key_algorithm: &HostKeyAlgorithmEntry,
            ) -> Result<KeyExchangeResponse, KeyExchangeAlgorithmError> {
                self.exchange
                    .filter_packet(message, key_exchange_data, host_key_algorithm)
            }
        }
    };
}

impl_curve25519_sha256!("curve25519-sha256", Curve25519Sha256);
impl_curve25519_sha256!("curve25519-sha256@libssh.org", Curve25519Sha256Libssh);

#[cfg(all(test, feature = "ssh-ed25519"))]
mod tests {
    use super::*;
    use crate::host_key::Ed25519;
    use ed25519_dalek::{Signer as _, SigningKey};
    use rand_chacha::{rand_core::SeedableRng as _, ChaCha20Rng};

    const DATA: KeyExchangeData<'static> = KeyExchangeData {
        client_identification: b"SSH-2.0-client",
        server_identification: b"SSH-2.0-server",
        client_kexinit: b"\x14client kexinit",
        server_kexinit: b"\x14server kexinit",
    };

    /// Plays the server side of the exchange and returns the reply and the expected outcome.
    fn server_reply(init: &[u8], rng: &mut ChaCha20Rng) -> (Vec<u8>, Vec<u8>, [u8; 32]) {
        assert_eq!(init[0], SSH_MSG_KEX_ECDH_INIT);
        let client_public = <[u8; 32]>::try_from(&init[5..]).unwrap();

        let signing_key = SigningKey::generate(rng);
        let host_key = Ed25519::encode_public_key(signing_key.verifying_key().as_bytes());

        let secret = EphemeralSecret::random_from_rng(&mut *rng);
        let server_public = PublicKey::from(&secret);
        let shared = secret.diffie_hellman(&PublicKey::from(client_public));

        let mut hasher = Sha256::new();
        for part in [
            DATA.client_identification,
            DATA.server_identification,
            DATA.client_kexinit,
            DATA.server_kexinit,
            &host_key[..],
            &client_public[..],
            &server_public.as_bytes()[..],
        ] {
            hasher.update((part.len() as u32).to_be_bytes());
            hasher.update(part);
        }
        let mut k = shared.as_bytes().to_vec();
        while k.first() == Some(&0) {
            k.remove(0);
        }
        if k[0] & 0x80 != 0 {
            k.insert(0, 0);
        }
        hasher.update((k.len() as u32).to_be_bytes());
        hasher.update(&k);
        let hash = hasher.finalize().to_vec();

        let signature = Ed25519::encode_signature(&signing_key.sign(&hash).to_bytes());

        let mut reply = vec![SSH_MSG_KEX_ECDH_REPLY];
        write::string(&host_key, &mut reply).unwrap();
        write::string(server_public.as_bytes(), &mut reply).unwrap();
        write::string(&signature, &mut reply).unwrap();

        (reply, hash, *shared.as_bytes())
    }

    #[test]
    fn completes_an_exchange() {
        let mut rng = ChaCha20Rng::seed_from_u64(8731);
        let host_key_algorithm = HostKeyAlgorithmEntry::from(Ed25519::new());

        let mut alg = Curve25519Sha256::new();
        let init = alg.start(&DATA, &mut rng);
        assert_eq!(init.len(), 1 + 4 + 32);
        assert!(alg.handles_message(SSH_MSG_KEX_ECDH_REPLY));
        assert!(!alg.handles_message(SSH_MSG_KEX_ECDH_INIT));

        let (reply, hash, shared) = server_reply(&init, &mut rng);
        match alg.filter_packet(&reply, &DATA, &host_key_algorithm) {
            Ok(KeyExchangeResponse::Finished {
                shared_secret,
                exchange_hash,
                ..
            }) => {
                assert_eq!(exchange_hash, hash);
                assert_eq!(shared_secret, BigInt::from_bytes_be(Sign::Plus, &shared));
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_replies() {
        let mut rng = ChaCha20Rng::seed_from_u64(4253);
        let host_key_algorithm = HostKeyAlgorithmEntry::from(Ed25519::new());

        let mut alg = Curve25519Sha256Libssh::new();
        let init = alg.start(&DATA, &mut rng);
        let (mut reply, _, _) = server_reply(&init, &mut rng);

        assert!(matches!(
            alg.filter_packet(&reply[..reply.len() - 1], &DATA, &host_key_algorithm),
            Err(KeyExchangeAlgorithmError::InvalidFormat)
        ));
        assert!(matches!(
            alg.filter_packet(&[SSH_MSG_KEX_ECDH_INIT], &DATA, &host_key_algorithm),
            Err(KeyExchangeAlgorithmError::UnexpectedMessage(SSH_MSG_KEX_ECDH_INIT))
        ));

        let last = reply.len() - 1;
        reply[last] ^= 0x01;
        assert!(matches!(
            alg.filter_packet(&reply, &DATA, &host_key_algorithm),
            Err(KeyExchangeAlgorithmError::InvalidSignature)
        ));
    }

    #[test]
    fn rejects_low_order_points() {
        let mut rng = ChaCha20Rng::seed_from_u64(0);
        let host_key_algorithm = HostKeyAlgorithmEntry::from(Ed25519::new());

        let mut alg = Curve25519Sha256::new();
        alg.start(&DATA, &mut rng);

        let mut reply = vec![SSH_MSG_KEX_ECDH_REPLY];
        write::string(&Ed25519::encode_public_key(&[0; 32]), &mut reply).unwrap();
        write::string(&[0; 32], &mut reply).unwrap();
        write::string(&Ed25519::encode_signature(&[0; 64]), &mut reply).unwrap();

        assert!(matches!(
            alg.filter_packet(&reply, &DATA, &host_key_algorithm),
            Err(KeyExchangeAlgorithmError::InvalidSharedSecret)
        ));
    }
}
