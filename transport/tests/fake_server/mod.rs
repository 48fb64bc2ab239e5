//! A scripted SSH server that speaks just enough of the protocol to drive the client.
//!
//! It only knows `curve25519-sha256`, `ssh-ed25519`, `aes128-ctr` and `hmac-sha2-256`.

use algorithms::{
    encryption::Aes128Ctr,
    host_key::Ed25519,
    key_exchange::Curve25519Sha256,
    mac::HmacSha2256,
};
use definitions::{
    algorithms::{EncryptionAlgorithm, EncryptionContext, MacAlgorithm},
    consts::message_numbers::{
        SSH_MSG_DISCONNECT, SSH_MSG_KEXINIT, SSH_MSG_KEX_ECDH_INIT, SSH_MSG_KEX_ECDH_REPLY,
        SSH_MSG_NEWKEYS,
    },
    parse, write,
};
use ed25519_dalek::{Signer as _, SigningKey};
use rand::{RngCore as _, SeedableRng as _};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest as _, Sha256};
use slimssh_transport::{AvailableAlgorithms, ConfigBuilder, TransportConfig};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _, DuplexStream};
use x25519_dalek::{EphemeralSecret, PublicKey};

/// The identification line of the server, unless a test picks another one.
pub const SERVER_IDENTIFICATION: &str = "SSH-2.0-FakeServer_1.0";

/// Installs a log subscriber that prints through the test harness.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// A client configuration limited to the algorithms the fake server understands.
pub fn client_config() -> TransportConfig {
    client_config_builder().build().unwrap()
}

/// Starts a client configuration with the algorithms the fake server understands.
pub fn client_config_builder() -> ConfigBuilder {
    let mut algorithms = AvailableAlgorithms::new();
    algorithms
        .add_key_exchange_algorithm(Curve25519Sha256::new())
        .unwrap()
        .add_host_key_algorithm(Ed25519::new())
        .unwrap()
        .add_encryption_algorithm(Aes128Ctr::new())
        .unwrap()
        .add_mac_algorithm(HmacSha2256::new())
        .unwrap();

    TransportConfig::builder().algorithms(algorithms)
}

/// The keys of one direction.
struct Keys {
    cipher: Aes128Ctr,
    mac: HmacSha2256,
}

impl Keys {
    fn new(iv: &[u8], key: &[u8], mac_key: &[u8]) -> Keys {
        let mut cipher = Aes128Ctr::new();
        cipher.load_key(iv, key);
        let mut mac = HmacSha2256::new();
        mac.load_key(mac_key);

        Keys { cipher, mac }
    }
}

/// The algorithms the server offers in its `SSH_MSG_KEXINIT`.
#[derive(Debug, Clone)]
pub struct ServerOffer {
    /// The key exchange algorithms in order of preference.
    pub kex: Vec<&'static str>,
    /// Whether a guessed key exchange packet follows.
    pub first_kex_packet_follows: bool,
}

impl Default for ServerOffer {
    fn default() -> ServerOffer {
        ServerOffer {
            kex: vec!["curve25519-sha256"],
            first_kex_packet_follows: false,
        }
    }
}

/// The server side of a connection.
pub struct FakeServer {
    stream: DuplexStream,
    received: Vec<u8>,
    rng: ChaCha20Rng,
    host_key: SigningKey,
    client_identification: Vec<u8>,
    server_identification: Vec<u8>,
    session_id: Option<Vec<u8>>,
    read_sequence_number: u32,
    write_sequence_number: u32,
    read_keys: Option<Keys>,
    write_keys: Option<Keys>,
}

impl FakeServer {
    /// Exchanges identification lines with the client.
    pub async fn accept(stream: DuplexStream) -> FakeServer {
        FakeServer::accept_with(stream, "", SERVER_IDENTIFICATION, usize::MAX).await
    }

    /// Sends `banner` and then `identification`, writing at most `chunk_size` bytes at a time.
    pub async fn accept_with(
        stream: DuplexStream,
        banner: &str,
        identification: &str,
        chunk_size: usize,
    ) -> FakeServer {
        let mut rng = ChaCha20Rng::seed_from_u64(4253);
        let host_key = SigningKey::generate(&mut rng);

        let mut server = FakeServer {
            stream,
            received: Vec::new(),
            rng,
            host_key,
            client_identification: Vec::new(),
            server_identification: identification.as_bytes().to_vec(),
            session_id: None,
            read_sequence_number: 0,
            write_sequence_number: 0,
            read_keys: None,
            write_keys: None,
        };

        let lines = format!("{}{}\r\n", banner, identification);
        for chunk in lines.as_bytes().chunks(chunk_size) {
            server.stream.write_all(chunk).await.unwrap();
            server.stream.flush().await.unwrap();
            tokio::task::yield_now().await;
        }

        let mut line = Vec::new();
        while !line.ends_with(b"\r\n") {
            line.extend(server.read_exact(1).await);
        }
        line.truncate(line.len() - 2);
        server.client_identification = line;

        server
    }

    /// Returns the identification line the client sent.
    pub fn client_identification(&self) -> &[u8] {
        &self.client_identification
    }

    /// Returns the exchange hash of the first key exchange.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.session_id.as_deref()
    }

    async fn read_exact(&mut self, len: usize) -> Vec<u8> {
        while self.received.len() < len {
            let mut buf = [0; 4096];
            let read = self.stream.read(&mut buf).await.unwrap();
            assert_ne!(read, 0, "the client closed the connection");
            self.received.extend_from_slice(&buf[..read]);
        }

        self.received.drain(..len).collect()
    }

    /// Returns `true` once the client closed its side of the stream.
    pub async fn client_closed(&mut self) -> bool {
        let mut buf = [0; 64];
        self.received.is_empty() && matches!(self.stream.read(&mut buf).await, Ok(0))
    }

    /// Writes raw bytes to the client.
    pub async fn write_raw(&mut self, data: &[u8]) {
        self.stream.write_all(data).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Builds the next packet for `payload`, encrypted with the current keys.
    fn seal(&mut self, payload: &[u8]) -> Vec<u8> {
        let block_size = if self.write_keys.is_some() { 16 } else { 8 };
        let mut padding_length = block_size - (5 + payload.len()) % block_size;
        if padding_length < 4 {
            padding_length += block_size;
        }

        let mut packet = Vec::new();
        write::uint32((1 + payload.len() + padding_length) as u32, &mut packet).unwrap();
        write::byte(padding_length as u8, &mut packet).unwrap();
        packet.extend_from_slice(payload);
        let mut padding = vec![0; padding_length];
        self.rng.fill_bytes(&mut padding);
        packet.extend_from_slice(&padding);

        let sequence_number = self.write_sequence_number;
        self.write_sequence_number = sequence_number.wrapping_add(1);

        if let Some(keys) = &mut self.write_keys {
            let mut mac = [0; 32];
            keys.mac.sign_packet(sequence_number, &packet, &mut mac);
            keys.cipher
                .encrypt_packet(EncryptionContext::new(sequence_number, &mut packet, 0));
            packet.extend_from_slice(&mac);
        }

        packet
    }

    /// Sends a packet to the client.
    pub async fn send(&mut self, payload: &[u8]) {
        let packet = self.seal(payload);
        self.write_raw(&packet).await;
    }

    /// Sends a packet with a broken MAC to the client.
    pub async fn send_corrupted(&mut self, payload: &[u8]) {
        let mut packet = self.seal(payload);
        if let Some(last) = packet.last_mut() {
            *last ^= 0x01;
        }
        self.write_raw(&packet).await;
    }

    /// Receives the next packet of the client and returns its payload.
    pub async fn recv(&mut self) -> Vec<u8> {
        let sequence_number = self.read_sequence_number;
        self.read_sequence_number = sequence_number.wrapping_add(1);

        let packet = match self.read_keys.take() {
            Some(mut keys) => {
                let mut packet = self.read_exact(16).await;
                keys.cipher
                    .decrypt_packet(EncryptionContext::new(sequence_number, &mut packet, 0));

                let len = u32::from_be_bytes([packet[0], packet[1], packet[2], packet[3]]);
                let rest = self.read_exact(4 + len as usize - 16).await;
                packet.extend_from_slice(&rest);
                keys.cipher
                    .decrypt_packet(EncryptionContext::new(sequence_number, &mut packet, 16));

                let mac = self.read_exact(32).await;
                let mut expected = [0; 32];
                keys.mac.sign_packet(sequence_number, &packet, &mut expected);
                assert_eq!(mac, expected, "the client sent an invalid MAC");

                self.read_keys = Some(keys);
                packet
            }
            None => {
                let mut packet = self.read_exact(4).await;
                let len = u32::from_be_bytes([packet[0], packet[1], packet[2], packet[3]]);
                let rest = self.read_exact(len as usize).await;
                packet.extend_from_slice(&rest);
                packet
            }
        };

        let padding_length = packet[4] as usize;
        packet[5..packet.len() - padding_length].to_vec()
    }

    /// Returns the `SSH_MSG_KEXINIT` payload for `offer`.
    fn kexinit(&mut self, offer: &ServerOffer) -> Vec<u8> {
        let mut cookie = [0; 16];
        self.rng.fill_bytes(&mut cookie);

        let mut payload = vec![SSH_MSG_KEXINIT];
        payload.extend_from_slice(&cookie);
        write::name_list(&offer.kex, &mut payload).unwrap();
        write::name_list(&["ssh-ed25519"], &mut payload).unwrap();
        for _ in 0..2 {
            write::name_list(&["aes128-ctr"], &mut payload).unwrap();
        }
        for _ in 0..2 {
            write::name_list(&["hmac-sha2-256"], &mut payload).unwrap();
        }
        for _ in 0..2 {
            write::name_list(&["none"], &mut payload).unwrap();
        }
        for _ in 0..2 {
            write::name_list::<&str>(&[], &mut payload).unwrap();
        }
        write::boolean(offer.first_kex_packet_follows, &mut payload).unwrap();
        write::uint32(0, &mut payload).unwrap();

        payload
    }

    /// Runs a key exchange with the default offer.
    pub async fn key_exchange(&mut self) -> Vec<u8> {
        self.key_exchange_with(&ServerOffer::default(), None).await
    }

    /// Runs a key exchange and returns its exchange hash.
    ///
    /// `client_kexinit` is the `SSH_MSG_KEXINIT` of the client, if it was received already.
    pub async fn key_exchange_with(
        &mut self,
        offer: &ServerOffer,
        client_kexinit: Option<Vec<u8>>,
    ) -> Vec<u8> {
        let server_kexinit = self.kexinit(offer);
        self.send(&server_kexinit).await;

        if offer.first_kex_packet_follows {
            // A guess the client has to discard.
            self.send(&[SSH_MSG_KEX_ECDH_INIT, 0, 0, 0, 0]).await;
        }

        let client_kexinit = match client_kexinit {
            Some(kexinit) => kexinit,
            None => self.recv().await,
        };
        assert_eq!(client_kexinit[0], SSH_MSG_KEXINIT);

        let ecdh_init = self.recv().await;
        assert_eq!(ecdh_init[0], SSH_MSG_KEX_ECDH_INIT);
        let client_public = parse::string(&ecdh_init[1..]).unwrap().value;
        let client_public = PublicKey::from(<[u8; 32]>::try_from(client_public).unwrap());

        let secret = EphemeralSecret::random_from_rng(&mut self.rng);
        let server_public = PublicKey::from(&secret);
        let shared_secret = secret.diffie_hellman(&client_public);

        let host_key = Ed25519::encode_public_key(&self.host_key.verifying_key().to_bytes());

        let mut hash_input = Vec::new();
        write::string(&self.client_identification, &mut hash_input).unwrap();
        write::string(&self.server_identification, &mut hash_input).unwrap();
        write::string(&client_kexinit, &mut hash_input).unwrap();
        write::string(&server_kexinit, &mut hash_input).unwrap();
        write::string(&host_key, &mut hash_input).unwrap();
        write::string(client_public.as_bytes(), &mut hash_input).unwrap();
        write::string(server_public.as_bytes(), &mut hash_input).unwrap();
        write::mpint_unsigned(shared_secret.as_bytes(), &mut hash_input).unwrap();
        let exchange_hash = Sha256::digest(&hash_input).to_vec();

        let signature = self.host_key.sign(&exchange_hash);
        let mut reply = vec![SSH_MSG_KEX_ECDH_REPLY];
        write::string(&host_key, &mut reply).unwrap();
        write::string(server_public.as_bytes(), &mut reply).unwrap();
        write::string(&Ed25519::encode_signature(&signature.to_bytes()), &mut reply).unwrap();
        self.send(&reply).await;

        let session_id = self
            .session_id
            .get_or_insert_with(|| exchange_hash.clone())
            .clone();

        let mut prefix = Vec::new();
        write::mpint_unsigned(shared_secret.as_bytes(), &mut prefix).unwrap();
        prefix.extend_from_slice(&exchange_hash);
        let derive = |letter: u8, len: usize| {
            let mut input = prefix.clone();
            input.push(letter);
            input.extend_from_slice(&session_id);
            Sha256::digest(&input)[..len].to_vec()
        };

        self.send(&[SSH_MSG_NEWKEYS]).await;
        self.write_keys = Some(Keys::new(&derive(b'B', 16), &derive(b'D', 16), &derive(b'F', 32)));

        assert_eq!(self.recv().await, [SSH_MSG_NEWKEYS]);
        self.read_keys = Some(Keys::new(&derive(b'A', 16), &derive(b'C', 16), &derive(b'E', 32)));

        exchange_hash
    }

    /// Sends a `SSH_MSG_DISCONNECT` message.
    pub async fn disconnect(&mut self, reason: u32, description: &str) {
        let mut payload = vec![SSH_MSG_DISCONNECT];
        write::uint32(reason, &mut payload).unwrap();
        write::string(description.as_bytes(), &mut payload).unwrap();
        write::string(b"", &mut payload).unwrap();

        self.send(&payload).await;
    }
}
