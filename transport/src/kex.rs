//! Runs key exchanges on an established byte stream.
//!
//! The engine is driven by the reading task for incoming key exchange messages and by the rekey
//! timer for locally started exchanges.
//! Its packets go through the priority lane of the outbound queue, so they never wait behind
//! application packets.

use definitions::{
    algorithms::{KeyExchangeData, KeyExchangeResponse},
    Compose,
};
use num_bigint::BigInt;
use rand::{rngs::StdRng, RngCore};
use std::{mem, sync::Arc};
use tokio::{sync::watch, time::Instant};
use tracing::{debug, trace};

use crate::{
    algorithm_context::AlgorithmContext,
    algorithms::{AvailableAlgorithms, KeyExchangeAlgorithmEntry, NegotiatedAlgorithms},
    errors::{ProtocolViolation, TransportError},
    input::Packet,
    messages,
    queue::{OutboundQueue, SentReceiver},
};

use self::negotiation::{negotiate, parse_peer_kexinit, KexInit};

mod negotiation;

/// A key exchange whose algorithms were negotiated.
#[derive(Debug)]
struct Exchange {
    /// The negotiated algorithms.
    negotiated: NegotiatedAlgorithms,
    /// The running key exchange algorithm.
    kex: KeyExchangeAlgorithmEntry,
    /// The payload of the own `SSH_MSG_KEXINIT`.
    own_kexinit: Vec<u8>,
    /// The payload of the `SSH_MSG_KEXINIT` of the other party.
    peer_kexinit: Vec<u8>,
    /// Whether the next key exchange packet is a wrong guess of the other party.
    discard_next: bool,
}

/// The progress of the current key exchange.
#[derive(Debug)]
enum KexState {
    /// No key exchange is running.
    Idle,
    /// The own `SSH_MSG_KEXINIT` was sent.
    InitSent,
    /// The `SSH_MSG_KEXINIT` of the other party arrived first.
    InitReceived,
    /// Both `SSH_MSG_KEXINIT` messages were exchanged and the algorithm specific part runs.
    AlgorithmsChosen(Box<Exchange>),
    /// New algorithms were staged and `SSH_MSG_NEWKEYS` was queued.
    KeysStaged,
}

/// Performs the key exchanges of one connection.
#[derive(Debug)]
pub(crate) struct KexEngine {
    /// The state of the current key exchange.
    state: KexState,
    /// The algorithms available for negotiation.
    available: AvailableAlgorithms,
    /// The own `SSH_MSG_KEXINIT` of the current key exchange and its payload.
    own: Option<(KexInit<'static>, Vec<u8>)>,
    /// The own identification line without `"\r\n"`.
    client_identification: Vec<u8>,
    /// The identification line of the other party without `"\r\n"`.
    server_identification: Vec<u8>,
    /// The exchange hash of the first key exchange.
    session_id: Option<Vec<u8>>,
    /// The source of the cookies and the ephemeral keys.
    rng: StdRng,
    /// The queue the key exchange packets are sent through.
    queue: Arc<OutboundQueue>,
    /// Receives the staged algorithms.
    context: Arc<AlgorithmContext>,
    /// Resolves once the last key exchange packet was written.
    in_flight: Option<SentReceiver>,
    /// The number of installed key exchanges this engine has seen complete.
    handshakes_seen: u64,
    /// Publishes when the current key exchange started.
    kex_started: watch::Sender<Option<Instant>>,
}

impl KexEngine {
    /// Creates a new engine and returns a receiver for the start times of key exchanges.
    pub(crate) fn new(
        available: AvailableAlgorithms,
        client_identification: Vec<u8>,
        server_identification: Vec<u8>,
        queue: Arc<OutboundQueue>,
        context: Arc<AlgorithmContext>,
        rng: StdRng,
    ) -> (KexEngine, watch::Receiver<Option<Instant>>) {
        let (kex_started, started_receiver) = watch::channel(None);

        let engine = KexEngine {
            state: KexState::Idle,
            available,
            own: None,
            client_identification,
            server_identification,
            session_id: None,
            rng,
            queue,
            context,
            in_flight: None,
            handshakes_seen: 0,
            kex_started,
        };

        (engine, started_receiver)
    }

    /// Returns the session identifier, once the first key exchange finished.
    pub(crate) fn session_id(&self) -> Option<&[u8]> {
        self.session_id.as_deref()
    }

    /// Returns `true` if no key exchange is running.
    pub(crate) fn is_idle(&self) -> bool {
        matches!(self.state, KexState::Idle)
    }

    /// Queues a key exchange packet once the previous one was written.
    async fn send_control(
        &mut self,
        payload: Vec<u8>,
        ends_priority_only: bool,
    ) -> Result<(), TransportError> {
        if let Some(previous) = self.in_flight.take() {
            previous.await.map_err(|_| TransportError::NotConnected)??;
        }

        self.in_flight = Some(self.queue.push_priority(payload, ends_priority_only)?);

        Ok(())
    }

    /// Returns the engine to the idle state once both directions use the staged algorithms.
    ///
    /// Returns `true` if a key exchange was completed by this call.
    pub(crate) fn check_kex_done(&mut self) -> bool {
        if !matches!(self.state, KexState::KeysStaged) {
            return false;
        }

        let installed = self.context.handshakes_installed();
        if installed <= self.handshakes_seen {
            return false;
        }

        self.handshakes_seen = installed;
        self.state = KexState::Idle;
        self.kex_started.send_replace(None);

        debug!(handshakes = installed, "key exchange complete");

        true
    }

    /// Composes and queues the own `SSH_MSG_KEXINIT`.
    ///
    /// Normal packets are held back until the key exchange is finished.
    async fn send_kexinit(&mut self) -> Result<(), TransportError> {
        let mut cookie = [0; 16];
        self.rng.fill_bytes(&mut cookie);

        let kexinit = KexInit::from_available(&self.available, cookie);
        let payload = kexinit.compose_to_vec();
        self.own = Some((kexinit, payload.clone()));

        self.queue.begin_priority_only();
        self.kex_started.send_replace(Some(Instant::now()));
        trace!("sending key exchange init");

        self.send_control(payload, false).await
    }

    /// Starts a key exchange unless one is already running.
    ///
    /// Returns `true` if a new key exchange was started.
    pub(crate) async fn try_init_kex(&mut self) -> Result<bool, TransportError> {
        self.check_kex_done();

        if !matches!(self.state, KexState::Idle) {
            return Ok(false);
        }

        self.state = KexState::InitSent;
        self.send_kexinit().await?;

        debug!("started key exchange");

        Ok(true)
    }

    /// Processes the `SSH_MSG_KEXINIT` of the other party.
    ///
    /// Sends the own `SSH_MSG_KEXINIT` if that did not happen yet, negotiates the algorithms and
    /// sends the first packet of the key exchange algorithm.
    pub(crate) async fn process_incoming_kexinit(
        &mut self,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.check_kex_done();

        match self.state {
            KexState::Idle => {
                self.state = KexState::InitReceived;
                self.send_kexinit().await?;
            }
            KexState::InitSent => self.state = KexState::InitReceived,
            KexState::InitReceived | KexState::AlgorithmsChosen(_) | KexState::KeysStaged => {
                return Err(ProtocolViolation::UnexpectedKexInit.into())
            }
        }

        let (own, own_kexinit) = self.own.take().ok_or(TransportError::InvalidOperation(
            "the own key exchange init was not sent",
        ))?;

        let (negotiated, wrong_guess) = {
            let peer = parse_peer_kexinit(&payload)?;
            let negotiated = negotiate(&own, &peer, &self.available)?;

            (negotiated, peer.guess_is_wrong(&own))
        };

        debug!(
            kex = negotiated.kex,
            host_key = negotiated.host_key,
            encryption_c2s = negotiated.encryption_c2s,
            encryption_s2c = negotiated.encryption_s2c,
            mac_c2s = negotiated.mac_c2s.unwrap_or("<implicit>"),
            mac_s2c = negotiated.mac_s2c.unwrap_or("<implicit>"),
            "negotiated algorithms"
        );

        let mut kex = self
            .available
            .kex
            .algorithm(negotiated.kex)
            .ok_or(TransportError::InvalidOperation(
                "negotiated key exchange algorithm is not available",
            ))?
            .instantiate();

        let first_packet = kex.start(
            &KeyExchangeData {
                client_identification: &self.client_identification,
                server_identification: &self.server_identification,
                client_kexinit: &own_kexinit,
                server_kexinit: &payload,
            },
            &mut self.rng,
        );

        self.state = KexState::AlgorithmsChosen(Box::new(Exchange {
            negotiated,
            kex,
            own_kexinit,
            peer_kexinit: payload,
            discard_next: wrong_guess,
        }));

        self.send_control(first_packet, false).await
    }

    /// Passes a key exchange method specific packet to the running key exchange.
    ///
    /// Returns `false` if no running key exchange wanted the packet.
    pub(crate) async fn filter_packet(&mut self, packet: &Packet) -> Result<bool, TransportError> {
        let message_number = packet.message_number();

        let (response, negotiated) = {
            let exchange = match &mut self.state {
                KexState::AlgorithmsChosen(exchange) => exchange,
                _ => return Ok(false),
            };

            if mem::take(&mut exchange.discard_next) {
                trace!(message_number, "discarding wrongly guessed key exchange packet");
                return Ok(true);
            }

            if !exchange.kex.handles_message(message_number) {
                return Ok(false);
            }

            let host_key = self
                .available
                .host_key
                .algorithm(exchange.negotiated.host_key)
                .ok_or(TransportError::InvalidOperation(
                    "negotiated host key algorithm is not available",
                ))?;

            let data = KeyExchangeData {
                client_identification: &self.client_identification,
                server_identification: &self.server_identification,
                client_kexinit: &exchange.own_kexinit,
                server_kexinit: &exchange.peer_kexinit,
            };

            let response = exchange.kex.filter_packet(&packet.payload, &data, host_key)?;

            (response, exchange.negotiated.clone())
        };

        match response {
            KeyExchangeResponse::Packet(payload) => self.send_control(payload, false).await?,
            KeyExchangeResponse::Finished {
                shared_secret,
                exchange_hash,
                ..
            } => {
                self.finish_key_exchange(&negotiated, shared_secret, exchange_hash)
                    .await?
            }
        }

        Ok(true)
    }

    /// Derives the new keys, stages the new algorithms and sends `SSH_MSG_NEWKEYS`.
    async fn finish_key_exchange(
        &mut self,
        negotiated: &NegotiatedAlgorithms,
        shared_secret: BigInt,
        exchange_hash: Vec<u8>,
    ) -> Result<(), TransportError> {
        let session_id = self
            .session_id
            .get_or_insert_with(|| exchange_hash.clone());

        let (write, read) = self.available.load_packet_algorithms(
            negotiated,
            &shared_secret,
            &exchange_hash,
            session_id,
        )?;
        self.context.stage(read, write)?;
        self.state = KexState::KeysStaged;

        debug!("staged new keys");

        self.send_control(messages::new_keys(), true).await
    }
}

#[cfg(all(test, feature = "default-algorithms"))]
mod tests {
    use super::*;
    use crate::errors::NegotiationError;
    use definitions::consts::message_numbers::{
        SSH_MSG_KEXINIT, SSH_MSG_KEX_ECDH_INIT, SSH_MSG_KEX_ECDH_REPLY,
    };
    use rand::SeedableRng;
    use tokio::sync::mpsc;

    /// Creates an engine and a task that acts as the writer, reporting every packet.
    fn engine() -> (KexEngine, mpsc::UnboundedReceiver<Vec<u8>>, Arc<OutboundQueue>) {
        let queue = Arc::new(OutboundQueue::new(4));
        let (sent, written) = mpsc::unbounded_channel();

        tokio::spawn({
            let queue = queue.clone();
            async move {
                while let Some(outgoing) = queue.pop().await {
                    let _ = sent.send(outgoing.payload.clone());
                    outgoing.complete(Ok(()));
                }
            }
        });

        let (engine, _) = KexEngine::new(
            AvailableAlgorithms::default(),
            b"SSH-2.0-client".to_vec(),
            b"SSH-2.0-server".to_vec(),
            queue.clone(),
            Arc::new(AlgorithmContext::new()),
            StdRng::seed_from_u64(4253),
        );

        (engine, written, queue)
    }

    fn server_kexinit(first_kex_packet_follows: bool) -> Vec<u8> {
        let mut kexinit = KexInit::from_available(&AvailableAlgorithms::default(), [7; 16]);
        kexinit.kex.reverse();
        kexinit.first_kex_packet_follows = first_kex_packet_follows;

        kexinit.compose_to_vec()
    }

    fn packet(payload: &[u8]) -> Packet {
        Packet {
            sequence_number: 3,
            payload: payload.to_vec(),
            padding_length: 4,
        }
    }

    #[tokio::test]
    async fn starts_only_one_exchange() {
        let (mut engine, mut written, _queue) = engine();

        assert!(engine.try_init_kex().await.unwrap());
        assert!(!engine.try_init_kex().await.unwrap());
        assert!(!engine.is_idle());

        assert_eq!(written.recv().await.unwrap()[0], SSH_MSG_KEXINIT);
        assert!(engine.session_id().is_none());
    }

    #[tokio::test]
    async fn answers_the_peer() {
        let (mut engine, mut written, _queue) = engine();

        engine
            .process_incoming_kexinit(server_kexinit(false))
            .await
            .unwrap();

        assert_eq!(written.recv().await.unwrap()[0], SSH_MSG_KEXINIT);
        let init = written.recv().await.unwrap();
        assert_eq!(init[0], SSH_MSG_KEX_ECDH_INIT);
        assert_eq!(init.len(), 1 + 4 + 32);

        assert!(matches!(
            engine.process_incoming_kexinit(server_kexinit(false)).await,
            Err(TransportError::ProtocolViolation(
                ProtocolViolation::UnexpectedKexInit
            ))
        ));
    }

    #[tokio::test]
    async fn rejects_incompatible_peers() {
        let (mut engine, _written, _queue) = engine();
        engine.try_init_kex().await.unwrap();

        let mut kexinit = KexInit::from_available(&AvailableAlgorithms::default(), [7; 16]);
        kexinit.kex = vec!["diffie-hellman-group1-sha1"];

        assert!(matches!(
            engine
                .process_incoming_kexinit(kexinit.compose_to_vec())
                .await,
            Err(TransportError::Negotiation(
                NegotiationError::NoKexAlgorithmMatch
            ))
        ));
    }

    #[tokio::test]
    async fn wrong_guesses_are_discarded() {
        let (mut engine, _written, _queue) = engine();
        engine.try_init_kex().await.unwrap();
        engine
            .process_incoming_kexinit(server_kexinit(true))
            .await
            .unwrap();

        let garbage = packet(&[SSH_MSG_KEX_ECDH_REPLY, 0, 0]);
        assert!(engine.filter_packet(&garbage).await.unwrap());

        assert!(!engine.filter_packet(&packet(&[40])).await.unwrap());
        assert!(matches!(
            engine.filter_packet(&garbage).await,
            Err(TransportError::Negotiation(NegotiationError::KeyExchange(_)))
        ));
    }

    #[tokio::test]
    async fn ignores_packets_without_exchange() {
        let (mut engine, _written, _queue) = engine();

        assert!(!engine
            .filter_packet(&packet(&[SSH_MSG_KEX_ECDH_REPLY]))
            .await
            .unwrap());
        assert!(!engine.check_kex_done());
    }

    #[tokio::test]
    async fn closed_queue_fails_the_exchange() {
        let (mut engine, _written, queue) = engine();
        queue.close();

        assert!(matches!(
            engine.try_init_kex().await,
            Err(TransportError::NotConnected)
        ));
    }
}
