//! Runs a connection as a set of cooperating tasks.
//!
//! A connection consists of
//! - a reader, which decrypts incoming packets and dispatches them,
//! - a writer, which encrypts the packets taken from the outbound queue,
//! - a timer, which starts key exchanges and enforces the key exchange timeout.
//!
//! A supervisor waits for the first of them to fail and tears the connection down.

use definitions::consts::{
    message_numbers::{
        SSH_MSG_DEBUG, SSH_MSG_DISCONNECT, SSH_MSG_IGNORE, SSH_MSG_KEXINIT, SSH_MSG_NEWKEYS,
        SSH_MSG_SERVICE_ACCEPT, SSH_MSG_SERVICE_REQUEST, SSH_MSG_UNIMPLEMENTED,
    },
    MessageType,
};
use rand::{rngs::StdRng, SeedableRng};
use std::{future::Future, sync::Arc};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    sync::{mpsc, watch, Mutex, Notify},
    task::{AbortHandle, JoinHandle, JoinSet},
    time::{self, Instant},
};
use tracing::{debug, trace, warn};

use crate::{
    algorithm_context::AlgorithmContext,
    algorithms::DirectionAlgorithms,
    config::{Settings, TransportConfig},
    constants::{DISCONNECT_FLUSH_TIMEOUT, MAX_PAYLOAD_SIZE},
    errors::{DisconnectReason, ProtocolViolation, TimeoutKind, TransportError},
    input::{InputBuffer, Packet},
    kex::KexEngine,
    messages::{self, DebugMessage, Disconnect, Unimplemented},
    padding_length::PaddingLengthDistribution,
    queue::OutboundQueue,
    state::{ConnectionState, StateCell},
    version::VersionInformation,
    writer::WriterOutputStream,
};

/// The tasks of a connection.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum TaskKind {
    Reader,
    Writer,
    Timer,
}

type TaskResult = (TaskKind, Result<(), TransportError>);

/// The state shared by all tasks of a connection.
#[derive(Debug)]
struct Shared {
    /// The settings of the connection.
    settings: Settings,
    /// The lifecycle of the connection.
    state: StateCell,
    /// The packets waiting to be written.
    queue: Arc<OutboundQueue>,
    /// The algorithms staged for the packet tasks.
    context: Arc<AlgorithmContext>,
    /// The key exchange engine.
    ///
    /// The writer never locks it, so the engine may wait for its packets to be written.
    kex: Mutex<KexEngine>,
    /// Asks the timer to start a key exchange.
    rekey: Notify,
}

impl Shared {
    /// Wakes the timer if `total` just crossed the rekey threshold.
    fn count_bytes(&self, total: u64, added: usize) {
        let threshold = self.settings.rekey_after_bytes;

        if total >= threshold && total - (added as u64) < threshold {
            debug!(total, "byte limit reached, requesting key exchange");
            self.rekey.notify_one();
        }
    }
}

/// Returns `true` if the application may send or receive the given message number.
fn is_service_message(message_number: u8) -> bool {
    matches!(
        message_number,
        SSH_MSG_SERVICE_REQUEST | SSH_MSG_SERVICE_ACCEPT
    ) || matches!(
        MessageType::from_number(message_number),
        MessageType::Service | MessageType::Reserved | MessageType::LocalExtension
    )
}

/// Runs `future` until the optional deadline passes.
async fn within<F: Future>(
    deadline: Option<Instant>,
    future: F,
) -> Result<F::Output, TransportError> {
    match deadline {
        Some(deadline) => time::timeout_at(deadline, future)
            .await
            .map_err(|_| TransportError::Timeout(TimeoutKind::Connect)),
        None => Ok(future.await),
    }
}

/// Sleeps until the deadline, or forever if there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Sends the own identification line and reads the one of the other party.
async fn exchange_versions<R, W>(
    input: &mut R,
    output: &mut W,
    version: &VersionInformation,
    padding: PaddingLengthDistribution,
) -> Result<(InputBuffer, WriterOutputStream, VersionInformation, Vec<u8>), TransportError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut writer = WriterOutputStream::new(padding);
    writer.write_identification(version);

    let written = writer.written_data().len();
    output.write_all(writer.written_data()).await?;
    output.flush().await?;
    writer.remove_to(written);

    let mut buffer = InputBuffer::new();
    let (peer_version, peer_identification) = loop {
        if let Some(identification) = buffer.read_identification()? {
            break identification;
        }

        buffer.read_more_data(input).await?;
    };

    debug!(peer = %peer_version, "exchanged versions");

    Ok((buffer, writer, peer_version, peer_identification))
}

/// Reads packets until the connection ends.
async fn read_loop<R: AsyncRead + Unpin>(
    shared: Arc<Shared>,
    mut input: R,
    mut buffer: InputBuffer,
    application: mpsc::Sender<Vec<u8>>,
) -> Result<(), TransportError> {
    let mut algorithms = DirectionAlgorithms::plaintext();

    loop {
        let packet =
            match buffer.read_packet(&mut algorithms, shared.settings.max_packet_size)? {
                Some(packet) => packet,
                None => match buffer.read_more_data(&mut input).await {
                    Ok(_) => continue,
                    Err(TransportError::UnexpectedClose)
                        if shared.state.get() == ConnectionState::SelfDisconnecting =>
                    {
                        return Ok(())
                    }
                    Err(err) => return Err(err),
                },
            };

        let consumed = buffer.consumed_bytes();
        shared.count_bytes(shared.context.add_bytes_read(consumed), consumed);

        match dispatch(&shared, &mut algorithms, packet, &application).await {
            // The key exchange was cut short by a local shutdown.
            Err(TransportError::NotConnected)
                if shared.state.get() == ConnectionState::SelfDisconnecting =>
            {
                return Ok(())
            }
            result => result?,
        }
    }
}

/// Handles a single incoming packet.
async fn dispatch(
    shared: &Shared,
    algorithms: &mut DirectionAlgorithms,
    packet: Packet,
    application: &mpsc::Sender<Vec<u8>>,
) -> Result<(), TransportError> {
    let message_number = packet.message_number();

    if MessageType::from_number(message_number) == MessageType::KeyExchangeMethodSpecific {
        let handled = shared.kex.lock().await.filter_packet(&packet).await?;

        return if handled {
            Ok(())
        } else {
            Err(ProtocolViolation::UnexpectedPacket(message_number).into())
        };
    }

    match message_number {
        SSH_MSG_KEXINIT => {
            shared
                .kex
                .lock()
                .await
                .process_incoming_kexinit(packet.payload)
                .await?;
        }
        SSH_MSG_NEWKEYS => {
            if !messages::is_new_keys(&packet.payload) {
                return Err(ProtocolViolation::InvalidMessage(message_number).into());
            }

            if shared.context.activate_next_read(algorithms)? {
                shared.state.transition(ConnectionState::Established);
            }
            shared.kex.lock().await.check_kex_done();
        }
        SSH_MSG_DISCONNECT => {
            let disconnect: Disconnect = messages::parse_message(&packet.payload)?;
            debug!(
                reason = %disconnect.reason,
                description = disconnect.description,
                "the other party disconnected"
            );

            let err = TransportError::PeerDisconnected {
                reason: disconnect.reason,
                description: disconnect.description.to_string(),
            };
            shared.state.peer_disconnected(err.clone());

            return Err(err);
        }
        SSH_MSG_IGNORE => trace!(len = packet.payload.len(), "ignoring packet"),
        SSH_MSG_DEBUG => {
            let message: DebugMessage = messages::parse_message(&packet.payload)?;
            debug!(
                always_display = message.always_display,
                message = message.message,
                "debug message from the other party"
            );
        }
        SSH_MSG_UNIMPLEMENTED => {
            let unimplemented: Unimplemented = messages::parse_message(&packet.payload)?;

            return Err(ProtocolViolation::Unimplemented(unimplemented.sequence_number).into());
        }
        number
            if is_service_message(number)
                && shared.state.get() == ConnectionState::Established =>
        {
            // The application may have dropped its receiver.
            let _ = application.send(packet.payload).await;
        }
        number => return Err(ProtocolViolation::UnexpectedPacket(number).into()),
    }

    Ok(())
}

/// Writes the packets from the outbound queue until it is closed.
async fn write_loop<W: AsyncWrite + Unpin>(
    shared: Arc<Shared>,
    mut output: W,
    mut stream: WriterOutputStream,
) -> Result<(), TransportError> {
    let mut algorithms = DirectionAlgorithms::plaintext();
    let mut rng = StdRng::from_entropy();

    while let Some(outgoing) = shared.queue.pop().await {
        let result = write_one(
            &shared,
            &mut output,
            &mut stream,
            &mut algorithms,
            &mut rng,
            &outgoing.payload,
        )
        .await;

        match result {
            Ok(()) => outgoing.complete(Ok(())),
            Err(err) => {
                outgoing.complete(Err(err.clone()));
                return Err(err);
            }
        }
    }

    if let Err(err) = output.shutdown().await {
        warn!(%err, "failed to shut down the stream");
    }

    Ok(())
}

/// Encrypts and writes a single packet.
async fn write_one<W: AsyncWrite + Unpin>(
    shared: &Shared,
    output: &mut W,
    stream: &mut WriterOutputStream,
    algorithms: &mut DirectionAlgorithms,
    rng: &mut StdRng,
    payload: &[u8],
) -> Result<(), TransportError> {
    let sequence_number = stream.sequence_number();
    stream.write_packet(payload, algorithms, rng)?;

    let len = stream.written_data().len();
    output.write_all(stream.written_data()).await?;
    output.flush().await?;
    stream.remove_to(len);

    trace!(
        sequence_number,
        message_number = payload[0],
        len = payload.len(),
        "sent packet"
    );

    shared.count_bytes(shared.context.add_bytes_written(len), len);

    if messages::is_new_keys(payload) && shared.context.activate_next_write(algorithms)? {
        shared.state.transition(ConnectionState::Established);
    }

    Ok(())
}

/// Starts key exchanges when they are due and enforces the key exchange timeout.
async fn rekey_loop(
    shared: Arc<Shared>,
    mut kex_started: watch::Receiver<Option<Instant>>,
) -> Result<(), TransportError> {
    let interval = shared.settings.rekey_interval;
    let mut next_rekey = Instant::now() + interval;

    loop {
        let kex_deadline = kex_started
            .borrow_and_update()
            .zip(shared.settings.kex_timeout)
            .map(|(started, timeout)| started + timeout);

        tokio::select! {
            _ = time::sleep_until(next_rekey) => debug!("rekey interval elapsed"),
            _ = shared.rekey.notified() => {}
            _ = sleep_until(kex_deadline) => {
                let mut engine = shared.kex.lock().await;
                if engine.check_kex_done() || engine.is_idle() {
                    continue;
                }

                return Err(TransportError::Timeout(TimeoutKind::KeyExchange));
            }
            changed = kex_started.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                continue;
            }
        }

        next_rekey = Instant::now() + interval;
        shared.kex.lock().await.try_init_kex().await?;
    }
}

/// Waits for the writer to finish, ignoring the other tasks.
async fn join_writer(tasks: &mut JoinSet<TaskResult>) {
    while let Some(joined) = tasks.join_next().await {
        if let Ok((TaskKind::Writer, result)) = joined {
            if let Err(err) = result {
                warn!(%err, "failed to write the disconnect message");
            }
            return;
        }
    }
}

/// Waits for the first task to fail and tears the connection down.
async fn supervise(shared: Arc<Shared>, mut tasks: JoinSet<TaskResult>, reader: AbortHandle) {
    let mut writer_alive = true;

    let failure = loop {
        match tasks.join_next().await {
            Some(Ok((kind, Ok(())))) => {
                trace!(task = ?kind, "task finished");
                if kind == TaskKind::Writer {
                    break None;
                }
            }
            Some(Ok((kind, Err(err)))) => {
                debug!(task = ?kind, %err, "task failed");
                writer_alive &= kind != TaskKind::Writer;
                break Some(err);
            }
            Some(Err(join_error)) if join_error.is_panic() => {
                break Some(TransportError::InvalidOperation(
                    "a connection task panicked",
                ));
            }
            Some(Err(_)) => {}
            None => break None,
        }
    };

    reader.abort();

    match failure {
        Some(err) => {
            shared.state.record_error(err.clone());

            match err.disconnect_reason() {
                Some(reason)
                    if writer_alive
                        && shared.state.transition(ConnectionState::SelfDisconnecting) =>
                {
                    debug!(%reason, "sending disconnect message");
                    shared
                        .queue
                        .close_with_packet(messages::disconnect(reason, &err.to_string()));
                }
                _ => shared.queue.close(),
            }

            if writer_alive && shared.state.get() == ConnectionState::SelfDisconnecting {
                if time::timeout(DISCONNECT_FLUSH_TIMEOUT, join_writer(&mut tasks))
                    .await
                    .is_err()
                {
                    warn!("the disconnect message was not written in time");
                }
            }

            tasks.shutdown().await;
            shared.state.transition(ConnectionState::Failed);
        }
        None => {
            shared.queue.close();
            tasks.shutdown().await;
            shared.state.transition(ConnectionState::Closed);
        }
    }

    debug!(state = %shared.state.get(), "connection ended");
}

/// A client side SSH transport connection.
///
/// Dropping the transport kills the connection.
#[derive(Debug)]
pub struct Transport {
    /// The state shared with the tasks.
    shared: Arc<Shared>,
    /// The messages for the application.
    incoming: mpsc::Receiver<Vec<u8>>,
    /// The version of the other party.
    peer_version: VersionInformation,
    /// The exchange hash of the first key exchange.
    session_id: Vec<u8>,
    /// The task supervising the connection.
    supervisor: JoinHandle<()>,
}

impl Transport {
    /// Establishes a connection over `stream`.
    ///
    /// Returns once the first key exchange finished.
    /// The connect timeout of `config` limits the whole setup, a connection that times out ends
    /// without a disconnect message.
    pub async fn connect<S>(stream: S, config: TransportConfig) -> Result<Transport, TransportError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let TransportConfig {
            settings,
            algorithms,
        } = config;

        let state = StateCell::new();
        state.transition(ConnectionState::Connecting);

        let deadline = settings.connect_timeout.map(|timeout| Instant::now() + timeout);
        let (mut input, mut output) = tokio::io::split(stream);

        let exchange = exchange_versions(
            &mut input,
            &mut output,
            &settings.version,
            PaddingLengthDistribution::new(settings.padding),
        );
        let (buffer, writer, peer_version, peer_identification) =
            match within(deadline, exchange).await.and_then(|result| result) {
                Ok(exchanged) => exchanged,
                Err(err) => {
                    state.record_error(err.clone());
                    state.transition(ConnectionState::Failed);
                    return Err(err);
                }
            };

        let queue = Arc::new(OutboundQueue::new(settings.queue_depth));
        let context = Arc::new(AlgorithmContext::new());
        let (engine, kex_started) = KexEngine::new(
            algorithms,
            settings.version.identification_line().into_bytes(),
            peer_identification,
            queue.clone(),
            context.clone(),
            StdRng::from_entropy(),
        );
        let (application, incoming) = mpsc::channel(settings.queue_depth);

        let shared = Arc::new(Shared {
            settings,
            state,
            queue,
            context,
            kex: Mutex::new(engine),
            rekey: Notify::new(),
        });

        shared.kex.lock().await.try_init_kex().await?;

        let mut tasks = JoinSet::new();
        let reader = tasks.spawn({
            let shared = shared.clone();
            async move {
                let result = read_loop(shared, input, buffer, application).await;
                (TaskKind::Reader, result)
            }
        });
        tasks.spawn({
            let shared = shared.clone();
            async move { (TaskKind::Writer, write_loop(shared, output, writer).await) }
        });
        tasks.spawn({
            let shared = shared.clone();
            async move { (TaskKind::Timer, rekey_loop(shared, kex_started).await) }
        });

        let supervisor = tokio::spawn(supervise(shared.clone(), tasks, reader));

        let mut changes = shared.state.subscribe();
        let established = async {
            loop {
                let current = *changes.borrow_and_update();
                // Failures after the first key exchange are reported by the transport itself.
                if shared.state.was_established() {
                    return Ok(());
                }
                if current.is_terminal() {
                    return Err(shared.state.unavailable());
                }
                if changes.changed().await.is_err() {
                    return Err(TransportError::NotConnected);
                }
            }
        };

        match within(deadline, established).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(err) => {
                supervisor.abort();
                shared.queue.close();
                shared.state.record_error(err.clone());
                shared.state.transition(ConnectionState::Failed);
                return Err(err);
            }
        }

        let session_id = shared
            .kex
            .lock()
            .await
            .session_id()
            .map(<[u8]>::to_vec)
            .ok_or(TransportError::InvalidOperation(
                "the connection was established without a session id",
            ))?;

        debug!("connection established");

        Ok(Transport {
            shared,
            incoming,
            peer_version,
            session_id,
            supervisor,
        })
    }

    /// Returns the version the other party sent.
    pub fn peer_version(&self) -> &VersionInformation {
        &self.peer_version
    }

    /// Returns the session identifier, the exchange hash of the first key exchange.
    pub fn session_id(&self) -> &[u8] {
        &self.session_id
    }

    /// Returns the current state of the connection.
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Sends a message to the other party.
    ///
    /// Only message numbers of the layers above the transport layer can be sent.
    /// Waits while the outbound queue is full.
    pub async fn send(&self, payload: Vec<u8>) -> Result<(), TransportError> {
        let message_number = match payload.first() {
            Some(&number) if payload.len() <= MAX_PAYLOAD_SIZE => number,
            _ => return Err(TransportError::InvalidPayloadLength(payload.len())),
        };
        if !is_service_message(message_number) {
            return Err(TransportError::ReservedMessageNumber(message_number));
        }
        if self.state() != ConnectionState::Established {
            return Err(self.shared.state.unavailable());
        }

        self.shared
            .queue
            .push(payload)
            .await
            .map_err(|_| self.shared.state.unavailable())
    }

    /// Receives the next message for the layers above the transport layer.
    ///
    /// Once the connection ended, the error that ended it is returned.
    pub async fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        match self.incoming.recv().await {
            Some(payload) => Ok(payload),
            None => match self.shared.state.wait_terminal().await {
                Ok(()) => Err(TransportError::NotConnected),
                Err(err) => Err(err),
            },
        }
    }

    /// Starts a key exchange, unless one is already running.
    pub fn rekey(&self) -> Result<(), TransportError> {
        if self.state() != ConnectionState::Established {
            return Err(self.shared.state.unavailable());
        }

        self.shared.rekey.notify_one();

        Ok(())
    }

    /// Sends a disconnect message with the given description and waits for the connection to
    /// close.
    pub async fn shutdown(&self, description: &str) -> Result<(), TransportError> {
        if self
            .shared
            .state
            .transition(ConnectionState::SelfDisconnecting)
        {
            debug!("shutting down");
            self.shared.queue.close_with_packet(messages::disconnect(
                DisconnectReason::ByApplication,
                description,
            ));
        }

        self.wait_closed().await
    }

    /// Tears the connection down immediately, without a disconnect message.
    pub fn kill(&self) {
        if self.shared.state.get().is_terminal() {
            return;
        }

        debug!("killing the connection");
        self.supervisor.abort();
        self.shared.queue.close();
        self.shared.state.record_error(TransportError::Killed);
        self.shared.state.transition(ConnectionState::Closed);
    }

    /// Waits until the connection ended.
    ///
    /// Returns the error that ended the connection, or `Ok(())` if it was closed locally.
    pub async fn wait_closed(&self) -> Result<(), TransportError> {
        self.shared.state.wait_terminal().await
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.kill();
    }
}
