use definitions::consts::message_numbers::{
    SSH_MSG_CHANNEL_DATA, SSH_MSG_DISCONNECT, SSH_MSG_IGNORE, SSH_MSG_KEXINIT,
    SSH_MSG_SERVICE_ACCEPT, SSH_MSG_SERVICE_REQUEST,
};
use slimssh_transport::{
    errors::{DisconnectReason, TimeoutKind, TransportError},
    ConnectionState, Transport,
};
use std::time::Duration;
use tokio::io::duplex;

use fake_server::{client_config, client_config_builder, init_logging, FakeServer, ServerOffer};

mod fake_server;

const SERVICE_REQUEST: &[u8] = b"\x05\x00\x00\x00\x0cssh-userauth";
const SERVICE_ACCEPT: &[u8] = b"\x06\x00\x00\x00\x0cssh-userauth";

/// The disconnect reason code of `SSH_DISCONNECT_KEY_EXCHANGE_FAILED`.
const KEY_EXCHANGE_FAILED: u32 = 3;
/// The disconnect reason code of `SSH_DISCONNECT_MAC_ERROR`.
const MAC_ERROR: u32 = 5;
/// The disconnect reason code of `SSH_DISCONNECT_BY_APPLICATION`.
const BY_APPLICATION: u32 = 11;

fn disconnect_reason(payload: &[u8]) -> u32 {
    assert_eq!(payload[0], SSH_MSG_DISCONNECT);
    u32::from_be_bytes([payload[1], payload[2], payload[3], payload[4]])
}

#[tokio::test]
async fn handshake_and_service_request() {
    init_logging();
    let (client, server) = duplex(1 << 16);

    let server = tokio::spawn(async move {
        let mut server = FakeServer::accept(server).await;
        assert!(server.client_identification().starts_with(b"SSH-2.0-"));

        server.key_exchange().await;
        assert_eq!(server.recv().await, SERVICE_REQUEST);
        server.send(&[SSH_MSG_IGNORE, 0, 0, 0, 0]).await;
        server.send(SERVICE_ACCEPT).await;

        assert_eq!(disconnect_reason(&server.recv().await), BY_APPLICATION);
        assert!(server.client_closed().await);

        server.session_id().unwrap().to_vec()
    });

    let mut transport = Transport::connect(client, client_config()).await.unwrap();
    assert_eq!(transport.state(), ConnectionState::Established);
    assert_eq!(transport.peer_version().software_version(), "FakeServer_1.0");
    assert_eq!(transport.session_id().len(), 32);

    transport.send(SERVICE_REQUEST.to_vec()).await.unwrap();
    assert_eq!(transport.recv().await.unwrap(), SERVICE_ACCEPT);
    assert_eq!(SERVICE_ACCEPT[0], SSH_MSG_SERVICE_ACCEPT);

    transport.shutdown("bye").await.unwrap();
    assert_eq!(transport.state(), ConnectionState::Closed);

    let session_id = server.await.unwrap();
    assert_eq!(transport.session_id(), &session_id[..]);
}

#[tokio::test]
async fn chunked_version_exchange() {
    init_logging();
    let (client, server) = duplex(1 << 16);

    let server = tokio::spawn(async move {
        let mut server =
            FakeServer::accept_with(server, "Welcome!\r\nPlease wait.\r\n", "SSH-2.0-Chunky", 3)
                .await;
        server.key_exchange().await;

        assert_eq!(disconnect_reason(&server.recv().await), BY_APPLICATION);
    });

    let transport = Transport::connect(client, client_config()).await.unwrap();
    assert_eq!(transport.peer_version().software_version(), "Chunky");
    assert_eq!(transport.peer_version().comment(), None);

    transport.shutdown("done").await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn client_requested_rekey_keeps_the_session_id() {
    init_logging();
    let (client, server) = duplex(1 << 16);

    let server = tokio::spawn(async move {
        let mut server = FakeServer::accept(server).await;
        let first_hash = server.key_exchange().await;

        let kexinit = server.recv().await;
        assert_eq!(kexinit[0], SSH_MSG_KEXINIT);
        let second_hash = server
            .key_exchange_with(&ServerOffer::default(), Some(kexinit))
            .await;
        assert_ne!(first_hash, second_hash);
        assert_eq!(server.session_id(), Some(&first_hash[..]));

        // Both sides only understand each other if the client derived the new keys with the
        // original session id.
        server.send(&[SSH_MSG_CHANNEL_DATA, 4, 5, 6]).await;
        assert_eq!(server.recv().await, [SSH_MSG_CHANNEL_DATA, 1, 2, 3]);
        server.send(&[SSH_MSG_CHANNEL_DATA, 9]).await;

        assert_eq!(disconnect_reason(&server.recv().await), BY_APPLICATION);
    });

    let mut transport = Transport::connect(client, client_config()).await.unwrap();
    let session_id = transport.session_id().to_vec();

    transport.rekey().unwrap();
    assert_eq!(
        transport.recv().await.unwrap(),
        [SSH_MSG_CHANNEL_DATA, 4, 5, 6]
    );
    transport
        .send(vec![SSH_MSG_CHANNEL_DATA, 1, 2, 3])
        .await
        .unwrap();
    assert_eq!(transport.recv().await.unwrap(), [SSH_MSG_CHANNEL_DATA, 9]);
    assert_eq!(transport.session_id(), &session_id[..]);

    transport.shutdown("done").await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn sending_many_bytes_triggers_a_key_exchange() {
    init_logging();
    let (client, server) = duplex(1 << 16);

    let server = tokio::spawn(async move {
        let mut server = FakeServer::accept(server).await;
        let first_hash = server.key_exchange().await;

        let mut received = 0;
        let kexinit = loop {
            let payload = server.recv().await;
            if payload[0] == SSH_MSG_KEXINIT {
                break payload;
            }
            assert_eq!(payload.len(), 900);
            received += 1;
        };
        assert!(received >= 2);

        server
            .key_exchange_with(&ServerOffer::default(), Some(kexinit))
            .await;
        assert_eq!(server.session_id(), Some(&first_hash[..]));

        while received < 3 {
            assert_eq!(server.recv().await.len(), 900);
            received += 1;
        }
        server.send(&[SSH_MSG_CHANNEL_DATA, 1]).await;

        assert_eq!(disconnect_reason(&server.recv().await), BY_APPLICATION);
    });

    let config = client_config_builder()
        .rekey_after_bytes(1500)
        .build()
        .unwrap();
    let mut transport = Transport::connect(client, config).await.unwrap();
    let session_id = transport.session_id().to_vec();

    for _ in 0..3 {
        transport
            .send(vec![SSH_MSG_CHANNEL_DATA; 900])
            .await
            .unwrap();
    }
    assert_eq!(transport.recv().await.unwrap(), [SSH_MSG_CHANNEL_DATA, 1]);
    assert_eq!(transport.session_id(), &session_id[..]);

    transport.shutdown("done").await.unwrap();
    server.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn keys_are_renewed_after_the_rekey_interval() {
    init_logging();
    let (client, server) = duplex(1 << 16);

    let server = tokio::spawn(async move {
        let mut server = FakeServer::accept(server).await;
        server.key_exchange().await;

        let kexinit = server.recv().await;
        assert_eq!(kexinit[0], SSH_MSG_KEXINIT);
        server
            .key_exchange_with(&ServerOffer::default(), Some(kexinit))
            .await;

        server.send(&[SSH_MSG_CHANNEL_DATA, 2]).await;
        assert_eq!(disconnect_reason(&server.recv().await), BY_APPLICATION);
    });

    let config = client_config_builder()
        .rekey_interval(Duration::from_secs(30))
        .build()
        .unwrap();
    let mut transport = Transport::connect(client, config).await.unwrap();

    assert_eq!(transport.recv().await.unwrap(), [SSH_MSG_CHANNEL_DATA, 2]);

    transport.shutdown("done").await.unwrap();
    server.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unanswered_key_exchanges_time_out() {
    init_logging();
    let (client, server) = duplex(1 << 16);

    let server = tokio::spawn(async move {
        let mut server = FakeServer::accept(server).await;
        server.key_exchange().await;

        assert_eq!(server.recv().await[0], SSH_MSG_KEXINIT);
        assert_eq!(disconnect_reason(&server.recv().await), KEY_EXCHANGE_FAILED);
        assert!(server.client_closed().await);
    });

    let config = client_config_builder()
        .kex_timeout(Some(Duration::from_secs(5)))
        .build()
        .unwrap();
    let transport = Transport::connect(client, config).await.unwrap();

    transport.rekey().unwrap();
    assert!(matches!(
        transport.wait_closed().await,
        Err(TransportError::Timeout(TimeoutKind::KeyExchange))
    ));
    assert_eq!(transport.state(), ConnectionState::Failed);

    server.await.unwrap();
}

#[tokio::test]
async fn the_server_may_start_a_key_exchange() {
    init_logging();
    let (client, server) = duplex(1 << 16);

    let server = tokio::spawn(async move {
        let mut server = FakeServer::accept(server).await;
        server.key_exchange().await;
        server.key_exchange().await;

        server.send(&[SSH_MSG_CHANNEL_DATA, 7]).await;
        assert_eq!(disconnect_reason(&server.recv().await), BY_APPLICATION);
    });

    let mut transport = Transport::connect(client, client_config()).await.unwrap();
    assert_eq!(transport.recv().await.unwrap(), [SSH_MSG_CHANNEL_DATA, 7]);

    transport.shutdown("done").await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn wrong_guesses_are_skipped() {
    init_logging();
    let (client, server) = duplex(1 << 16);

    let server = tokio::spawn(async move {
        let mut server = FakeServer::accept(server).await;
        let offer = ServerOffer {
            kex: vec!["curve25519-sha256@libssh.org", "curve25519-sha256"],
            first_kex_packet_follows: true,
        };
        server.key_exchange_with(&offer, None).await;

        server.send(&[SSH_MSG_CHANNEL_DATA, 8]).await;
        assert_eq!(disconnect_reason(&server.recv().await), BY_APPLICATION);
    });

    let mut transport = Transport::connect(client, client_config()).await.unwrap();
    assert_eq!(transport.recv().await.unwrap(), [SSH_MSG_CHANNEL_DATA, 8]);

    transport.shutdown("done").await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn peer_disconnect() {
    init_logging();
    let (client, server) = duplex(1 << 16);

    let server = tokio::spawn(async move {
        let mut server = FakeServer::accept(server).await;
        server.key_exchange().await;
        server.disconnect(2, "go away").await;
        server
    });

    let mut transport = Transport::connect(client, client_config()).await.unwrap();

    assert!(matches!(
        transport.recv().await,
        Err(TransportError::PeerDisconnected {
            reason: DisconnectReason::ProtocolError,
            ref description,
        }) if description == "go away"
    ));
    assert_eq!(transport.state(), ConnectionState::PeerDisconnected);
    assert!(matches!(
        transport.wait_closed().await,
        Err(TransportError::PeerDisconnected { .. })
    ));
    assert!(matches!(
        transport.send(SERVICE_REQUEST.to_vec()).await,
        Err(TransportError::PeerDisconnected { .. })
    ));

    drop(server.await.unwrap());
}

#[tokio::test]
async fn corrupted_packets_are_answered_with_a_disconnect() {
    init_logging();
    let (client, server) = duplex(1 << 16);

    let server = tokio::spawn(async move {
        let mut server = FakeServer::accept(server).await;
        server.key_exchange().await;
        server.send_corrupted(&[SSH_MSG_CHANNEL_DATA, 1]).await;

        assert_eq!(disconnect_reason(&server.recv().await), MAC_ERROR);
        assert!(server.client_closed().await);
    });

    let mut transport = Transport::connect(client, client_config()).await.unwrap();

    assert!(matches!(transport.recv().await, Err(TransportError::Crypto)));
    assert!(matches!(
        transport.wait_closed().await,
        Err(TransportError::Crypto)
    ));
    assert_eq!(transport.state(), ConnectionState::Failed);

    server.await.unwrap();
}

#[tokio::test]
async fn server_closing_the_stream() {
    init_logging();
    let (client, server) = duplex(1 << 16);

    let server = tokio::spawn(async move {
        let mut server = FakeServer::accept(server).await;
        server.key_exchange().await;
    });

    let mut transport = Transport::connect(client, client_config()).await.unwrap();
    server.await.unwrap();

    assert!(matches!(
        transport.recv().await,
        Err(TransportError::UnexpectedClose)
    ));
    assert_eq!(transport.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn send_rejects_transport_messages() {
    init_logging();
    let (client, server) = duplex(1 << 16);

    let server = tokio::spawn(async move {
        let mut server = FakeServer::accept(server).await;
        server.key_exchange().await;

        assert_eq!(server.recv().await[0], SSH_MSG_SERVICE_REQUEST);
        server.send(SERVICE_ACCEPT).await;
        assert_eq!(disconnect_reason(&server.recv().await), BY_APPLICATION);
    });

    let mut transport = Transport::connect(client, client_config()).await.unwrap();

    assert!(matches!(
        transport.send(vec![SSH_MSG_KEXINIT]).await,
        Err(TransportError::ReservedMessageNumber(SSH_MSG_KEXINIT))
    ));
    assert!(matches!(
        transport.send(vec![30, 0]).await,
        Err(TransportError::ReservedMessageNumber(30))
    ));
    assert!(matches!(
        transport.send(Vec::new()).await,
        Err(TransportError::InvalidPayloadLength(0))
    ));
    assert!(matches!(
        transport.send(vec![SSH_MSG_CHANNEL_DATA; 40000]).await,
        Err(TransportError::InvalidPayloadLength(40000))
    ));

    // Packets still queued when shutting down are discarded.
    transport.send(SERVICE_REQUEST.to_vec()).await.unwrap();
    assert_eq!(transport.recv().await.unwrap(), SERVICE_ACCEPT);

    transport.shutdown("done").await.unwrap();
    server.await.unwrap();
}

#[tokio::test]
async fn killing_skips_the_disconnect_message() {
    init_logging();
    let (client, server) = duplex(1 << 16);

    let server = tokio::spawn(async move {
        let mut server = FakeServer::accept(server).await;
        server.key_exchange().await;
        assert!(server.client_closed().await);
    });

    let transport = Transport::connect(client, client_config()).await.unwrap();
    transport.kill();

    assert_eq!(transport.state(), ConnectionState::Closed);
    assert!(transport.wait_closed().await.is_ok());
    assert!(matches!(
        transport.send(SERVICE_REQUEST.to_vec()).await,
        Err(TransportError::Killed)
    ));
    assert!(transport.rekey().is_err());

    drop(transport);
    server.await.unwrap();
}

#[tokio::test]
#[ignore = "needs the OpenSSH daemon"]
async fn handshake_with_openssh() {
    init_logging();
    let sshd = openssh::Sshd::launch().await;

    let stream = tokio::net::TcpStream::connect((std::net::Ipv4Addr::LOCALHOST, sshd.port))
        .await
        .expect("tcp connection to sshd could not be opened");
    stream.set_nodelay(true).unwrap();

    let mut transport = Transport::connect(stream, Default::default())
        .await
        .expect("could not exchange keys with sshd");

    transport.send(SERVICE_REQUEST.to_vec()).await.unwrap();
    assert_eq!(transport.recv().await.unwrap(), SERVICE_ACCEPT);
    transport.shutdown("done").await.unwrap();

    let output = sshd
        .run_to_completion()
        .await
        .expect("could not read output from sshd");
    assert!(output.contains("KEX done"));
}
