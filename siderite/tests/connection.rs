//! Connection level scenarios against a scripted peer

mod common;

use std::time::Duration;

use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

use siderite::connection::error::{Error, OpenError};
use siderite::frames::amqp::FrameBody;
use siderite::transport;
use siderite::Connection;
use siderite_types::definitions::{AmqpError, Error as AmqpDefError, ErrorCondition};
use siderite_types::performatives::{Close, End, Open};

use common::MockPeer;

#[tokio::test]
async fn open_and_close_handshake() {
    let (client_io, server_io) = duplex(8192);
    let client = tokio::spawn(async move {
        Connection::builder()
            .container_id("it-client")
            .open_with_stream(client_io)
            .await
    });

    let mut peer = MockPeer::accept_amqp(server_io).await;
    let open = peer.handle_open().await;
    assert_eq!(open.container_id, "it-client");

    let connection = client.await.unwrap().unwrap();

    let closing = tokio::spawn(connection.close());
    peer.handle_close().await;
    closing.await.unwrap().unwrap();
}

#[tokio::test]
async fn max_frame_size_is_negotiated_down() {
    let (client_io, server_io) = duplex(8192);
    let client = tokio::spawn(async move {
        Connection::builder()
            .container_id("it-client")
            .max_frame_size(65_536)
            .open_with_stream(client_io)
            .await
    });

    let mut peer = MockPeer::accept_amqp(server_io).await;
    let frame = peer.recv().await;
    assert!(matches!(frame.body, FrameBody::Open(_)));
    peer.send(
        0,
        FrameBody::Open(Open {
            container_id: "mock-peer".to_string(),
            max_frame_size: siderite_types::performatives::MaxFrameSize(4096),
            ..Default::default()
        }),
    )
    .await;

    let connection = client.await.unwrap().unwrap();
    assert_eq!(connection.max_frame_size(), 4096);

    let closing = tokio::spawn(connection.close());
    peer.handle_close().await;
    closing.await.unwrap().unwrap();
}

#[tokio::test]
async fn mismatched_protocol_header_fails_open() {
    let (client_io, mut server_io) = duplex(1024);
    let client = tokio::spawn(async move {
        Connection::builder()
            .container_id("it-client")
            .open_with_stream(client_io)
            .await
    });

    let mut header = [0u8; 8];
    server_io.read_exact(&mut header).await.unwrap();
    assert_eq!(&header[..4], b"AMQP");
    // answer with a SASL header the client did not ask for
    server_io
        .write_all(&[b'A', b'M', b'Q', b'P', 3, 1, 0, 0])
        .await
        .unwrap();

    let result = client.await.unwrap();
    assert!(matches!(
        result,
        Err(OpenError::Transport(
            transport::error::Error::UnexpectedProtocolHeader(_)
        ))
    ));
}

#[tokio::test]
async fn remote_close_during_open_is_reported() {
    let (client_io, server_io) = duplex(8192);
    let client = tokio::spawn(async move {
        Connection::builder()
            .container_id("it-client")
            .open_with_stream(client_io)
            .await
    });

    let mut peer = MockPeer::accept_amqp(server_io).await;
    let frame = peer.recv().await;
    assert!(matches!(frame.body, FrameBody::Open(_)));
    peer.send(
        0,
        FrameBody::Close(Close {
            error: Some(AmqpDefError::new(
                AmqpError::NotAllowed,
                Some("go away".to_string()),
            )),
        }),
    )
    .await;

    let result = client.await.unwrap();
    match result {
        Ok(_) => panic!("open should have failed"),
        Err(OpenError::RemoteClosed { error: Some(error) }) => {
            assert_eq!(error.description.as_deref(), Some("go away"));
        }
        Err(other) => panic!("expected a remote close, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn silent_peer_times_out_the_open() {
    let (client_io, server_io) = duplex(1024);
    let client = tokio::spawn(async move {
        Connection::builder()
            .container_id("it-client")
            .open_with_stream(client_io)
            .await
    });

    // the peer completes the header exchange and then goes quiet
    let _peer = MockPeer::accept_amqp(server_io).await;

    let result = client.await.unwrap();
    assert!(matches!(result, Err(OpenError::OpenTimeout)));
}

#[tokio::test]
async fn frame_on_unknown_channel_closes_with_not_found() {
    let (client_io, server_io) = duplex(8192);
    let client = tokio::spawn(async move {
        Connection::builder()
            .container_id("it-client")
            .open_with_stream(client_io)
            .await
    });

    let mut peer = MockPeer::accept_amqp(server_io).await;
    peer.handle_open().await;
    let _connection = client.await.unwrap().unwrap();

    // no session is mapped on channel 7
    peer.send(7, FrameBody::End(End::default())).await;

    let frame = peer.recv().await;
    match frame.body {
        FrameBody::Close(close) => {
            let error = close.error.expect("close must carry the condition");
            assert_eq!(error.condition, ErrorCondition::Amqp(AmqpError::NotFound));
        }
        other => panic!("expected close, got {other:?}"),
    }
}

#[tokio::test]
async fn remote_initiated_close_is_surfaced() {
    let (client_io, server_io) = duplex(8192);
    let client = tokio::spawn(async move {
        Connection::builder()
            .container_id("it-client")
            .open_with_stream(client_io)
            .await
    });

    let mut peer = MockPeer::accept_amqp(server_io).await;
    peer.handle_open().await;
    let connection = client.await.unwrap().unwrap();

    peer.send(
        0,
        FrameBody::Close(Close {
            error: Some(AmqpDefError::new(
                AmqpError::ResourceLimitExceeded,
                Some("kicked".to_string()),
            )),
        }),
    )
    .await;
    let frame = peer.recv().await;
    assert!(matches!(frame.body, FrameBody::Close(_)));

    let result = connection.close().await;
    match result {
        Err(Error::RemoteClosedWithError(error)) => {
            assert_eq!(error.description.as_deref(), Some("kicked"));
        }
        other => panic!("expected the remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn heartbeats_follow_the_remote_idle_time_out() {
    let (client_io, server_io) = duplex(8192);
    let client = tokio::spawn(async move {
        Connection::builder()
            .container_id("it-client")
            .open_with_stream(client_io)
            .await
    });

    let mut peer = MockPeer::accept_amqp(server_io).await;
    let frame = peer.recv().await;
    assert!(matches!(frame.body, FrameBody::Open(_)));
    peer.send(
        0,
        FrameBody::Open(Open {
            container_id: "mock-peer".to_string(),
            idle_time_out: Some(200),
            ..Default::default()
        }),
    )
    .await;
    let connection = client.await.unwrap().unwrap();

    // empty frames must arrive at half the advertised period
    let frame = tokio::time::timeout(Duration::from_millis(500), peer.recv())
        .await
        .expect("heartbeat due within the idle period");
    assert!(matches!(frame.body, FrameBody::Empty));

    let closing = tokio::spawn(connection.close());
    loop {
        let frame = peer.recv().await;
        match frame.body {
            FrameBody::Empty => continue,
            FrameBody::Close(_) => break,
            other => panic!("unexpected frame {other:?}"),
        }
    }
    peer.send(0, FrameBody::Close(Close::default())).await;
    closing.await.unwrap().unwrap();
}
