//! End to end send and receive scenarios against a scripted peer

mod common;

use std::time::Duration;

use bytes::Bytes;
use tokio::io::duplex;

use siderite::frames::amqp::FrameBody;
use siderite::link::receiver::CreditMode;
use siderite::{Connection, Receiver, Sender, Session};
use siderite_types::definitions::{Handle, Role};
use siderite_types::messaging::{Accepted, DeliveryState, Message, Rejected};
use siderite_types::performatives::Transfer;

use common::MockPeer;

async fn open_connection(buffer: usize) -> (Connection, MockPeer) {
    let (client_io, server_io) = duplex(64 * 1024);
    let client = tokio::spawn(async move {
        Connection::builder()
            .container_id("it-client")
            .max_frame_size(512)
            .buffer_size(buffer)
            .open_with_stream(client_io)
            .await
    });
    let mut peer = MockPeer::accept_amqp(server_io).await;
    peer.handle_open().await;
    (client.await.unwrap().unwrap(), peer)
}

async fn teardown(
    connection: Connection,
    session: Session,
    mut peer: MockPeer,
    channel: u16,
) {
    let ending = tokio::spawn(session.end());
    peer.handle_end(channel).await;
    ending.await.unwrap().unwrap();

    let closing = tokio::spawn(connection.close());
    peer.handle_close().await;
    closing.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn silent_peer_times_out_the_begin() {
    let (mut connection, mut peer) = open_connection(32).await;

    let begin = tokio::spawn(async move {
        let result = Session::begin(&mut connection).await;
        (connection, result)
    });
    let frame = peer.recv().await;
    assert!(matches!(frame.body, FrameBody::Begin(_)));
    // the peer never maps the session
    let (_connection, result) = begin.await.unwrap();
    assert!(matches!(
        result,
        Err(siderite::session::error::BeginError::BeginTimeout)
    ));
}

#[tokio::test(start_paused = true)]
async fn silent_peer_times_out_the_attach() {
    let (mut connection, mut peer) = open_connection(32).await;

    let begin = tokio::spawn(async move {
        let mut session = Session::begin(&mut connection).await.unwrap();
        let result = Sender::attach(&mut session, "sender-1", "queue-a").await;
        (connection, session, result)
    });
    peer.handle_begin().await;
    let frame = peer.recv().await;
    assert!(matches!(frame.body, FrameBody::Attach(_)));
    // the peer never answers the attach
    let (_connection, _session, result) = begin.await.unwrap();
    assert!(matches!(
        result,
        Err(siderite::link::error::AttachError::AttachTimeout)
    ));
}

#[tokio::test]
async fn session_builder_configures_the_begin() {
    let (mut connection, mut peer) = open_connection(32).await;

    let begin = tokio::spawn(async move {
        let session = Session::builder()
            .incoming_window(64)
            .outgoing_window(32)
            .handle_max(8)
            .begin(&mut connection)
            .await
            .unwrap();
        (connection, session)
    });
    let (channel, remote_begin) = peer.handle_begin().await;
    assert_eq!(remote_begin.incoming_window, 64);
    assert_eq!(remote_begin.outgoing_window, 32);
    assert_eq!(remote_begin.handle_max.0, 8);
    let (connection, session) = begin.await.unwrap();

    teardown(connection, session, peer, channel).await;
}

#[tokio::test]
async fn send_is_accepted() {
    let (mut connection, mut peer) = open_connection(32).await;

    let begin = tokio::spawn(async move {
        let mut session = Session::begin(&mut connection).await.unwrap();
        let sender = Sender::attach(&mut session, "sender-1", "queue-a")
            .await
            .unwrap();
        (connection, session, sender)
    });
    let (channel, _begin) = peer.handle_begin().await;
    peer.handle_attach(channel).await;
    let (connection, session, mut sender) = begin.await.unwrap();

    peer.grant_credit(channel, 0, 10).await;

    let message = Message::value("hello");
    let sending = tokio::spawn(async move {
        sender.send(message).await.unwrap();
        sender
    });
    let (delivery_id, payload) = peer.recv_delivery().await;
    assert_eq!(
        Message::from_payload(payload).unwrap(),
        Message::value("hello")
    );
    peer.settle(channel, delivery_id, DeliveryState::Accepted(Accepted {}))
        .await;
    let sender = sending.await.unwrap();

    let detaching = tokio::spawn(sender.close());
    peer.handle_detach(channel).await;
    detaching.await.unwrap().unwrap();

    teardown(connection, session, peer, channel).await;
}

#[tokio::test]
async fn rejected_delivery_surfaces_as_error() {
    let (mut connection, mut peer) = open_connection(32).await;

    let begin = tokio::spawn(async move {
        let mut session = Session::begin(&mut connection).await.unwrap();
        let sender = Sender::attach(&mut session, "sender-1", "queue-a")
            .await
            .unwrap();
        (connection, session, sender)
    });
    let (channel, _) = peer.handle_begin().await;
    peer.handle_attach(channel).await;
    let (connection, session, mut sender) = begin.await.unwrap();

    peer.grant_credit(channel, 0, 1).await;
    let sending = tokio::spawn(async move {
        let result = sender.send(Message::value("bad")).await;
        (sender, result)
    });
    let (delivery_id, _) = peer.recv_delivery().await;
    peer.settle(
        channel,
        delivery_id,
        DeliveryState::Rejected(Rejected { error: None }),
    )
    .await;
    let (sender, result) = sending.await.unwrap();
    assert!(matches!(
        result,
        Err(siderite::link::error::SendError::Rejected(_))
    ));

    let detaching = tokio::spawn(sender.close());
    peer.handle_detach(channel).await;
    detaching.await.unwrap().unwrap();
    teardown(connection, session, peer, channel).await;
}

#[tokio::test]
async fn send_blocks_until_credit_arrives() {
    let (mut connection, mut peer) = open_connection(32).await;

    let begin = tokio::spawn(async move {
        let mut session = Session::begin(&mut connection).await.unwrap();
        let sender = Sender::attach(&mut session, "sender-1", "queue-a")
            .await
            .unwrap();
        (connection, session, sender)
    });
    let (channel, _) = peer.handle_begin().await;
    peer.handle_attach(channel).await;
    let (connection, session, mut sender) = begin.await.unwrap();

    let sending = tokio::spawn(async move {
        sender.send(Message::value("waiting")).await.unwrap();
        sender
    });

    // without credit, no transfer may go out
    let premature = tokio::time::timeout(Duration::from_millis(200), peer.recv()).await;
    assert!(premature.is_err());

    peer.grant_credit(channel, 0, 1).await;
    let (delivery_id, _) = peer.recv_delivery().await;
    peer.settle(channel, delivery_id, DeliveryState::Accepted(Accepted {}))
        .await;
    let sender = sending.await.unwrap();

    let detaching = tokio::spawn(sender.close());
    peer.handle_detach(channel).await;
    detaching.await.unwrap().unwrap();
    teardown(connection, session, peer, channel).await;
}

#[tokio::test]
async fn oversized_delivery_arrives_in_order() {
    let (mut connection, mut peer) = open_connection(32).await;

    let begin = tokio::spawn(async move {
        let mut session = Session::begin(&mut connection).await.unwrap();
        let sender = Sender::attach(&mut session, "sender-1", "queue-a")
            .await
            .unwrap();
        (connection, session, sender)
    });
    let (channel, _) = peer.handle_begin().await;
    peer.handle_attach(channel).await;
    let (connection, session, mut sender) = begin.await.unwrap();

    peer.grant_credit(channel, 0, 1).await;

    let message = Message::data(Bytes::from(vec![0xabu8; 4096]));
    let expected = message.to_payload();
    let sending = tokio::spawn(async move {
        sender.send(message).await.unwrap();
        sender
    });

    let (delivery_id, payload) = peer.recv_delivery().await;
    assert_eq!(payload, expected);
    peer.settle(channel, delivery_id, DeliveryState::Accepted(Accepted {}))
        .await;
    let sender = sending.await.unwrap();

    let detaching = tokio::spawn(sender.close());
    peer.handle_detach(channel).await;
    detaching.await.unwrap().unwrap();
    teardown(connection, session, peer, channel).await;
}

#[tokio::test]
async fn receiver_grants_credit_and_accepts() {
    let (mut connection, mut peer) = open_connection(32).await;

    let begin = tokio::spawn(async move {
        let mut session = Session::begin(&mut connection).await.unwrap();
        let receiver = Receiver::builder()
            .name("receiver-1")
            .source("queue-a")
            .credit_mode(CreditMode::Manual)
            .attach(&mut session)
            .await
            .unwrap();
        (connection, session, receiver)
    });
    let (channel, _) = peer.handle_begin().await;
    peer.handle_attach(channel).await;
    let (connection, session, mut receiver) = begin.await.unwrap();

    receiver.set_credit(5).await.unwrap();
    let frame = peer.recv().await;
    match frame.body {
        FrameBody::Flow(flow) => {
            assert_eq!(flow.link_credit, Some(5));
            assert!(flow.handle.is_some());
        }
        other => panic!("expected flow, got {other:?}"),
    }

    let message = Message::value("inbound");
    peer.deliver(channel, 0, message.to_payload()).await;

    let delivery = receiver.recv().await.unwrap();
    assert_eq!(delivery.delivery_id(), 0);
    assert_eq!(delivery.message(), &message);

    receiver.accept(&delivery).await.unwrap();
    let frame = peer.recv().await;
    match frame.body {
        FrameBody::Disposition(disposition) => {
            assert_eq!(disposition.role, Role::Receiver);
            assert_eq!(disposition.first, 0);
            assert!(disposition.settled);
            assert!(matches!(
                disposition.state,
                Some(DeliveryState::Accepted(_))
            ));
        }
        other => panic!("expected disposition, got {other:?}"),
    }

    let detaching = tokio::spawn(receiver.close());
    peer.handle_detach(channel).await;
    detaching.await.unwrap().unwrap();
    teardown(connection, session, peer, channel).await;
}

#[tokio::test]
async fn split_incoming_delivery_is_reassembled() {
    let (mut connection, mut peer) = open_connection(32).await;

    let begin = tokio::spawn(async move {
        let mut session = Session::begin(&mut connection).await.unwrap();
        let receiver = Receiver::builder()
            .name("receiver-1")
            .source("queue-a")
            .credit_mode(CreditMode::Auto(10))
            .attach(&mut session)
            .await
            .unwrap();
        (connection, session, receiver)
    });
    let (channel, _) = peer.handle_begin().await;
    peer.handle_attach(channel).await;
    let (connection, session, mut receiver) = begin.await.unwrap();

    // the auto credit window announces itself right after the attach
    let frame = peer.recv().await;
    assert!(matches!(frame.body, FrameBody::Flow(_)));

    let message = Message::data(Bytes::from(vec![0x5au8; 600]));
    let payload = message.to_payload();
    let (head, tail) = payload.split_at(payload.len() / 2);

    peer.send(
        channel,
        FrameBody::Transfer {
            performative: Transfer {
                handle: Handle(0),
                delivery_id: Some(0),
                delivery_tag: Some(Bytes::from_static(b"split")),
                message_format: Some(0),
                settled: Some(false),
                more: true,
                ..Default::default()
            },
            payload: Bytes::copy_from_slice(head),
        },
    )
    .await;
    peer.send(
        channel,
        FrameBody::Transfer {
            performative: Transfer {
                handle: Handle(0),
                more: false,
                ..Default::default()
            },
            payload: Bytes::copy_from_slice(tail),
        },
    )
    .await;

    let delivery = receiver.recv().await.unwrap();
    assert_eq!(delivery.message(), &message);
    assert_eq!(delivery.delivery_tag(), &Bytes::from_static(b"split"));

    let detaching = tokio::spawn(receiver.close());
    peer.handle_detach(channel).await;
    detaching.await.unwrap().unwrap();
    teardown(connection, session, peer, channel).await;
}

#[tokio::test]
async fn disconnect_mid_delivery_never_yields_a_partial_message() {
    let (mut connection, mut peer) = open_connection(32).await;

    let begin = tokio::spawn(async move {
        let mut session = Session::begin(&mut connection).await.unwrap();
        let receiver = Receiver::builder()
            .name("receiver-1")
            .source("queue-a")
            .credit_mode(CreditMode::Auto(10))
            .attach(&mut session)
            .await
            .unwrap();
        (connection, session, receiver)
    });
    let (channel, _) = peer.handle_begin().await;
    peer.handle_attach(channel).await;
    let (_connection, _session, mut receiver) = begin.await.unwrap();

    let frame = peer.recv().await;
    assert!(matches!(frame.body, FrameBody::Flow(_)));

    // only the first fragment makes it out before the peer dies
    peer.send(
        channel,
        FrameBody::Transfer {
            performative: Transfer {
                handle: Handle(0),
                delivery_id: Some(0),
                delivery_tag: Some(Bytes::from_static(b"cut")),
                message_format: Some(0),
                settled: Some(false),
                more: true,
                ..Default::default()
            },
            payload: Bytes::from_static(&[0x5a; 100]),
        },
    )
    .await;
    drop(peer);

    let result = receiver.recv().await;
    assert!(matches!(
        result,
        Err(siderite::link::error::RecvError::SessionDropped)
    ));
}

#[tokio::test]
async fn concurrent_senders_keep_deliveries_intact() {
    let (mut connection, mut peer) = open_connection(32).await;

    let begin = tokio::spawn(async move {
        let mut session = Session::begin(&mut connection).await.unwrap();
        let first = Sender::attach(&mut session, "sender-1", "queue-a")
            .await
            .unwrap();
        let second = Sender::attach(&mut session, "sender-2", "queue-b")
            .await
            .unwrap();
        (connection, session, first, second)
    });
    let (channel, _) = peer.handle_begin().await;
    let attach_1 = peer.handle_attach(channel).await;
    let attach_2 = peer.handle_attach(channel).await;
    let (connection, session, mut first, mut second) = begin.await.unwrap();

    peer.grant_credit_on(channel, attach_1.handle, 0, 1).await;
    peer.grant_credit_on(channel, attach_2.handle, 0, 1).await;

    // both deliveries need several frames at a 512 byte frame size
    let message_a = Message::data(Bytes::from(vec![0x11u8; 4096]));
    let message_b = Message::data(Bytes::from(vec![0x22u8; 4096]));
    let expected_a = message_a.to_payload();
    let expected_b = message_b.to_payload();

    let sending_a = tokio::spawn(async move {
        first.send(message_a).await.unwrap();
        first
    });
    let sending_b = tokio::spawn(async move {
        second.send(message_b).await.unwrap();
        second
    });

    // whichever sender wins the race, each delivery arrives whole and
    // its frames never interleave with the other's
    let (id_1, payload_1) = peer.recv_delivery().await;
    let (id_2, payload_2) = peer.recv_delivery().await;
    assert_ne!(id_1, id_2);
    assert!(
        (payload_1 == expected_a && payload_2 == expected_b)
            || (payload_1 == expected_b && payload_2 == expected_a)
    );

    peer.settle(channel, id_1, DeliveryState::Accepted(Accepted {}))
        .await;
    peer.settle(channel, id_2, DeliveryState::Accepted(Accepted {}))
        .await;
    let first = sending_a.await.unwrap();
    let second = sending_b.await.unwrap();

    let detaching = tokio::spawn(first.close());
    peer.handle_detach(channel).await;
    detaching.await.unwrap().unwrap();
    let detaching = tokio::spawn(second.close());
    peer.handle_detach(channel).await;
    detaching.await.unwrap().unwrap();
    teardown(connection, session, peer, channel).await;
}
