//! SASL negotiation scenarios against a scripted peer

mod common;

use tokio::io::duplex;

use siderite::connection::error::OpenError;
use siderite::sasl_profile::error::NegotiationError;
use siderite::{Connection, SaslProfile};
use siderite_types::sasl::{SaslCode, SaslFrameBody};

use common::{sasl_server, MockPeer};

#[tokio::test]
async fn plain_negotiation_precedes_open() {
    let (client_io, mut server_io) = duplex(8192);
    let client = tokio::spawn(async move {
        Connection::builder()
            .container_id("it-client")
            .sasl_profile(SaslProfile::Plain {
                username: "guest".to_string(),
                password: "secret".to_string(),
            })
            .open_with_stream(client_io)
            .await
    });

    let init = sasl_server(&mut server_io, &["PLAIN", "ANONYMOUS"], SaslCode::Ok)
        .await
        .expect("client init");
    match init.body {
        SaslFrameBody::Init(init) => {
            assert_eq!(init.mechanism.as_str(), "PLAIN");
            assert_eq!(
                init.initial_response.as_deref(),
                Some(b"\x00guest\x00secret".as_slice())
            );
        }
        other => panic!("expected init, got {other:?}"),
    }

    // the security layer done, the plain AMQP handshake follows
    let mut peer = MockPeer::accept_amqp(server_io).await;
    peer.handle_open().await;
    let connection = client.await.unwrap().unwrap();

    let closing = tokio::spawn(connection.close());
    peer.handle_close().await;
    closing.await.unwrap().unwrap();
}

#[tokio::test]
async fn rejected_credentials_fail_open() {
    let (client_io, mut server_io) = duplex(8192);
    let client = tokio::spawn(async move {
        Connection::builder()
            .container_id("it-client")
            .sasl_profile(SaslProfile::Plain {
                username: "guest".to_string(),
                password: "wrong".to_string(),
            })
            .open_with_stream(client_io)
            .await
    });

    sasl_server(&mut server_io, &["PLAIN"], SaslCode::Auth).await;

    let result = client.await.unwrap();
    assert!(matches!(
        result,
        Err(OpenError::Sasl(NegotiationError::OutcomeFailed {
            code: SaslCode::Auth,
            ..
        }))
    ));
}

#[tokio::test]
async fn unoffered_mechanism_fails_negotiation() {
    let (client_io, mut server_io) = duplex(8192);
    let client = tokio::spawn(async move {
        Connection::builder()
            .container_id("it-client")
            .sasl_profile(SaslProfile::Plain {
                username: "guest".to_string(),
                password: "secret".to_string(),
            })
            .open_with_stream(client_io)
            .await
    });

    // the server only offers ANONYMOUS, so the client never sends init
    let server = tokio::spawn(async move {
        sasl_server(&mut server_io, &["ANONYMOUS"], SaslCode::Ok).await
    });

    let result = client.await.unwrap();
    assert!(matches!(
        result,
        Err(OpenError::Sasl(NegotiationError::MechanismNotOffered(_)))
    ));
    server.abort();
}
