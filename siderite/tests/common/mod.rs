//! A scripted remote peer speaking raw frames over an in-memory duplex

#![allow(dead_code)]

use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use siderite::frames::amqp::{Frame, FrameBody};
use siderite::frames::sasl::{SaslFrame, SaslFrameCodec};
use siderite::transport::protocol_header::ProtocolHeader;
use siderite::transport::Transport;
use siderite_types::definitions::{Handle, Role};
use siderite_types::messaging::DeliveryState;
use siderite_types::performatives::{
    Attach, Begin, Close, Detach, Disposition, End, Flow, Open, Transfer,
};
use siderite_types::sasl::{SaslCode, SaslFrameBody, SaslMechanisms, SaslOutcome};
use siderite_types::primitives::{Array, Symbol};
use siderite_types::states::ConnectionState;

pub struct MockPeer {
    pub transport: Transport<DuplexStream>,
    /// Window bookkeeping mirrored from the frames this peer has sent
    pub next_outgoing_id: u32,
    pub next_incoming_id: u32,
}

impl MockPeer {
    /// Exchanges the plain AMQP protocol header and binds the transport
    pub async fn accept_amqp(mut io: DuplexStream) -> Self {
        let mut state = ConnectionState::Start;
        Transport::negotiate(&mut io, &mut state, ProtocolHeader::amqp())
            .await
            .expect("header exchange");
        Self {
            transport: Transport::bind(io, 65_536, None),
            next_outgoing_id: 0,
            next_incoming_id: 0,
        }
    }

    pub async fn recv(&mut self) -> Frame {
        let frame = self
            .transport
            .next()
            .await
            .expect("peer stream open")
            .expect("valid frame");
        if let FrameBody::Transfer { .. } = &frame.body {
            self.next_incoming_id = self.next_incoming_id.wrapping_add(1);
        }
        frame
    }

    pub async fn send(&mut self, channel: u16, body: FrameBody) {
        if let FrameBody::Transfer { .. } = &body {
            self.next_outgoing_id = self.next_outgoing_id.wrapping_add(1);
        }
        self.transport
            .send(Frame::new(channel, body))
            .await
            .expect("send frame");
    }

    /// Expects the client's open and answers it
    pub async fn handle_open(&mut self) -> Open {
        let frame = self.recv().await;
        let open = match frame.body {
            FrameBody::Open(open) => open,
            other => panic!("expected open, got {other:?}"),
        };
        self.send(
            0,
            FrameBody::Open(Open {
                container_id: "mock-peer".to_string(),
                ..Default::default()
            }),
        )
        .await;
        open
    }

    /// Expects the client's begin and maps the session
    pub async fn handle_begin(&mut self) -> (u16, Begin) {
        let frame = self.recv().await;
        let begin = match frame.body {
            FrameBody::Begin(begin) => begin,
            other => panic!("expected begin, got {other:?}"),
        };
        self.send(
            frame.channel,
            FrameBody::Begin(Begin {
                remote_channel: Some(frame.channel),
                next_outgoing_id: 0,
                incoming_window: 2048,
                outgoing_window: 2048,
                ..Default::default()
            }),
        )
        .await;
        (frame.channel, begin)
    }

    /// Expects the client's attach and answers with the complementary
    /// endpoint, accepting the link
    pub async fn handle_attach(&mut self, channel: u16) -> Attach {
        let frame = self.recv().await;
        let attach = match frame.body {
            FrameBody::Attach(attach) => attach,
            other => panic!("expected attach, got {other:?}"),
        };
        let role = match attach.role {
            Role::Sender => Role::Receiver,
            Role::Receiver => Role::Sender,
        };
        self.send(
            channel,
            FrameBody::Attach(Attach {
                name: attach.name.clone(),
                handle: attach.handle,
                role,
                source: attach.source.clone(),
                target: attach.target.clone(),
                initial_delivery_count: match role {
                    Role::Sender => Some(0),
                    Role::Receiver => None,
                },
                ..Default::default()
            }),
        )
        .await;
        attach
    }

    /// Grants the client sender `credit` on its link
    pub async fn grant_credit(&mut self, channel: u16, delivery_count: u32, credit: u32) {
        self.grant_credit_on(channel, Handle(0), delivery_count, credit)
            .await;
    }

    pub async fn grant_credit_on(
        &mut self,
        channel: u16,
        handle: Handle,
        delivery_count: u32,
        credit: u32,
    ) {
        self.send(
            channel,
            FrameBody::Flow(Flow {
                next_incoming_id: Some(self.next_incoming_id),
                next_outgoing_id: self.next_outgoing_id,
                incoming_window: 2048,
                outgoing_window: 2048,
                handle: Some(handle),
                delivery_count: Some(delivery_count),
                link_credit: Some(credit),
                ..Default::default()
            }),
        )
        .await;
    }

    /// Receives the transfer frames of one delivery and hands back its
    /// id and reassembled payload
    pub async fn recv_delivery(&mut self) -> (u32, Bytes) {
        let mut delivery_id = None;
        let mut assembled = BytesMut::new();
        loop {
            let frame = self.recv().await;
            let (transfer, payload) = match frame.body {
                FrameBody::Transfer {
                    performative,
                    payload,
                } => (performative, payload),
                other => panic!("expected transfer, got {other:?}"),
            };
            if delivery_id.is_none() {
                delivery_id = transfer.delivery_id;
            }
            assembled.extend_from_slice(&payload);
            if !transfer.more {
                break;
            }
        }
        (delivery_id.expect("delivery id"), assembled.freeze())
    }

    /// Settles a delivery towards the client sender
    pub async fn settle(&mut self, channel: u16, delivery_id: u32, state: DeliveryState) {
        self.send(
            channel,
            FrameBody::Disposition(Disposition {
                role: Role::Receiver,
                first: delivery_id,
                settled: true,
                state: Some(state),
                ..Default::default()
            }),
        )
        .await;
    }

    /// Delivers one message to the client receiver in a single frame
    pub async fn deliver(&mut self, channel: u16, delivery_id: u32, payload: Bytes) {
        self.send(
            channel,
            FrameBody::Transfer {
                performative: Transfer {
                    handle: Handle(0),
                    delivery_id: Some(delivery_id),
                    delivery_tag: Some(Bytes::copy_from_slice(
                        &delivery_id.to_be_bytes(),
                    )),
                    message_format: Some(0),
                    settled: Some(false),
                    ..Default::default()
                },
                payload,
            },
        )
        .await;
    }

    /// Expects a detach and echoes it back
    pub async fn handle_detach(&mut self, channel: u16) -> Detach {
        let frame = self.recv().await;
        let detach = match frame.body {
            FrameBody::Detach(detach) => detach,
            other => panic!("expected detach, got {other:?}"),
        };
        self.send(
            channel,
            FrameBody::Detach(Detach {
                handle: detach.handle,
                closed: detach.closed,
                error: None,
            }),
        )
        .await;
        detach
    }

    /// Expects an end and echoes it back
    pub async fn handle_end(&mut self, channel: u16) -> End {
        let frame = self.recv().await;
        let end = match frame.body {
            FrameBody::End(end) => end,
            other => panic!("expected end, got {other:?}"),
        };
        self.send(channel, FrameBody::End(End::default())).await;
        end
    }

    /// Expects a close and echoes it back
    pub async fn handle_close(&mut self) -> Close {
        let frame = self.recv().await;
        let close = match frame.body {
            FrameBody::Close(close) => close,
            other => panic!("expected close, got {other:?}"),
        };
        self.send(0, FrameBody::Close(Close::default())).await;
        close
    }
}

/// Runs the server side of a SASL exchange and reports `code`, leaving
/// the stream ready for the AMQP header that follows a success
pub async fn sasl_server(io: &mut DuplexStream, mechanisms: &[&str], code: SaslCode) -> Option<SaslFrame> {
    let mut header = [0u8; 8];
    io.read_exact(&mut header).await.expect("sasl header");
    assert_eq!(&header[..4], b"AMQP");
    assert_eq!(header[4], 0x03);
    let reply: [u8; 8] = ProtocolHeader::sasl().into();
    io.write_all(&reply).await.expect("sasl header reply");

    let mut codec = LengthDelimitedCodec::builder()
        .big_endian()
        .length_field_length(4)
        .max_frame_length(512)
        .length_adjustment(-4)
        .new_codec();

    let mechanisms = SaslMechanisms {
        sasl_server_mechanisms: Array::from(
            mechanisms.iter().map(|m| Symbol::from(*m)).collect::<Vec<_>>(),
        ),
    };
    send_sasl_frame(io, &mut codec, SaslFrameBody::Mechanisms(mechanisms)).await;

    let init = recv_sasl_frame(io, &mut codec).await;

    send_sasl_frame(
        io,
        &mut codec,
        SaslFrameBody::Outcome(SaslOutcome {
            code,
            additional_data: None,
        }),
    )
    .await;
    init
}

async fn send_sasl_frame(
    io: &mut DuplexStream,
    codec: &mut LengthDelimitedCodec,
    body: SaslFrameBody,
) {
    let mut frame = BytesMut::new();
    SaslFrameCodec {}
        .encode(SaslFrame::from(body), &mut frame)
        .expect("encode sasl frame");
    let mut wire = BytesMut::new();
    codec
        .encode(frame.freeze(), &mut wire)
        .expect("length-prefix sasl frame");
    io.write_all(&wire).await.expect("write sasl frame");
}

async fn recv_sasl_frame(
    io: &mut DuplexStream,
    codec: &mut LengthDelimitedCodec,
) -> Option<SaslFrame> {
    let mut buf = BytesMut::new();
    loop {
        if let Some(mut frame) = codec.decode(&mut buf).expect("length-delimited sasl frame") {
            return SaslFrameCodec {}.decode(&mut frame).expect("decode sasl frame");
        }
        let mut chunk = [0u8; 256];
        let n = io.read(&mut chunk).await.expect("read sasl frame");
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}
