//! AMQP frames: a channel number and a performative body, with the
//! transfer payload carried as raw bytes

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use siderite_types::codec::{Decode, Encode};
use siderite_types::performatives::{
    Attach, Begin, Close, Detach, Disposition, End, Flow, Open, Performative, Transfer,
};

use crate::transport::error::Error;

use super::{DEFAULT_DOFF, FRAME_TYPE_AMQP};

/// One frame on the wire, minus the size prefix
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub channel: u16,
    pub body: FrameBody,
}

impl Frame {
    pub fn new(channel: u16, body: FrameBody) -> Self {
        Self { channel, body }
    }

    /// The heartbeat frame: a frame header with no body
    pub fn empty() -> Self {
        Self {
            channel: 0,
            body: FrameBody::Empty,
        }
    }
}

/// Body of an AMQP frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    Open(Open),
    Begin(Begin),
    Attach(Attach),
    Flow(Flow),
    Transfer {
        performative: Transfer,
        payload: Bytes,
    },
    Disposition(Disposition),
    Detach(Detach),
    End(End),
    Close(Close),
    /// A frame with no body, used as a heartbeat
    Empty,
}

/// Encodes and decodes [`Frame`]s, everything after the size prefix
pub struct FrameCodec {}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_u8(DEFAULT_DOFF);
        dst.put_u8(FRAME_TYPE_AMQP);
        dst.put_u16(item.channel);

        match item.body {
            FrameBody::Open(p) => p.encode(dst),
            FrameBody::Begin(p) => p.encode(dst),
            FrameBody::Attach(p) => p.encode(dst),
            FrameBody::Flow(p) => p.encode(dst),
            FrameBody::Transfer {
                performative,
                payload,
            } => {
                performative.encode(dst);
                dst.put_slice(&payload);
            }
            FrameBody::Disposition(p) => p.encode(dst),
            FrameBody::Detach(p) => p.encode(dst),
            FrameBody::End(p) => p.encode(dst),
            FrameBody::Close(p) => p.encode(dst),
            FrameBody::Empty => {}
        }
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    // The upstream length-delimited codec always hands over one whole
    // frame, so this never sees a partial buffer.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.remaining() < 4 {
            return Err(Error::MalformedFrame);
        }
        let doff = src.get_u8();
        let frame_type = src.get_u8();
        let channel = src.get_u16();

        if doff < DEFAULT_DOFF {
            return Err(Error::MalformedFrame);
        }
        if frame_type != FRAME_TYPE_AMQP {
            return Err(Error::UnexpectedFrameType(frame_type));
        }
        // skip any extended header
        let extended = (doff as usize - DEFAULT_DOFF as usize) * 4;
        if src.remaining() < extended {
            return Err(Error::MalformedFrame);
        }
        src.advance(extended);

        if src.is_empty() {
            return Ok(Some(Frame::new(channel, FrameBody::Empty)));
        }

        let mut bytes = src.split().freeze();
        let performative = Performative::decode(&mut bytes)?;
        let body = match performative {
            Performative::Open(p) => FrameBody::Open(p),
            Performative::Begin(p) => FrameBody::Begin(p),
            Performative::Attach(p) => FrameBody::Attach(p),
            Performative::Flow(p) => FrameBody::Flow(p),
            Performative::Transfer(p) => FrameBody::Transfer {
                performative: p,
                payload: bytes,
            },
            Performative::Disposition(p) => FrameBody::Disposition(p),
            Performative::Detach(p) => FrameBody::Detach(p),
            Performative::End(p) => FrameBody::End(p),
            Performative::Close(p) => FrameBody::Close(p),
        };
        Ok(Some(Frame::new(channel, body)))
    }
}
