//! SASL frames, exchanged on channel 0 before the AMQP layer starts

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use siderite_types::codec::{Decode, Encode};
use siderite_types::sasl::SaslFrameBody;

use crate::transport::error::Error;

use super::{DEFAULT_DOFF, FRAME_TYPE_SASL};

/// One SASL frame. The channel field of a SASL frame is always zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SaslFrame {
    pub body: SaslFrameBody,
}

impl From<SaslFrameBody> for SaslFrame {
    fn from(body: SaslFrameBody) -> Self {
        Self { body }
    }
}

/// Encodes and decodes [`SaslFrame`]s
pub struct SaslFrameCodec {}

impl Encoder<SaslFrame> for SaslFrameCodec {
    type Error = Error;

    fn encode(&mut self, item: SaslFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_u8(DEFAULT_DOFF);
        dst.put_u8(FRAME_TYPE_SASL);
        dst.put_u16(0);
        item.body.encode(dst);
        Ok(())
    }
}

impl Decoder for SaslFrameCodec {
    type Item = SaslFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.remaining() < 4 {
            return Err(Error::MalformedFrame);
        }
        let doff = src.get_u8();
        let frame_type = src.get_u8();
        let _channel = src.get_u16();

        if doff < DEFAULT_DOFF {
            return Err(Error::MalformedFrame);
        }
        if frame_type != FRAME_TYPE_SASL {
            return Err(Error::UnexpectedFrameType(frame_type));
        }
        let extended = (doff as usize - DEFAULT_DOFF as usize) * 4;
        if src.remaining() < extended {
            return Err(Error::MalformedFrame);
        }
        src.advance(extended);

        let mut bytes = src.split().freeze();
        let body = SaslFrameBody::decode(&mut bytes)?;
        Ok(Some(SaslFrame { body }))
    }
}
