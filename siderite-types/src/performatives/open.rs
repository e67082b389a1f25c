//! The open performative (part 2.7.1)

use bytes::{Bytes, BytesMut};

use crate::codec::{CompositeDecoder, CompositeEncoder, Decode, DecodeError, Encode};
use crate::definitions::{Fields, Milliseconds};
use crate::primitives::{Array, Symbol};

/// The largest frame a peer is willing to accept.
///
/// Defaults to the unbounded value; the protocol floor of 512 octets is
/// enforced at the connection layer, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaxFrameSize(pub u32);

impl Default for MaxFrameSize {
    fn default() -> Self {
        Self(u32::MAX)
    }
}

impl From<u32> for MaxFrameSize {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl Encode for MaxFrameSize {
    fn encode(&self, buf: &mut BytesMut) {
        self.0.encode(buf)
    }
}

impl Decode for MaxFrameSize {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        u32::decode_body(code, buf).map(MaxFrameSize)
    }
}

/// The highest channel number a peer will use on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelMax(pub u16);

impl Default for ChannelMax {
    fn default() -> Self {
        Self(u16::MAX)
    }
}

impl From<u16> for ChannelMax {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

impl Encode for ChannelMax {
    fn encode(&self, buf: &mut BytesMut) {
        self.0.encode(buf)
    }
}

impl Decode for ChannelMax {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        u16::decode_body(code, buf).map(ChannelMax)
    }
}

/// Negotiates connection parameters. The first frame either peer sends
/// on channel 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Open {
    pub container_id: String,
    pub hostname: Option<String>,
    pub max_frame_size: MaxFrameSize,
    pub channel_max: ChannelMax,
    pub idle_time_out: Option<Milliseconds>,
    pub outgoing_locales: Option<Array<Symbol>>,
    pub incoming_locales: Option<Array<Symbol>>,
    pub offered_capabilities: Option<Array<Symbol>>,
    pub desired_capabilities: Option<Array<Symbol>>,
    pub properties: Option<Fields>,
}

impl Open {
    pub const DESCRIPTOR: u64 = 0x10;

    pub(crate) fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            container_id: decoder.required("container-id")?,
            hostname: decoder.field()?,
            max_frame_size: decoder.field_or_default()?,
            channel_max: decoder.field_or_default()?,
            idle_time_out: decoder.field()?,
            outgoing_locales: decoder.field()?,
            incoming_locales: decoder.field()?,
            offered_capabilities: decoder.field()?,
            desired_capabilities: decoder.field()?,
            properties: decoder.field()?,
        })
    }
}

impl Encode for Open {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .field(&self.container_id)
            .optional(&self.hostname)
            .field(&self.max_frame_size)
            .field(&self.channel_max)
            .optional(&self.idle_time_out)
            .optional(&self.outgoing_locales)
            .optional(&self.incoming_locales)
            .optional(&self.offered_capabilities)
            .optional(&self.desired_capabilities)
            .optional(&self.properties);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}
