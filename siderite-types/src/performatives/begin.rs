//! The begin performative (part 2.7.2)

use bytes::{Bytes, BytesMut};

use crate::codec::{CompositeDecoder, CompositeEncoder, DecodeError, Encode};
use crate::definitions::{Fields, Handle, TransferNumber};
use crate::primitives::{Array, Symbol};

/// Binds a session to a channel
#[derive(Debug, Clone, PartialEq)]
pub struct Begin {
    /// Set when this begin answers a remotely initiated begin
    pub remote_channel: Option<u16>,
    pub next_outgoing_id: TransferNumber,
    pub incoming_window: u32,
    pub outgoing_window: u32,
    pub handle_max: Handle,
    pub offered_capabilities: Option<Array<Symbol>>,
    pub desired_capabilities: Option<Array<Symbol>>,
    pub properties: Option<Fields>,
}

impl Default for Begin {
    fn default() -> Self {
        Self {
            remote_channel: None,
            next_outgoing_id: 0,
            incoming_window: 0,
            outgoing_window: 0,
            handle_max: Handle(u32::MAX),
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }
}

impl Begin {
    pub const DESCRIPTOR: u64 = 0x11;

    pub(crate) fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            remote_channel: decoder.field()?,
            next_outgoing_id: decoder.required("next-outgoing-id")?,
            incoming_window: decoder.required("incoming-window")?,
            outgoing_window: decoder.required("outgoing-window")?,
            handle_max: decoder.field()?.unwrap_or(Handle(u32::MAX)),
            offered_capabilities: decoder.field()?,
            desired_capabilities: decoder.field()?,
            properties: decoder.field()?,
        })
    }
}

impl Encode for Begin {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .optional(&self.remote_channel)
            .field(&self.next_outgoing_id)
            .field(&self.incoming_window)
            .field(&self.outgoing_window)
            .field(&self.handle_max)
            .optional(&self.offered_capabilities)
            .optional(&self.desired_capabilities)
            .optional(&self.properties);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}
