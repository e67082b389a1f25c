//! The flow performative (part 2.7.4)

use bytes::{Bytes, BytesMut};

use crate::codec::{CompositeDecoder, CompositeEncoder, DecodeError, Encode};
use crate::definitions::{Fields, Handle, SequenceNo, TransferNumber};

/// Updates session windows and, when the link fields are present, link
/// credit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flow {
    /// Absent only before the peer's begin has been received
    pub next_incoming_id: Option<TransferNumber>,
    pub next_outgoing_id: TransferNumber,
    pub incoming_window: u32,
    pub outgoing_window: u32,
    /// Present iff this flow carries link state
    pub handle: Option<Handle>,
    pub delivery_count: Option<SequenceNo>,
    pub link_credit: Option<u32>,
    pub available: Option<u32>,
    pub drain: bool,
    pub echo: bool,
    pub properties: Option<Fields>,
}

impl Flow {
    pub const DESCRIPTOR: u64 = 0x13;

    pub(crate) fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            next_incoming_id: decoder.field()?,
            next_outgoing_id: decoder.required("next-outgoing-id")?,
            incoming_window: decoder.required("incoming-window")?,
            outgoing_window: decoder.required("outgoing-window")?,
            handle: decoder.field()?,
            delivery_count: decoder.field()?,
            link_credit: decoder.field()?,
            available: decoder.field()?,
            drain: decoder.field()?.unwrap_or(false),
            echo: decoder.field()?.unwrap_or(false),
            properties: decoder.field()?,
        })
    }
}

impl Encode for Flow {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .optional(&self.next_incoming_id)
            .field(&self.next_outgoing_id)
            .field(&self.incoming_window)
            .field(&self.outgoing_window)
            .optional(&self.handle)
            .optional(&self.delivery_count)
            .optional(&self.link_credit)
            .optional(&self.available)
            .field(&self.drain)
            .field(&self.echo)
            .optional(&self.properties);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}
