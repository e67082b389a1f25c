//! The transfer performative (part 2.7.5)

use bytes::{Bytes, BytesMut};

use crate::codec::{CompositeDecoder, CompositeEncoder, DecodeError, Encode};
use crate::definitions::{
    DeliveryNumber, DeliveryTag, Handle, MessageFormat, ReceiverSettleMode,
};
use crate::messaging::DeliveryState;

/// Carries (part of) a message across a link. The frame payload holds
/// the message bytes; this body holds the delivery metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transfer {
    pub handle: Handle,
    /// Mandatory on the first frame of a delivery, optional on
    /// continuations
    pub delivery_id: Option<DeliveryNumber>,
    pub delivery_tag: Option<DeliveryTag>,
    pub message_format: Option<MessageFormat>,
    pub settled: Option<bool>,
    /// Set when at least one more frame of this delivery follows
    pub more: bool,
    pub rcv_settle_mode: Option<ReceiverSettleMode>,
    pub state: Option<DeliveryState>,
    pub resume: bool,
    pub aborted: bool,
    pub batchable: bool,
}

impl Transfer {
    pub const DESCRIPTOR: u64 = 0x14;

    pub(crate) fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            handle: decoder.required("handle")?,
            delivery_id: decoder.field()?,
            delivery_tag: decoder.field()?,
            message_format: decoder.field()?,
            settled: decoder.field()?,
            more: decoder.field()?.unwrap_or(false),
            rcv_settle_mode: decoder.field()?,
            state: decoder.field()?,
            resume: decoder.field()?.unwrap_or(false),
            aborted: decoder.field()?.unwrap_or(false),
            batchable: decoder.field()?.unwrap_or(false),
        })
    }
}

impl Encode for Transfer {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .field(&self.handle)
            .optional(&self.delivery_id)
            .optional(&self.delivery_tag)
            .optional(&self.message_format)
            .optional(&self.settled)
            .field(&self.more)
            .optional(&self.rcv_settle_mode)
            .optional(&self.state)
            .field(&self.resume)
            .field(&self.aborted)
            .field(&self.batchable);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}
