//! The attach performative (part 2.7.3)

use bytes::{Bytes, BytesMut};

use crate::codec::{CompositeDecoder, CompositeEncoder, DecodeError, Encode};
use crate::definitions::{
    DeliveryTag, Fields, Handle, ReceiverSettleMode, Role, SenderSettleMode, SequenceNo,
};
use crate::messaging::{Source, TargetArchetype};
use crate::primitives::{Array, OrderedMap, Symbol};
use crate::value::Value;

/// Attaches a link endpoint to a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attach {
    /// Uniquely identifies the link within the two containers
    pub name: String,
    pub handle: Handle,
    pub role: Role,
    pub snd_settle_mode: SenderSettleMode,
    pub rcv_settle_mode: ReceiverSettleMode,
    pub source: Option<Source>,
    pub target: Option<TargetArchetype>,
    /// Deliveries this endpoint still considers unsettled, keyed by
    /// delivery tag
    pub unsettled: Option<OrderedMap<DeliveryTag, Value>>,
    pub incomplete_unsettled: bool,
    /// Mandatory on the sender side, ignored from the receiver
    pub initial_delivery_count: Option<SequenceNo>,
    pub max_message_size: Option<u64>,
    pub offered_capabilities: Option<Array<Symbol>>,
    pub desired_capabilities: Option<Array<Symbol>>,
    pub properties: Option<Fields>,
}

impl Attach {
    pub const DESCRIPTOR: u64 = 0x12;

    pub(crate) fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            name: decoder.required("name")?,
            handle: decoder.required("handle")?,
            role: decoder.required("role")?,
            snd_settle_mode: decoder.field_or_default()?,
            rcv_settle_mode: decoder.field_or_default()?,
            source: decoder.field()?,
            target: decoder.field()?,
            unsettled: decoder.field()?,
            incomplete_unsettled: decoder.field()?.unwrap_or(false),
            initial_delivery_count: decoder.field()?,
            max_message_size: decoder.field()?,
            offered_capabilities: decoder.field()?,
            desired_capabilities: decoder.field()?,
            properties: decoder.field()?,
        })
    }
}

impl Encode for Attach {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .field(&self.name)
            .field(&self.handle)
            .field(&self.role)
            .field(&self.snd_settle_mode)
            .field(&self.rcv_settle_mode)
            .optional(&self.source)
            .optional(&self.target)
            .optional(&self.unsettled)
            .field(&self.incomplete_unsettled)
            .optional(&self.initial_delivery_count)
            .optional(&self.max_message_size)
            .optional(&self.offered_capabilities)
            .optional(&self.desired_capabilities)
            .optional(&self.properties);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Decode;
    use crate::messaging::Target;
    use crate::performatives::Performative;

    #[test]
    fn attach_roundtrip() {
        let attach = Attach {
            name: "orders-sender".to_string(),
            handle: Handle(0),
            role: Role::Sender,
            snd_settle_mode: SenderSettleMode::Unsettled,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: Some(Source::default()),
            target: Some(TargetArchetype::Target(Target {
                address: Some("orders".to_string()),
                ..Default::default()
            })),
            initial_delivery_count: Some(0),
            ..Default::default()
        };
        let mut buf = BytesMut::new();
        Performative::Attach(attach.clone()).encode(&mut buf);
        let mut bytes = buf.freeze();
        assert_eq!(
            Performative::decode(&mut bytes).unwrap(),
            Performative::Attach(attach)
        );
    }
}
