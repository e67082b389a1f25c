//! Messaging types layered over the transport: terminus definitions,
//! delivery states and outcomes, and the message format (part 3)

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{
    self, CompositeDecoder, CompositeEncoder, Decode, DecodeError, Encode,
};
use crate::definitions::{Error, Fields, Milliseconds, Seconds, SequenceNo};
use crate::format_code as fc;
use crate::primitives::{Array, Binary, OrderedMap, Symbol, Timestamp};
use crate::transaction::{Coordinator, Declared, TransactionalState};
use crate::value::{Descriptor, Value};

/* -------------------------------- terminus ------------------------------- */

/// Where a message originates on the sending side of a link
/// (descriptor 0x28)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Source {
    pub address: Option<String>,
    pub durable: u32,
    pub expiry_policy: Option<Symbol>,
    pub timeout: Seconds,
    pub dynamic: bool,
    pub dynamic_node_properties: Option<Fields>,
    pub distribution_mode: Option<Symbol>,
    pub filter: Option<Fields>,
    pub default_outcome: Option<Outcome>,
    pub outcomes: Option<Array<Symbol>>,
    pub capabilities: Option<Array<Symbol>>,
}

impl Source {
    pub const DESCRIPTOR: u64 = 0x28;

    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Default::default()
        }
    }

    fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            address: decoder.field()?,
            durable: decoder.field()?.unwrap_or(0),
            expiry_policy: decoder.field()?,
            timeout: decoder.field()?.unwrap_or(0),
            dynamic: decoder.field()?.unwrap_or(false),
            dynamic_node_properties: decoder.field()?,
            distribution_mode: decoder.field()?,
            filter: decoder.field()?,
            default_outcome: decoder.field()?,
            outcomes: decoder.field()?,
            capabilities: decoder.field()?,
        })
    }
}

impl Encode for Source {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .optional(&self.address)
            .field(&self.durable)
            .optional(&self.expiry_policy)
            .field(&self.timeout)
            .field(&self.dynamic)
            .optional(&self.dynamic_node_properties)
            .optional(&self.distribution_mode)
            .optional(&self.filter)
            .optional(&self.default_outcome)
            .optional(&self.outcomes)
            .optional(&self.capabilities);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

impl Decode for Source {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        if code != fc::DESCRIBED {
            return Err(DecodeError::UnexpectedFormatCode(code));
        }
        match Descriptor::decode(buf)? {
            Descriptor::Code(Self::DESCRIPTOR) => Self::decode_composite(buf),
            Descriptor::Code(other) => Err(DecodeError::UnknownDescriptor(other)),
            Descriptor::Name(_) => Err(DecodeError::InvalidDescriptor),
        }
    }
}

/// Where a message lands on the receiving side of a link
/// (descriptor 0x29)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Target {
    pub address: Option<String>,
    pub durable: u32,
    pub expiry_policy: Option<Symbol>,
    pub timeout: Seconds,
    pub dynamic: bool,
    pub dynamic_node_properties: Option<Fields>,
    pub capabilities: Option<Array<Symbol>>,
}

impl Target {
    pub const DESCRIPTOR: u64 = 0x29;

    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            ..Default::default()
        }
    }

    fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            address: decoder.field()?,
            durable: decoder.field()?.unwrap_or(0),
            expiry_policy: decoder.field()?,
            timeout: decoder.field()?.unwrap_or(0),
            dynamic: decoder.field()?.unwrap_or(false),
            dynamic_node_properties: decoder.field()?,
            capabilities: decoder.field()?,
        })
    }
}

impl Encode for Target {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .optional(&self.address)
            .field(&self.durable)
            .optional(&self.expiry_policy)
            .field(&self.timeout)
            .field(&self.dynamic)
            .optional(&self.dynamic_node_properties)
            .optional(&self.capabilities);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

/// The target field of an attach: a plain target or a transaction
/// coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum TargetArchetype {
    Target(Target),
    Coordinator(Coordinator),
}

impl From<Target> for TargetArchetype {
    fn from(t: Target) -> Self {
        TargetArchetype::Target(t)
    }
}

impl From<Coordinator> for TargetArchetype {
    fn from(c: Coordinator) -> Self {
        TargetArchetype::Coordinator(c)
    }
}

impl Encode for TargetArchetype {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            TargetArchetype::Target(t) => t.encode(buf),
            TargetArchetype::Coordinator(c) => c.encode(buf),
        }
    }
}

impl Decode for TargetArchetype {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        if code != fc::DESCRIBED {
            return Err(DecodeError::UnexpectedFormatCode(code));
        }
        match Descriptor::decode(buf)? {
            Descriptor::Code(Target::DESCRIPTOR) => {
                Ok(TargetArchetype::Target(Target::decode_composite(buf)?))
            }
            Descriptor::Code(Coordinator::DESCRIPTOR) => Ok(TargetArchetype::Coordinator(
                Coordinator::decode_composite(buf)?,
            )),
            Descriptor::Code(other) => Err(DecodeError::UnknownDescriptor(other)),
            Descriptor::Name(_) => Err(DecodeError::InvalidDescriptor),
        }
    }
}

/* ----------------------------- delivery state ----------------------------- */

/// Partial delivery state reported on resumed transfers
/// (descriptor 0x23)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Received {
    pub section_number: u32,
    pub section_offset: u64,
}

impl Received {
    pub const DESCRIPTOR: u64 = 0x23;
}

/// Terminal state: the message was processed (descriptor 0x24)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accepted {}

impl Accepted {
    pub const DESCRIPTOR: u64 = 0x24;
}

/// Terminal state: the message was invalid at the receiver
/// (descriptor 0x25)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rejected {
    pub error: Option<Error>,
}

impl Rejected {
    pub const DESCRIPTOR: u64 = 0x25;
}

/// Terminal state: the message was not and will not be processed
/// (descriptor 0x26)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Released {}

impl Released {
    pub const DESCRIPTOR: u64 = 0x26;
}

/// Terminal state: the message was modified but not processed
/// (descriptor 0x27)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Modified {
    pub delivery_failed: Option<bool>,
    pub undeliverable_here: Option<bool>,
    pub message_annotations: Option<Fields>,
}

impl Modified {
    pub const DESCRIPTOR: u64 = 0x27;
}

/// A terminal outcome of a delivery
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Accepted(Accepted),
    Rejected(Rejected),
    Released(Released),
    Modified(Modified),
    Declared(Declared),
}

/// Any value carried in the state field of transfer and disposition
/// frames
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryState {
    Received(Received),
    Accepted(Accepted),
    Rejected(Rejected),
    Released(Released),
    Modified(Modified),
    Declared(Declared),
    TransactionalState(TransactionalState),
}

impl DeliveryState {
    /// Whether this state is a terminal outcome
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryState::Received(_))
    }
}

impl From<Outcome> for DeliveryState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Accepted(v) => DeliveryState::Accepted(v),
            Outcome::Rejected(v) => DeliveryState::Rejected(v),
            Outcome::Released(v) => DeliveryState::Released(v),
            Outcome::Modified(v) => DeliveryState::Modified(v),
            Outcome::Declared(v) => DeliveryState::Declared(v),
        }
    }
}

impl TryFrom<DeliveryState> for Outcome {
    type Error = DeliveryState;

    fn try_from(state: DeliveryState) -> Result<Self, DeliveryState> {
        match state {
            DeliveryState::Accepted(v) => Ok(Outcome::Accepted(v)),
            DeliveryState::Rejected(v) => Ok(Outcome::Rejected(v)),
            DeliveryState::Released(v) => Ok(Outcome::Released(v)),
            DeliveryState::Modified(v) => Ok(Outcome::Modified(v)),
            DeliveryState::Declared(v) => Ok(Outcome::Declared(v)),
            other => Err(other),
        }
    }
}

impl Encode for Received {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder.field(&self.section_number).field(&self.section_offset);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

impl Encode for Accepted {
    fn encode(&self, buf: &mut BytesMut) {
        CompositeEncoder::new().finish(Self::DESCRIPTOR, buf);
    }
}

impl Encode for Rejected {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder.optional(&self.error);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

impl Encode for Released {
    fn encode(&self, buf: &mut BytesMut) {
        CompositeEncoder::new().finish(Self::DESCRIPTOR, buf);
    }
}

impl Encode for Modified {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .optional(&self.delivery_failed)
            .optional(&self.undeliverable_here)
            .optional(&self.message_annotations);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

impl Encode for Outcome {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Outcome::Accepted(v) => v.encode(buf),
            Outcome::Rejected(v) => v.encode(buf),
            Outcome::Released(v) => v.encode(buf),
            Outcome::Modified(v) => v.encode(buf),
            Outcome::Declared(v) => v.encode(buf),
        }
    }
}

impl Encode for DeliveryState {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            DeliveryState::Received(v) => v.encode(buf),
            DeliveryState::Accepted(v) => v.encode(buf),
            DeliveryState::Rejected(v) => v.encode(buf),
            DeliveryState::Released(v) => v.encode(buf),
            DeliveryState::Modified(v) => v.encode(buf),
            DeliveryState::Declared(v) => v.encode(buf),
            DeliveryState::TransactionalState(v) => v.encode(buf),
        }
    }
}

impl Decode for DeliveryState {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        if code != fc::DESCRIBED {
            return Err(DecodeError::UnexpectedFormatCode(code));
        }
        let descriptor_code = match Descriptor::decode(buf)? {
            Descriptor::Code(code) => code,
            Descriptor::Name(_) => return Err(DecodeError::InvalidDescriptor),
        };
        let mut decoder = CompositeDecoder::new(buf)?;
        match descriptor_code {
            Received::DESCRIPTOR => Ok(DeliveryState::Received(Received {
                section_number: decoder.field()?.unwrap_or(0),
                section_offset: decoder.field()?.unwrap_or(0),
            })),
            Accepted::DESCRIPTOR => Ok(DeliveryState::Accepted(Accepted {})),
            Rejected::DESCRIPTOR => Ok(DeliveryState::Rejected(Rejected {
                error: decoder.field()?,
            })),
            Released::DESCRIPTOR => Ok(DeliveryState::Released(Released {})),
            Modified::DESCRIPTOR => Ok(DeliveryState::Modified(Modified {
                delivery_failed: decoder.field()?,
                undeliverable_here: decoder.field()?,
                message_annotations: decoder.field()?,
            })),
            Declared::DESCRIPTOR => Ok(DeliveryState::Declared(Declared {
                txn_id: decoder.required("txn-id")?,
            })),
            TransactionalState::DESCRIPTOR => {
                Ok(DeliveryState::TransactionalState(TransactionalState {
                    txn_id: decoder.required("txn-id")?,
                    outcome: decoder.field()?,
                }))
            }
            other => Err(DecodeError::UnknownDescriptor(other)),
        }
    }
}

impl Decode for Outcome {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        let state = DeliveryState::decode_body(code, buf)?;
        Outcome::try_from(state).map_err(|_| DecodeError::InvalidValue("outcome"))
    }
}

/* --------------------------------- message -------------------------------- */

/// Transport headers of a message (descriptor 0x70)
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub durable: bool,
    pub priority: u8,
    pub ttl: Option<Milliseconds>,
    pub first_acquirer: bool,
    pub delivery_count: u32,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            durable: false,
            priority: 4,
            ttl: None,
            first_acquirer: false,
            delivery_count: 0,
        }
    }
}

impl Header {
    pub const DESCRIPTOR: u64 = 0x70;
}

impl Encode for Header {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .field(&self.durable)
            .field(&self.priority)
            .optional(&self.ttl)
            .field(&self.first_acquirer)
            .field(&self.delivery_count);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

impl Header {
    fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            durable: decoder.field()?.unwrap_or(false),
            priority: decoder.field()?.unwrap_or(4),
            ttl: decoder.field()?,
            first_acquirer: decoder.field()?.unwrap_or(false),
            delivery_count: decoder.field()?.unwrap_or(0),
        })
    }
}

/// Immutable metadata of a message (descriptor 0x73)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    pub message_id: Option<Value>,
    pub user_id: Option<Binary>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub reply_to: Option<String>,
    pub correlation_id: Option<Value>,
    pub content_type: Option<Symbol>,
    pub content_encoding: Option<Symbol>,
    pub absolute_expiry_time: Option<Timestamp>,
    pub creation_time: Option<Timestamp>,
    pub group_id: Option<String>,
    pub group_sequence: Option<SequenceNo>,
    pub reply_to_group_id: Option<String>,
}

impl Properties {
    pub const DESCRIPTOR: u64 = 0x73;

    fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            message_id: decoder.field()?,
            user_id: decoder.field()?,
            to: decoder.field()?,
            subject: decoder.field()?,
            reply_to: decoder.field()?,
            correlation_id: decoder.field()?,
            content_type: decoder.field()?,
            content_encoding: decoder.field()?,
            absolute_expiry_time: decoder.field()?,
            creation_time: decoder.field()?,
            group_id: decoder.field()?,
            group_sequence: decoder.field()?,
            reply_to_group_id: decoder.field()?,
        })
    }
}

impl Encode for Properties {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .optional(&self.message_id)
            .optional(&self.user_id)
            .optional(&self.to)
            .optional(&self.subject)
            .optional(&self.reply_to)
            .optional(&self.correlation_id)
            .optional(&self.content_type)
            .optional(&self.content_encoding)
            .optional(&self.absolute_expiry_time)
            .optional(&self.creation_time)
            .optional(&self.group_id)
            .optional(&self.group_sequence)
            .optional(&self.reply_to_group_id);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

/// Delivery annotations section (descriptor 0x71)
pub type DeliveryAnnotations = OrderedMap<Symbol, Value>;
/// Message annotations section (descriptor 0x72)
pub type MessageAnnotations = OrderedMap<Symbol, Value>;
/// Application properties section (descriptor 0x74)
pub type ApplicationProperties = OrderedMap<String, Value>;
/// Footer section (descriptor 0x78)
pub type Footer = OrderedMap<Symbol, Value>;

const DELIVERY_ANNOTATIONS: u64 = 0x71;
const MESSAGE_ANNOTATIONS: u64 = 0x72;
const APPLICATION_PROPERTIES: u64 = 0x74;
const DATA: u64 = 0x75;
const AMQP_SEQUENCE: u64 = 0x76;
const AMQP_VALUE: u64 = 0x77;
const FOOTER: u64 = 0x78;

/// The body of a message: exactly one of the three body section kinds,
/// or nothing at all
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// One or more data sections, concatenated
    Data(Binary),
    /// One amqp-sequence section
    Sequence(Vec<Value>),
    /// One amqp-value section
    Value(Value),
    /// No body section was present
    Empty,
}

impl Body {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }
}

/// A complete message: its sections in specification order
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: Option<Header>,
    pub delivery_annotations: Option<DeliveryAnnotations>,
    pub message_annotations: Option<MessageAnnotations>,
    pub properties: Option<Properties>,
    pub application_properties: Option<ApplicationProperties>,
    pub body: Body,
    pub footer: Option<Footer>,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            header: None,
            delivery_annotations: None,
            message_annotations: None,
            properties: None,
            application_properties: None,
            body: Body::Empty,
            footer: None,
        }
    }
}

impl Message {
    /// A message whose body is a single amqp-value section
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            body: Body::Value(value.into()),
            ..Default::default()
        }
    }

    /// A message whose body is a data section
    pub fn data(data: impl Into<Binary>) -> Self {
        Self {
            body: Body::Data(data.into()),
            ..Default::default()
        }
    }

    /// Serializes the message into payload bytes for a transfer
    pub fn to_payload(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Deserializes a message from the payload of a completed delivery
    pub fn from_payload(mut payload: Bytes) -> Result<Self, DecodeError> {
        let mut message = Message::default();
        let mut data = BytesMut::new();
        let mut saw_data = false;

        while !payload.is_empty() {
            let descriptor_code = codec::peek_descriptor_code(&payload)?
                .ok_or(DecodeError::InvalidDescriptor)?;
            // consume the descriptor we just peeked
            codec::decode_descriptor(&mut payload)?;
            match descriptor_code {
                Header::DESCRIPTOR => {
                    message.header = Some(Header::decode_composite(&mut payload)?);
                }
                DELIVERY_ANNOTATIONS => {
                    message.delivery_annotations =
                        Some(DeliveryAnnotations::decode(&mut payload)?);
                }
                MESSAGE_ANNOTATIONS => {
                    message.message_annotations =
                        Some(MessageAnnotations::decode(&mut payload)?);
                }
                Properties::DESCRIPTOR => {
                    message.properties = Some(Properties::decode_composite(&mut payload)?);
                }
                APPLICATION_PROPERTIES => {
                    message.application_properties =
                        Some(ApplicationProperties::decode(&mut payload)?);
                }
                DATA => {
                    let section = Binary::decode(&mut payload)?;
                    data.put_slice(&section);
                    saw_data = true;
                }
                AMQP_SEQUENCE => {
                    message.body = Body::Sequence(Vec::<Value>::decode(&mut payload)?);
                }
                AMQP_VALUE => {
                    message.body = Body::Value(Value::decode(&mut payload)?);
                }
                FOOTER => {
                    message.footer = Some(Footer::decode(&mut payload)?);
                }
                other => return Err(DecodeError::UnknownDescriptor(other)),
            }
        }

        if saw_data {
            message.body = Body::Data(data.freeze());
        }
        Ok(message)
    }
}

impl Encode for Message {
    fn encode(&self, buf: &mut BytesMut) {
        if let Some(header) = &self.header {
            header.encode(buf);
        }
        if let Some(annotations) = &self.delivery_annotations {
            codec::encode_descriptor_code(DELIVERY_ANNOTATIONS, buf);
            annotations.encode(buf);
        }
        if let Some(annotations) = &self.message_annotations {
            codec::encode_descriptor_code(MESSAGE_ANNOTATIONS, buf);
            annotations.encode(buf);
        }
        if let Some(properties) = &self.properties {
            properties.encode(buf);
        }
        if let Some(properties) = &self.application_properties {
            codec::encode_descriptor_code(APPLICATION_PROPERTIES, buf);
            properties.encode(buf);
        }
        match &self.body {
            Body::Data(data) => {
                codec::encode_descriptor_code(DATA, buf);
                data.encode(buf);
            }
            Body::Sequence(values) => {
                codec::encode_descriptor_code(AMQP_SEQUENCE, buf);
                values.encode(buf);
            }
            Body::Value(value) => {
                codec::encode_descriptor_code(AMQP_VALUE, buf);
                value.encode(buf);
            }
            Body::Empty => {}
        }
        if let Some(footer) = &self.footer {
            codec::encode_descriptor_code(FOOTER, buf);
            footer.encode(buf);
        }
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Message::value(s)
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Message::value(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_message_roundtrip() {
        let message = Message::value("hello");
        let payload = message.to_payload();
        let decoded = Message::from_payload(payload).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn full_message_roundtrip() {
        let mut app_props = ApplicationProperties::new();
        app_props.insert("retries".to_string(), Value::Uint(3));
        let message = Message {
            header: Some(Header {
                durable: true,
                priority: 9,
                ttl: Some(60_000),
                ..Default::default()
            }),
            properties: Some(Properties {
                message_id: Some(Value::Ulong(17)),
                to: Some("orders".to_string()),
                content_type: Some(Symbol::from("application/json")),
                ..Default::default()
            }),
            delivery_annotations: None,
            message_annotations: None,
            application_properties: Some(app_props),
            body: Body::Data(Binary::from_static(b"{\"id\":17}")),
            footer: None,
        };
        let decoded = Message::from_payload(message.to_payload()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn multiple_data_sections_concatenate() {
        let mut buf = BytesMut::new();
        codec::encode_descriptor_code(DATA, &mut buf);
        Binary::from_static(b"first;").encode(&mut buf);
        codec::encode_descriptor_code(DATA, &mut buf);
        Binary::from_static(b"second").encode(&mut buf);

        let decoded = Message::from_payload(buf.freeze()).unwrap();
        assert_eq!(decoded.body, Body::Data(Binary::from_static(b"first;second")));
    }

    #[test]
    fn bodyless_message_is_empty() {
        let message = Message {
            header: Some(Header::default()),
            ..Default::default()
        };
        let decoded = Message::from_payload(message.to_payload()).unwrap();
        assert!(decoded.body.is_empty());
    }

    #[test]
    fn delivery_state_roundtrips() {
        let states = vec![
            DeliveryState::Received(Received {
                section_number: 1,
                section_offset: 256,
            }),
            DeliveryState::Accepted(Accepted {}),
            DeliveryState::Rejected(Rejected { error: None }),
            DeliveryState::Released(Released {}),
            DeliveryState::Modified(Modified {
                delivery_failed: Some(true),
                undeliverable_here: None,
                message_annotations: None,
            }),
        ];
        for state in states {
            let mut buf = BytesMut::new();
            state.encode(&mut buf);
            let mut bytes = buf.freeze();
            assert_eq!(DeliveryState::decode(&mut bytes).unwrap(), state);
        }
    }

    #[test]
    fn source_target_roundtrip() {
        let source = Source::with_address("queue-a");
        let mut buf = BytesMut::new();
        source.encode(&mut buf);
        let mut bytes = buf.freeze();
        assert_eq!(Source::decode(&mut bytes).unwrap(), source);

        let target = TargetArchetype::from(Target::with_address("queue-b"));
        let mut buf = BytesMut::new();
        target.encode(&mut buf);
        let mut bytes = buf.freeze();
        assert_eq!(TargetArchetype::decode(&mut bytes).unwrap(), target);
    }
}
