//! Shared definitions used across the protocol (part 2.8)

use bytes::{Bytes, BytesMut};

use crate::codec::{
    CompositeDecoder, CompositeEncoder, Decode, DecodeError, Encode,
};
use crate::primitives::{Binary, OrderedMap, Symbol};
use crate::value::Value;

/// Protocol major version
pub const MAJOR: u8 = 1;
/// Protocol minor version
pub const MINOR: u8 = 0;
/// Protocol revision
pub const REVISION: u8 = 0;

/// The smallest max-frame-size a peer is allowed to advertise
pub const MIN_MAX_FRAME_SIZE: usize = 512;

/// IANA assigned port for AMQP over plain TCP
pub const AMQP_PORT: u16 = 5672;

/// A sequence number in RFC-1982 serial arithmetic
pub type SequenceNo = u32;

/// Position of a transfer in the session's transfer sequence
pub type TransferNumber = SequenceNo;

/// Identifier of a delivery within a session
pub type DeliveryNumber = SequenceNo;

/// A duration in milliseconds
pub type Milliseconds = u32;

/// A duration in seconds
pub type Seconds = u32;

/// Format indicator carried on transfer frames
pub type MessageFormat = u32;

/// The tag that identifies a delivery on a link
pub type DeliveryTag = Binary;

/// A symbol-keyed map of extension fields
pub type Fields = OrderedMap<Symbol, Value>;

/// Identifies an endpoint within a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(pub u32);

impl From<u32> for Handle {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl From<Handle> for u32 {
    fn from(h: Handle) -> Self {
        h.0
    }
}

impl Encode for Handle {
    fn encode(&self, buf: &mut BytesMut) {
        self.0.encode(buf)
    }
}

impl Decode for Handle {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        u32::decode_body(code, buf).map(Handle)
    }
}

/// Which end of a link a peer occupies. Encoded as a boolean where
/// the receiver is `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    #[default]
    Sender,
    Receiver,
}

impl Role {
    pub fn is_sender(&self) -> bool {
        matches!(self, Role::Sender)
    }
}

impl Encode for Role {
    fn encode(&self, buf: &mut BytesMut) {
        matches!(self, Role::Receiver).encode(buf)
    }
}

impl Decode for Role {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match bool::decode_body(code, buf)? {
            false => Ok(Role::Sender),
            true => Ok(Role::Receiver),
        }
    }
}

/// When the sender of a link settles its deliveries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SenderSettleMode {
    /// Every delivery is sent unsettled
    Unsettled,
    /// Every delivery is sent settled
    Settled,
    /// Deliveries may be sent either way
    #[default]
    Mixed,
}

impl Encode for SenderSettleMode {
    fn encode(&self, buf: &mut BytesMut) {
        let v: u8 = match self {
            SenderSettleMode::Unsettled => 0,
            SenderSettleMode::Settled => 1,
            SenderSettleMode::Mixed => 2,
        };
        v.encode(buf)
    }
}

impl Decode for SenderSettleMode {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match u8::decode_body(code, buf)? {
            0 => Ok(SenderSettleMode::Unsettled),
            1 => Ok(SenderSettleMode::Settled),
            2 => Ok(SenderSettleMode::Mixed),
            _ => Err(DecodeError::InvalidValue("snd-settle-mode")),
        }
    }
}

/// When the receiver of a link settles its deliveries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReceiverSettleMode {
    /// Settle immediately on receipt
    #[default]
    First,
    /// Settle only after the sender has settled
    Second,
}

impl Encode for ReceiverSettleMode {
    fn encode(&self, buf: &mut BytesMut) {
        let v: u8 = match self {
            ReceiverSettleMode::First => 0,
            ReceiverSettleMode::Second => 1,
        };
        v.encode(buf)
    }
}

impl Decode for ReceiverSettleMode {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match u8::decode_body(code, buf)? {
            0 => Ok(ReceiverSettleMode::First),
            1 => Ok(ReceiverSettleMode::Second),
            _ => Err(DecodeError::InvalidValue("rcv-settle-mode")),
        }
    }
}

/// Shared error conditions (part 2.8.15)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmqpError {
    InternalError,
    NotFound,
    UnauthorizedAccess,
    DecodeError,
    ResourceLimitExceeded,
    NotAllowed,
    InvalidField,
    NotImplemented,
    ResourceLocked,
    PreconditionFailed,
    ResourceDeleted,
    IllegalState,
    FrameSizeTooSmall,
}

impl AmqpError {
    pub fn symbol(&self) -> Symbol {
        let s = match self {
            AmqpError::InternalError => "amqp:internal-error",
            AmqpError::NotFound => "amqp:not-found",
            AmqpError::UnauthorizedAccess => "amqp:unauthorized-access",
            AmqpError::DecodeError => "amqp:decode-error",
            AmqpError::ResourceLimitExceeded => "amqp:resource-limit-exceeded",
            AmqpError::NotAllowed => "amqp:not-allowed",
            AmqpError::InvalidField => "amqp:invalid-field",
            AmqpError::NotImplemented => "amqp:not-implemented",
            AmqpError::ResourceLocked => "amqp:resource-locked",
            AmqpError::PreconditionFailed => "amqp:precondition-failed",
            AmqpError::ResourceDeleted => "amqp:resource-deleted",
            AmqpError::IllegalState => "amqp:illegal-state",
            AmqpError::FrameSizeTooSmall => "amqp:frame-size-too-small",
        };
        Symbol::from(s)
    }
}

/// Conditions that end a connection (part 2.8.16)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionError {
    ConnectionForced,
    FramingError,
    Redirect,
}

impl ConnectionError {
    pub fn symbol(&self) -> Symbol {
        let s = match self {
            ConnectionError::ConnectionForced => "amqp:connection:forced",
            ConnectionError::FramingError => "amqp:connection:framing-error",
            ConnectionError::Redirect => "amqp:connection:redirect",
        };
        Symbol::from(s)
    }
}

/// Conditions that end a session (part 2.8.17)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionError {
    WindowViolation,
    ErrantLink,
    HandleInUse,
    UnattachedHandle,
}

impl SessionError {
    pub fn symbol(&self) -> Symbol {
        let s = match self {
            SessionError::WindowViolation => "amqp:session:window-violation",
            SessionError::ErrantLink => "amqp:session:errant-link",
            SessionError::HandleInUse => "amqp:session:handle-in-use",
            SessionError::UnattachedHandle => "amqp:session:unattached-handle",
        };
        Symbol::from(s)
    }
}

/// Conditions that detach a link (part 2.8.18)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkError {
    DetachForced,
    TransferLimitExceeded,
    MessageSizeExceeded,
    Redirect,
    Stolen,
}

impl LinkError {
    pub fn symbol(&self) -> Symbol {
        let s = match self {
            LinkError::DetachForced => "amqp:link:detach-forced",
            LinkError::TransferLimitExceeded => "amqp:link:transfer-limit-exceeded",
            LinkError::MessageSizeExceeded => "amqp:link:message-size-exceeded",
            LinkError::Redirect => "amqp:link:redirect",
            LinkError::Stolen => "amqp:link:stolen",
        };
        Symbol::from(s)
    }
}

/// Conditions raised by the transaction extension (part 4.5.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionError {
    UnknownId,
    TransactionRollback,
    TransactionTimeout,
}

impl TransactionError {
    pub fn symbol(&self) -> Symbol {
        let s = match self {
            TransactionError::UnknownId => "amqp:transaction:unknown-id",
            TransactionError::TransactionRollback => "amqp:transaction:rollback",
            TransactionError::TransactionTimeout => "amqp:transaction:timeout",
        };
        Symbol::from(s)
    }
}

/// Any error condition a peer can carry in an [`Error`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCondition {
    Amqp(AmqpError),
    Connection(ConnectionError),
    Session(SessionError),
    Link(LinkError),
    Transaction(TransactionError),
    Custom(Symbol),
}

impl ErrorCondition {
    pub fn symbol(&self) -> Symbol {
        match self {
            ErrorCondition::Amqp(e) => e.symbol(),
            ErrorCondition::Connection(e) => e.symbol(),
            ErrorCondition::Session(e) => e.symbol(),
            ErrorCondition::Link(e) => e.symbol(),
            ErrorCondition::Transaction(e) => e.symbol(),
            ErrorCondition::Custom(s) => s.clone(),
        }
    }
}

impl From<AmqpError> for ErrorCondition {
    fn from(e: AmqpError) -> Self {
        ErrorCondition::Amqp(e)
    }
}

impl From<ConnectionError> for ErrorCondition {
    fn from(e: ConnectionError) -> Self {
        ErrorCondition::Connection(e)
    }
}

impl From<SessionError> for ErrorCondition {
    fn from(e: SessionError) -> Self {
        ErrorCondition::Session(e)
    }
}

impl From<LinkError> for ErrorCondition {
    fn from(e: LinkError) -> Self {
        ErrorCondition::Link(e)
    }
}

impl From<TransactionError> for ErrorCondition {
    fn from(e: TransactionError) -> Self {
        ErrorCondition::Transaction(e)
    }
}

impl From<Symbol> for ErrorCondition {
    fn from(s: Symbol) -> Self {
        match s.as_str() {
            "amqp:internal-error" => AmqpError::InternalError.into(),
            "amqp:not-found" => AmqpError::NotFound.into(),
            "amqp:unauthorized-access" => AmqpError::UnauthorizedAccess.into(),
            "amqp:decode-error" => AmqpError::DecodeError.into(),
            "amqp:resource-limit-exceeded" => AmqpError::ResourceLimitExceeded.into(),
            "amqp:not-allowed" => AmqpError::NotAllowed.into(),
            "amqp:invalid-field" => AmqpError::InvalidField.into(),
            "amqp:not-implemented" => AmqpError::NotImplemented.into(),
            "amqp:resource-locked" => AmqpError::ResourceLocked.into(),
            "amqp:precondition-failed" => AmqpError::PreconditionFailed.into(),
            "amqp:resource-deleted" => AmqpError::ResourceDeleted.into(),
            "amqp:illegal-state" => AmqpError::IllegalState.into(),
            "amqp:frame-size-too-small" => AmqpError::FrameSizeTooSmall.into(),
            "amqp:connection:forced" => ConnectionError::ConnectionForced.into(),
            "amqp:connection:framing-error" => ConnectionError::FramingError.into(),
            "amqp:connection:redirect" => ConnectionError::Redirect.into(),
            "amqp:session:window-violation" => SessionError::WindowViolation.into(),
            "amqp:session:errant-link" => SessionError::ErrantLink.into(),
            "amqp:session:handle-in-use" => SessionError::HandleInUse.into(),
            "amqp:session:unattached-handle" => SessionError::UnattachedHandle.into(),
            "amqp:link:detach-forced" => LinkError::DetachForced.into(),
            "amqp:link:transfer-limit-exceeded" => LinkError::TransferLimitExceeded.into(),
            "amqp:link:message-size-exceeded" => LinkError::MessageSizeExceeded.into(),
            "amqp:link:redirect" => LinkError::Redirect.into(),
            "amqp:link:stolen" => LinkError::Stolen.into(),
            "amqp:transaction:unknown-id" => TransactionError::UnknownId.into(),
            "amqp:transaction:rollback" => TransactionError::TransactionRollback.into(),
            "amqp:transaction:timeout" => TransactionError::TransactionTimeout.into(),
            _ => ErrorCondition::Custom(s),
        }
    }
}

/// The error composite carried on close, end, detach and disposition
/// frames (descriptor 0x1d)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    /// A symbolic value indicating the error class
    pub condition: ErrorCondition,
    /// Human readable supplement to the condition
    pub description: Option<String>,
    /// Peer-specific extension fields
    pub info: Option<Fields>,
}

impl Error {
    pub const DESCRIPTOR: u64 = 0x1d;

    pub fn new(condition: impl Into<ErrorCondition>, description: Option<String>) -> Self {
        Self {
            condition: condition.into(),
            description,
            info: None,
        }
    }
}

impl Encode for Error {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .field(&self.condition.symbol())
            .optional(&self.description)
            .optional(&self.info);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

impl Error {
    /// Decodes the composite body after its descriptor was consumed
    pub fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        let condition: Symbol = decoder.required("condition")?;
        Ok(Self {
            condition: ErrorCondition::from(condition),
            description: decoder.field()?,
            info: decoder.field()?,
        })
    }
}

impl Decode for Error {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        if code != crate::format_code::DESCRIBED {
            return Err(DecodeError::UnexpectedFormatCode(code));
        }
        match crate::value::Descriptor::decode(buf)? {
            crate::value::Descriptor::Code(Self::DESCRIPTOR) => Self::decode_composite(buf),
            crate::value::Descriptor::Code(other) => {
                Err(DecodeError::UnknownDescriptor(other))
            }
            crate::value::Descriptor::Name(_) => Err(DecodeError::InvalidDescriptor),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.condition.symbol())?;
        if let Some(description) = &self.description {
            write!(f, ": {}", description)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_encoding_is_boolean() {
        let mut buf = BytesMut::new();
        Role::Sender.encode(&mut buf);
        assert_eq!(&buf[..], &[crate::format_code::BOOLEAN_FALSE]);

        let mut buf = BytesMut::new();
        Role::Receiver.encode(&mut buf);
        assert_eq!(&buf[..], &[crate::format_code::BOOLEAN_TRUE]);
    }

    #[test]
    fn error_roundtrip() {
        let error = Error::new(
            LinkError::DetachForced,
            Some("administrative shutdown".to_string()),
        );
        let mut buf = BytesMut::new();
        error.encode(&mut buf);
        let mut bytes = buf.freeze();
        let decoded = Error::decode(&mut bytes).unwrap();
        assert_eq!(decoded, error);
    }

    #[test]
    fn condition_symbol_roundtrip() {
        let condition = ErrorCondition::from(Symbol::from("amqp:session:window-violation"));
        assert_eq!(
            condition,
            ErrorCondition::Session(SessionError::WindowViolation)
        );
        let custom = ErrorCondition::from(Symbol::from("vendor:custom"));
        assert!(matches!(custom, ErrorCondition::Custom(_)));
    }
}
