//! Types of the transactions extension (part 4.5)

use bytes::{Bytes, BytesMut};

use crate::codec::{CompositeDecoder, CompositeEncoder, Decode, DecodeError, Encode};
use crate::format_code as fc;
use crate::messaging::Outcome;
use crate::primitives::{Array, Binary, Symbol};
use crate::value::Descriptor;

/// Identifies a transaction within the scope of its controller
pub type TransactionId = Binary;

/// Capability symbols a coordinator may offer or desire
pub mod capability {
    pub const LOCAL_TRANSACTIONS: &str = "amqp:local-transactions";
    pub const DISTRIBUTED_TRANSACTIONS: &str = "amqp:distributed-transactions";
    pub const PROMOTABLE_TRANSACTIONS: &str = "amqp:promotable-transactions";
    pub const MULTI_TXNS_PER_SSN: &str = "amqp:multi-txns-per-ssn";
    pub const MULTI_SSNS_PER_TXN: &str = "amqp:multi-ssns-per-txn";
}

/// The target of a control link (descriptor 0x30)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coordinator {
    pub capabilities: Option<Array<Symbol>>,
}

impl Coordinator {
    pub const DESCRIPTOR: u64 = 0x30;

    pub(crate) fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            capabilities: decoder.field()?,
        })
    }
}

impl Encode for Coordinator {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder.optional(&self.capabilities);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

/// Asks the coordinator to allocate a new transaction
/// (descriptor 0x31). Sent as the body of a message on the control
/// link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declare {
    /// Reserved for distributed transactions; always null here
    pub global_id: Option<crate::value::Value>,
}

impl Declare {
    pub const DESCRIPTOR: u64 = 0x31;
}

impl Encode for Declare {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder.optional(&self.global_id);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

impl Decode for Declare {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        expect_descriptor(code, buf, Self::DESCRIPTOR)?;
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            global_id: decoder.field()?,
        })
    }
}

/// Asks the coordinator to commit or roll back a transaction
/// (descriptor 0x32)
#[derive(Debug, Clone, PartialEq)]
pub struct Discharge {
    pub txn_id: TransactionId,
    /// Set to roll the transaction back instead of committing it
    pub fail: Option<bool>,
}

impl Discharge {
    pub const DESCRIPTOR: u64 = 0x32;
}

impl Encode for Discharge {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder.field(&self.txn_id).optional(&self.fail);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

impl Decode for Discharge {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        expect_descriptor(code, buf, Self::DESCRIPTOR)?;
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            txn_id: decoder.required("txn-id")?,
            fail: decoder.field()?,
        })
    }
}

/// Outcome reporting the transaction id allocated by a declare
/// (descriptor 0x33)
#[derive(Debug, Clone, PartialEq)]
pub struct Declared {
    pub txn_id: TransactionId,
}

impl Declared {
    pub const DESCRIPTOR: u64 = 0x33;
}

impl Encode for Declared {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder.field(&self.txn_id);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

/// Delivery state that enrolls a transfer or disposition in a
/// transaction (descriptor 0x34)
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionalState {
    pub txn_id: TransactionId,
    /// The provisional outcome to apply when the transaction commits
    pub outcome: Option<Outcome>,
}

impl TransactionalState {
    pub const DESCRIPTOR: u64 = 0x34;
}

impl Encode for TransactionalState {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder.field(&self.txn_id).optional(&self.outcome);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

fn expect_descriptor(code: u8, buf: &mut Bytes, expected: u64) -> Result<(), DecodeError> {
    if code != fc::DESCRIBED {
        return Err(DecodeError::UnexpectedFormatCode(code));
    }
    match Descriptor::decode(buf)? {
        Descriptor::Code(code) if code == expected => Ok(()),
        Descriptor::Code(other) => Err(DecodeError::UnknownDescriptor(other)),
        Descriptor::Name(_) => Err(DecodeError::InvalidDescriptor),
    }
}
