//! The disposition performative (part 2.7.6)

use bytes::{Bytes, BytesMut};

use crate::codec::{CompositeDecoder, CompositeEncoder, DecodeError, Encode};
use crate::definitions::{DeliveryNumber, Role};
use crate::messaging::DeliveryState;

/// Settles or updates the state of a contiguous range of deliveries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Disposition {
    /// The role of the peer whose deliveries are being updated
    pub role: Role,
    pub first: DeliveryNumber,
    /// Defaults to `first` when absent
    pub last: Option<DeliveryNumber>,
    pub settled: bool,
    pub state: Option<DeliveryState>,
    pub batchable: bool,
}

impl Disposition {
    pub const DESCRIPTOR: u64 = 0x15;

    pub(crate) fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            role: decoder.required("role")?,
            first: decoder.required("first")?,
            last: decoder.field()?,
            settled: decoder.field()?.unwrap_or(false),
            state: decoder.field()?,
            batchable: decoder.field()?.unwrap_or(false),
        })
    }
}

impl Encode for Disposition {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .field(&self.role)
            .field(&self.first)
            .optional(&self.last)
            .field(&self.settled)
            .optional(&self.state)
            .field(&self.batchable);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}
