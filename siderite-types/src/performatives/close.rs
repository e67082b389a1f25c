//! The close performative (part 2.7.9)

use bytes::{Bytes, BytesMut};

use crate::codec::{CompositeDecoder, CompositeEncoder, DecodeError, Encode};
use crate::definitions::Error;

/// Closes a connection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Close {
    pub error: Option<Error>,
}

impl Close {
    pub const DESCRIPTOR: u64 = 0x18;

    pub(crate) fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            error: decoder.field()?,
        })
    }
}

impl Encode for Close {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder.optional(&self.error);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}
