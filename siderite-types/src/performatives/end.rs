//! The end performative (part 2.7.8)

use bytes::{Bytes, BytesMut};

use crate::codec::{CompositeDecoder, CompositeEncoder, DecodeError, Encode};
use crate::definitions::Error;

/// Ends a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct End {
    pub error: Option<Error>,
}

impl End {
    pub const DESCRIPTOR: u64 = 0x17;

    pub(crate) fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            error: decoder.field()?,
        })
    }
}

impl Encode for End {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder.optional(&self.error);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}
