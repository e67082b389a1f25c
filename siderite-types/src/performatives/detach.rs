//! The detach performative (part 2.7.7)

use bytes::{Bytes, BytesMut};

use crate::codec::{CompositeDecoder, CompositeEncoder, DecodeError, Encode};
use crate::definitions::{Error, Handle};

/// Detaches a link endpoint from its session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detach {
    pub handle: Handle,
    /// Set when the link itself is being closed, not just the endpoint
    pub closed: bool,
    pub error: Option<Error>,
}

impl Detach {
    pub const DESCRIPTOR: u64 = 0x16;

    pub(crate) fn decode_composite(buf: &mut Bytes) -> Result<Self, DecodeError> {
        let mut decoder = CompositeDecoder::new(buf)?;
        Ok(Self {
            handle: decoder.required("handle")?,
            closed: decoder.field()?.unwrap_or(false),
            error: decoder.field()?,
        })
    }
}

impl Encode for Detach {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .field(&self.handle)
            .field(&self.closed)
            .optional(&self.error);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}
