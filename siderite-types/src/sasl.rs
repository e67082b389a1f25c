//! Frame bodies of the SASL security layer (part 5.3)

use bytes::{Bytes, BytesMut};

use crate::codec::{CompositeDecoder, CompositeEncoder, Decode, DecodeError, Encode};
use crate::format_code as fc;
use crate::primitives::{Array, Binary, Symbol};
use crate::value::Descriptor;

/// Advertises the mechanisms the server supports (descriptor 0x40)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaslMechanisms {
    pub sasl_server_mechanisms: Array<Symbol>,
}

impl SaslMechanisms {
    pub const DESCRIPTOR: u64 = 0x40;
}

impl Encode for SaslMechanisms {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder.field(&self.sasl_server_mechanisms);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

/// Selects a mechanism and optionally carries an initial response
/// (descriptor 0x41)
#[derive(Debug, Clone, PartialEq)]
pub struct SaslInit {
    pub mechanism: Symbol,
    pub initial_response: Option<Binary>,
    pub hostname: Option<String>,
}

impl SaslInit {
    pub const DESCRIPTOR: u64 = 0x41;
}

impl Encode for SaslInit {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder
            .field(&self.mechanism)
            .optional(&self.initial_response)
            .optional(&self.hostname);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

/// A server challenge (descriptor 0x42)
#[derive(Debug, Clone, PartialEq)]
pub struct SaslChallenge {
    pub challenge: Binary,
}

impl SaslChallenge {
    pub const DESCRIPTOR: u64 = 0x42;
}

impl Encode for SaslChallenge {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder.field(&self.challenge);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

/// A client response to a challenge (descriptor 0x43)
#[derive(Debug, Clone, PartialEq)]
pub struct SaslResponse {
    pub response: Binary,
}

impl SaslResponse {
    pub const DESCRIPTOR: u64 = 0x43;
}

impl Encode for SaslResponse {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder.field(&self.response);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

/// Reports the result of the exchange (descriptor 0x44)
#[derive(Debug, Clone, PartialEq)]
pub struct SaslOutcome {
    pub code: SaslCode,
    pub additional_data: Option<Binary>,
}

impl SaslOutcome {
    pub const DESCRIPTOR: u64 = 0x44;
}

impl Encode for SaslOutcome {
    fn encode(&self, buf: &mut BytesMut) {
        let mut encoder = CompositeEncoder::new();
        encoder.field(&self.code).optional(&self.additional_data);
        encoder.finish(Self::DESCRIPTOR, buf);
    }
}

/// Result code of a SASL exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslCode {
    Ok,
    Auth,
    Sys,
    SysPerm,
    SysTemp,
}

impl Encode for SaslCode {
    fn encode(&self, buf: &mut BytesMut) {
        let v: u8 = match self {
            SaslCode::Ok => 0,
            SaslCode::Auth => 1,
            SaslCode::Sys => 2,
            SaslCode::SysPerm => 3,
            SaslCode::SysTemp => 4,
        };
        v.encode(buf)
    }
}

impl Decode for SaslCode {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        match u8::decode_body(code, buf)? {
            0 => Ok(SaslCode::Ok),
            1 => Ok(SaslCode::Auth),
            2 => Ok(SaslCode::Sys),
            3 => Ok(SaslCode::SysPerm),
            4 => Ok(SaslCode::SysTemp),
            _ => Err(DecodeError::InvalidValue("sasl-code")),
        }
    }
}

/// Any frame body of the SASL layer
#[derive(Debug, Clone, PartialEq)]
pub enum SaslFrameBody {
    Mechanisms(SaslMechanisms),
    Init(SaslInit),
    Challenge(SaslChallenge),
    Response(SaslResponse),
    Outcome(SaslOutcome),
}

impl Encode for SaslFrameBody {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            SaslFrameBody::Mechanisms(b) => b.encode(buf),
            SaslFrameBody::Init(b) => b.encode(buf),
            SaslFrameBody::Challenge(b) => b.encode(buf),
            SaslFrameBody::Response(b) => b.encode(buf),
            SaslFrameBody::Outcome(b) => b.encode(buf),
        }
    }
}

impl Decode for SaslFrameBody {
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
            SaslMechanisms::DESCRIPTOR => Ok(SaslFrameBody::Mechanisms(SaslMechanisms {
                sasl_server_mechanisms: decoder
                    .field()?
                    .ok_or(DecodeError::MandatoryFieldOmitted("sasl-server-mechanisms"))?,
            })),
            SaslInit::DESCRIPTOR => Ok(SaslFrameBody::Init(SaslInit {
                mechanism: decoder.required("mechanism")?,
                initial_response: decoder.field()?,
                hostname: decoder.field()?,
            })),
            SaslChallenge::DESCRIPTOR => Ok(SaslFrameBody::Challenge(SaslChallenge {
                challenge: decoder.required("challenge")?,
            })),
            SaslResponse::DESCRIPTOR => Ok(SaslFrameBody::Response(SaslResponse {
                response: decoder.required("response")?,
            })),
            SaslOutcome::DESCRIPTOR => Ok(SaslFrameBody::Outcome(SaslOutcome {
                code: decoder.required("code")?,
                additional_data: decoder.field()?,
            })),
            other => Err(DecodeError::UnknownDescriptor(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(body: SaslFrameBody) {
        let mut buf = BytesMut::new();
        body.encode(&mut buf);
        let mut bytes = buf.freeze();
        assert_eq!(SaslFrameBody::decode(&mut bytes).unwrap(), body);
    }

    #[test]
    fn sasl_body_roundtrips() {
        roundtrip(SaslFrameBody::Mechanisms(SaslMechanisms {
            sasl_server_mechanisms: Array::from(vec![
                Symbol::from("PLAIN"),
                Symbol::from("ANONYMOUS"),
            ]),
        }));
        roundtrip(SaslFrameBody::Init(SaslInit {
            mechanism: Symbol::from("PLAIN"),
            initial_response: Some(Binary::from_static(b"\x00user\x00pass")),
            hostname: Some("broker".to_string()),
        }));
        roundtrip(SaslFrameBody::Challenge(SaslChallenge {
            challenge: Binary::from_static(b"nonce"),
        }));
        roundtrip(SaslFrameBody::Response(SaslResponse {
            response: Binary::from_static(b"proof"),
        }));
        roundtrip(SaslFrameBody::Outcome(SaslOutcome {
            code: SaslCode::Ok,
            additional_data: None,
        }));
    }

    #[test]
    fn outcome_code_out_of_range_rejected() {
        let outcome = SaslOutcome {
            code: SaslCode::Ok,
            additional_data: None,
        };
        let mut buf = BytesMut::new();
        outcome.encode(&mut buf);
        // corrupt the code byte
        let pos = buf.len() - 1;
        buf[pos] = 9;
        let mut bytes = buf.freeze();
        assert!(SaslFrameBody::decode(&mut bytes).is_err());
    }
}
