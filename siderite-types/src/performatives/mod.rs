//! The nine performatives that drive connection, session and link
//! endpoints (part 2.7)

mod attach;
mod begin;
mod close;
mod detach;
mod disposition;
mod end;
mod flow;
mod open;
mod transfer;

pub use attach::Attach;
pub use begin::Begin;
pub use close::Close;
pub use detach::Detach;
pub use disposition::Disposition;
pub use end::End;
pub use flow::Flow;
pub use open::{ChannelMax, MaxFrameSize, Open};
pub use transfer::Transfer;

use bytes::{Bytes, BytesMut};

use crate::codec::{Decode, DecodeError, Encode};
use crate::format_code as fc;
use crate::value::Descriptor;

/// The body of an AMQP frame
#[derive(Debug, Clone, PartialEq)]
pub enum Performative {
    Open(Open),
    Begin(Begin),
    Attach(Attach),
    Flow(Flow),
    Transfer(Transfer),
    Disposition(Disposition),
    Detach(Detach),
    End(End),
    Close(Close),
}

impl Encode for Performative {
    fn encode(&self, buf: &mut BytesMut) {
        match self {
            Performative::Open(p) => p.encode(buf),
            Performative::Begin(p) => p.encode(buf),
            Performative::Attach(p) => p.encode(buf),
            Performative::Flow(p) => p.encode(buf),
            Performative::Transfer(p) => p.encode(buf),
            Performative::Disposition(p) => p.encode(buf),
            Performative::Detach(p) => p.encode(buf),
            Performative::End(p) => p.encode(buf),
            Performative::Close(p) => p.encode(buf),
        }
    }
}

impl Decode for Performative {
    fn decode_body(code: u8, buf: &mut Bytes) -> Result<Self, DecodeError> {
        if code != fc::DESCRIBED {
            return Err(DecodeError::UnexpectedFormatCode(code));
        }
        let descriptor_code = match Descriptor::decode(buf)? {
            Descriptor::Code(code) => code,
            Descriptor::Name(_) => return Err(DecodeError::InvalidDescriptor),
        };
        match descriptor_code {
            Open::DESCRIPTOR => Ok(Performative::Open(Open::decode_composite(buf)?)),
            Begin::DESCRIPTOR => Ok(Performative::Begin(Begin::decode_composite(buf)?)),
            Attach::DESCRIPTOR => Ok(Performative::Attach(Attach::decode_composite(buf)?)),
            Flow::DESCRIPTOR => Ok(Performative::Flow(Flow::decode_composite(buf)?)),
            Transfer::DESCRIPTOR => {
                Ok(Performative::Transfer(Transfer::decode_composite(buf)?))
            }
            Disposition::DESCRIPTOR => {
                Ok(Performative::Disposition(Disposition::decode_composite(buf)?))
            }
            Detach::DESCRIPTOR => Ok(Performative::Detach(Detach::decode_composite(buf)?)),
            End::DESCRIPTOR => Ok(Performative::End(End::decode_composite(buf)?)),
            Close::DESCRIPTOR => Ok(Performative::Close(Close::decode_composite(buf)?)),
            other => Err(DecodeError::UnknownDescriptor(other)),
        }
    }
}
