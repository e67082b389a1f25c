//! The 8-octet protocol header exchanged before any frame

use siderite_types::definitions::{MAJOR, MINOR, REVISION};

use super::error::Error;

/// Which protocol layer the header announces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolId {
    Amqp = 0x00,
    Tls = 0x02,
    Sasl = 0x03,
}

/// The prefix `b"AMQP"` followed by a protocol id and a version triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolHeader {
    pub id: ProtocolId,
    pub major: u8,
    pub minor: u8,
    pub revision: u8,
}

impl ProtocolHeader {
    pub fn new(id: ProtocolId) -> Self {
        Self {
            id,
            major: MAJOR,
            minor: MINOR,
            revision: REVISION,
        }
    }

    /// Header of the plain AMQP layer
    pub fn amqp() -> Self {
        Self::new(ProtocolId::Amqp)
    }

    /// Header of the SASL security layer
    pub fn sasl() -> Self {
        Self::new(ProtocolId::Sasl)
    }
}

impl From<ProtocolHeader> for [u8; 8] {
    fn from(header: ProtocolHeader) -> Self {
        [
            b'A',
            b'M',
            b'Q',
            b'P',
            header.id as u8,
            header.major,
            header.minor,
            header.revision,
        ]
    }
}

impl TryFrom<[u8; 8]> for ProtocolHeader {
    type Error = Error;

    fn try_from(buf: [u8; 8]) -> Result<Self, Self::Error> {
        if &buf[0..4] != b"AMQP" {
            return Err(Error::UnexpectedProtocolHeader(buf));
        }
        let id = match buf[4] {
            0x00 => ProtocolId::Amqp,
            0x02 => ProtocolId::Tls,
            0x03 => ProtocolId::Sasl,
            _ => return Err(Error::UnexpectedProtocolHeader(buf)),
        };
        Ok(Self {
            id,
            major: buf[5],
            minor: buf[6],
            revision: buf[7],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amqp_header_bytes() {
        let buf: [u8; 8] = ProtocolHeader::amqp().into();
        assert_eq!(buf, [b'A', b'M', b'Q', b'P', 0, 1, 0, 0]);
    }

    #[test]
    fn sasl_header_bytes() {
        let buf: [u8; 8] = ProtocolHeader::sasl().into();
        assert_eq!(buf, [b'A', b'M', b'Q', b'P', 3, 1, 0, 0]);
    }

    #[test]
    fn rejects_non_amqp_prefix() {
        let buf = [b'H', b'T', b'T', b'P', 0, 1, 1, 0];
        assert!(ProtocolHeader::try_from(buf).is_err());
    }
}
