//! Frame layer: the 8-octet frame header and the codecs that sit on
//! top of length-delimited framing.
//!
//! The 4-octet size prefix itself is handled by
//! `tokio_util::codec::LengthDelimitedCodec`; the codecs here encode
//! and decode everything after it.

pub mod amqp;
pub mod sasl;

/// Frame type code of an AMQP frame
pub const FRAME_TYPE_AMQP: u8 = 0x00;
/// Frame type code of a SASL frame
pub const FRAME_TYPE_SASL: u8 = 0x01;

/// Data offset of a frame without an extended header, in 4-octet words
pub const DEFAULT_DOFF: u8 = 2;

/// Octets taken by the size prefix and frame header together
pub const FRAME_HEADER_LEN: usize = 8;
