//! Errors of the framed transport

use siderite_types::DecodeError;

/// Errors raised while moving frames over the byte stream
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The peer sent a frame larger than the negotiated max frame size
    #[error("max frame size exceeded")]
    MaxFrameSizeExceeded,

    /// The peer was silent longer than the idle timeout allows
    #[error("idle timeout expired")]
    IdleTimeout,

    /// A frame header that cannot be parsed
    #[error("malformed frame")]
    MalformedFrame,

    /// A frame of a type this transport does not speak
    #[error("unexpected frame type 0x{0:02x}")]
    UnexpectedFrameType(u8),

    /// A frame body that does not decode
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The peer answered the protocol header with an incompatible one
    #[error("unexpected protocol header {0:?}")]
    UnexpectedProtocolHeader([u8; 8]),

    /// A header was sent or awaited in a state that does not allow it
    #[error("illegal connection state for header negotiation")]
    IllegalState,
}
