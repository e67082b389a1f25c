//! Errors of the connection layer

use siderite_types::definitions::Error as AmqpDefError;

use crate::sasl_profile::NegotiationError;
use crate::transport;

/// Errors raised while opening a connection
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error(transparent)]
    Transport(#[from] transport::error::Error),

    #[error(transparent)]
    Sasl(#[from] NegotiationError),

    /// The url cannot be parsed or misses a host
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The peer answered the open with something else
    #[error("unexpected frame during open")]
    UnexpectedFrame,

    /// The stream closed before the open handshake finished
    #[error("stream closed during open")]
    StreamClosed,

    /// The peer's open did not arrive in time
    #[error("open handshake timed out")]
    OpenTimeout,

    /// The peer closed the connection during the handshake
    #[error("remote closed the connection: {error:?}")]
    RemoteClosed { error: Option<AmqpDefError> },
}

/// Errors raised while a connection is running or closing
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] transport::error::Error),

    /// The peer closed the connection with an error condition
    #[error("remote closed the connection with an error: {}", .0)]
    RemoteClosedWithError(AmqpDefError),

    /// A frame arrived on a channel with no session mapped to it
    #[error("no session mapped to incoming channel {0}")]
    SessionNotFound(u16),

    /// A frame arrived that the current state does not allow
    #[error("illegal connection state")]
    IllegalState,

    /// All channels permitted by channel-max are in use
    #[error("channel-max exceeded")]
    ChannelMaxExceeded,

    /// The engine task is gone, usually after an abort
    #[error("connection engine dropped")]
    EngineDropped,

    /// The close handshake did not finish in time
    #[error("close handshake timed out")]
    CloseTimeout,
}
