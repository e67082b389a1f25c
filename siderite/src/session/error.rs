//! Errors of the session layer

use siderite_types::definitions::Error as AmqpDefError;

/// Errors raised while beginning a session
#[derive(Debug, thiserror::Error)]
pub enum BeginError {
    /// The connection engine is gone
    #[error("connection dropped")]
    ConnectionDropped,

    /// All channels permitted by channel-max are in use
    #[error("channel-max exceeded")]
    ChannelMaxExceeded,

    /// The connection is not in a state that allows a begin
    #[error("illegal connection state")]
    IllegalConnectionState,

    /// The peer answered the begin with an end
    #[error("remote ended the session")]
    RemoteEnded {
        error: Option<AmqpDefError>,
    },

    /// The peer's begin did not arrive in time
    #[error("begin handshake timed out")]
    BeginTimeout,
}

impl From<crate::connection::error::Error> for BeginError {
    fn from(err: crate::connection::error::Error) -> Self {
        use crate::connection::error::Error;
        match err {
            Error::ChannelMaxExceeded => BeginError::ChannelMaxExceeded,
            Error::IllegalState => BeginError::IllegalConnectionState,
            _ => BeginError::ConnectionDropped,
        }
    }
}

/// Errors raised while running or ending a session
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection engine is gone
    #[error("connection dropped")]
    ConnectionDropped,

    /// The peer ended the session with an error condition
    #[error("remote ended the session with an error: {}", .0)]
    RemoteEndedWithError(AmqpDefError),

    /// A frame arrived that the current state does not allow
    #[error("illegal session state")]
    IllegalState,

    /// The peer sent more transfers than the incoming window allows
    #[error("incoming window exceeded")]
    WindowViolation,

    /// A frame referenced a handle no link is attached to
    #[error("unattached handle")]
    UnattachedHandle,

    /// All handles permitted by handle-max are in use
    #[error("handle-max exceeded")]
    HandleMaxExceeded,

    /// A link with this name is already attached on the session
    #[error("link name already in use")]
    LinkNameInUse,

    /// The session engine task is gone
    #[error("session engine dropped")]
    EngineDropped,

    /// The end handshake did not finish in time
    #[error("end handshake timed out")]
    EndTimeout,
}
