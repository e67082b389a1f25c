//! Errors of the link layer

use siderite_types::definitions::Error as AmqpDefError;
use siderite_types::messaging::{Modified, Rejected, Released};
use siderite_types::DecodeError;

/// Errors raised while attaching a link
#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    /// The session engine is gone
    #[error("session dropped")]
    SessionDropped,

    #[error(transparent)]
    Session(#[from] crate::session::error::Error),

    /// The peer answered the attach with a detach, refusing the link
    #[error("link refused by remote: {error:?}")]
    Refused { error: Option<AmqpDefError> },

    /// The peer sent something other than an attach
    #[error("unexpected frame during attach")]
    UnexpectedFrame,

    /// The peer's attach did not arrive in time
    #[error("attach handshake timed out")]
    AttachTimeout,
}

/// Errors raised while sending a delivery
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The session engine is gone
    #[error("session dropped")]
    SessionDropped,

    /// The link was detached while the send was in flight
    #[error("link detached")]
    Detached,

    /// No credit arrived, or no disposition arrived, in time. The
    /// delivery may still be settled by a later peer disposition.
    #[error("send timed out")]
    Timeout,

    /// The receiver rejected the delivery
    #[error("delivery rejected: {:?}", .0.error)]
    Rejected(Rejected),

    /// The receiver released the delivery
    #[error("delivery released")]
    Released(Released),

    /// The receiver modified the delivery without accepting it
    #[error("delivery modified")]
    Modified(Modified),

    /// The peer answered with a delivery state that is not a valid
    /// outcome for this delivery
    #[error("illegal delivery state")]
    IllegalDeliveryState,

    /// The message is larger than the cap negotiated on attach
    #[error("message exceeds the negotiated max message size")]
    MessageSizeExceeded,
}

/// Errors raised while receiving a delivery
#[derive(Debug, thiserror::Error)]
pub enum RecvError {
    /// The session engine is gone
    #[error("session dropped")]
    SessionDropped,

    /// The peer detached the link
    #[error("link detached by remote: {error:?}")]
    DetachedByRemote { error: Option<AmqpDefError> },

    /// The assembled payload does not decode as a message
    #[error(transparent)]
    MessageDecode(#[from] DecodeError),

    /// A transfer started a new delivery while another was unfinished
    #[error("transfer interleaves an unfinished delivery")]
    DeliveryInterleaved,
}

/// Errors raised while settling a delivery or granting credit
#[derive(Debug, thiserror::Error)]
pub enum DispositionError {
    /// The session engine is gone
    #[error("session dropped")]
    SessionDropped,
}

/// Errors raised while detaching a link
#[derive(Debug, thiserror::Error)]
pub enum DetachError {
    /// The session engine is gone
    #[error("session dropped")]
    SessionDropped,

    /// The peer's detach did not arrive in time
    #[error("detach handshake timed out")]
    DetachTimeout,

    /// The peer detached with an error condition
    #[error("remote detached with an error: {}", .0)]
    RemoteDetachedWithError(AmqpDefError),
}
