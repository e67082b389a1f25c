//! Control messages that drive the engine tasks from their handles

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use siderite_types::definitions::{Error as AmqpDefError, Handle, Role};

use crate::connection;
use crate::link::frame::LinkIncomingItem;
use crate::link::state::LinkFlowState;
use crate::session;
use crate::session::frame::SessionFrame;

/// Identifier of a session within its connection
pub(crate) type SessionId = usize;

/// Commands a [`crate::Connection`] handle sends to its engine
pub(crate) enum ConnectionControl {
    /// Starts the close handshake, optionally with an error
    Close(Option<AmqpDefError>),
    /// Allocates an outgoing channel and registers the session's
    /// incoming frame queue
    CreateSession {
        tx: mpsc::Sender<SessionFrame>,
        responder: oneshot::Sender<Result<SessionAllocation, connection::error::Error>>,
    },
    /// Releases a session's channel after its end handshake
    DropSession(SessionId),
}

/// What the connection engine hands back for a newly created session
pub(crate) struct SessionAllocation {
    pub session_id: SessionId,
    pub outgoing_channel: u16,
    /// Negotiated connection-level max frame size, used by senders to
    /// split oversized deliveries
    pub max_frame_size: usize,
}

/// Commands a [`crate::Session`] handle or link handle sends to the
/// session engine
pub(crate) enum SessionControl {
    /// Starts the end handshake, optionally with an error
    End(Option<AmqpDefError>),
    /// Allocates an output handle and registers the link's queues
    AllocateLink {
        name: String,
        role: Role,
        tx: mpsc::Sender<LinkIncomingItem>,
        flow_state: Arc<LinkFlowState>,
        responder: oneshot::Sender<Result<Handle, session::error::Error>>,
    },
    /// Releases a link's handle after its detach handshake
    DeallocateLink(Handle),
}
