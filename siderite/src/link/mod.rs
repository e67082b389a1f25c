//! Link layer: senders, receivers and the credit protocol between them

pub mod builder;
pub mod delivery;
pub mod error;
pub(crate) mod frame;
pub mod receiver;
pub mod sender;
pub(crate) mod state;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::timeout;

use siderite_types::definitions::{
    Error as AmqpDefError, Handle, ReceiverSettleMode, SenderSettleMode,
};
use siderite_types::performatives::Detach;
use siderite_types::states::LinkState;

use crate::control::SessionControl;
use crate::util::HANDSHAKE_TIMEOUT;

use error::DetachError;
use frame::{LinkFrame, LinkIncomingItem};
use state::LinkFlowState;

pub use receiver::{CreditMode, Receiver};
pub use sender::Sender;

/// State shared by both ends of the link API
pub(crate) struct LinkInner {
    pub name: String,
    pub output_handle: Handle,
    pub incoming: mpsc::Receiver<LinkIncomingItem>,
    pub outgoing: mpsc::Sender<LinkFrame>,
    pub session_control: mpsc::Sender<SessionControl>,
    pub flow_state: Arc<LinkFlowState>,
    pub snd_settle_mode: SenderSettleMode,
    pub rcv_settle_mode: ReceiverSettleMode,
    pub max_frame_size: usize,
    /// Negotiated message size cap; `None` when neither end imposes one
    pub max_message_size: Option<u64>,
    pub state: LinkState,
}

impl LinkInner {
    /// Sends a detach, waits for the peer's answering detach and frees
    /// the handle
    async fn detach_with(
        &mut self,
        closed: bool,
        error: Option<AmqpDefError>,
    ) -> Result<(), DetachError> {
        let detach = Detach {
            handle: self.output_handle,
            closed,
            error,
        };
        self.outgoing
            .send(LinkFrame::Detach(detach))
            .await
            .map_err(|_| DetachError::SessionDropped)?;
        self.state = LinkState::DetachSent;

        let remote = timeout(HANDSHAKE_TIMEOUT, async {
            loop {
                match self.incoming.recv().await {
                    Some(LinkIncomingItem::Detach(detach)) => break Some(detach),
                    // deliveries racing against the detach are dropped
                    Some(_) => continue,
                    None => break None,
                }
            }
        })
        .await
        .map_err(|_| DetachError::DetachTimeout)?
        .ok_or(DetachError::SessionDropped)?;

        self.state = match closed {
            true => LinkState::Closed,
            false => LinkState::Detached,
        };
        let _ = self
            .session_control
            .send(SessionControl::DeallocateLink(self.output_handle))
            .await;

        match remote.error {
            Some(error) => Err(DetachError::RemoteDetachedWithError(error)),
            None => Ok(()),
        }
    }

    /// Answers a remotely initiated detach and frees the handle
    async fn on_remote_detach(&mut self, remote: &Detach) {
        let echo = Detach {
            handle: self.output_handle,
            closed: remote.closed,
            error: None,
        };
        let _ = self.outgoing.send(LinkFrame::Detach(echo)).await;
        self.state = match remote.closed {
            true => LinkState::Closed,
            false => LinkState::Detached,
        };
        let _ = self
            .session_control
            .send(SessionControl::DeallocateLink(self.output_handle))
            .await;
    }
}
