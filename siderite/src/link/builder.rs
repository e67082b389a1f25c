//! Builders that run the attach handshake for senders and receivers

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::trace;

use siderite_types::definitions::{
    Error as AmqpDefError, Handle, ReceiverSettleMode, Role, SenderSettleMode,
};
use siderite_types::performatives::{Attach, Detach};
use siderite_types::states::LinkState;
use siderite_types::messaging::{Source, Target, TargetArchetype};
use siderite_types::transaction::Coordinator;

use crate::control::SessionControl;
use crate::session::Session;
use crate::util::HANDSHAKE_TIMEOUT;

use super::error::AttachError;
use super::frame::{LinkFrame, LinkIncomingItem};
use super::receiver::{CreditMode, Receiver};
use super::sender::Sender;
use super::state::LinkFlowState;
use super::LinkInner;

/// Builds a [`Sender`] attached on a session
pub struct SenderBuilder {
    name: String,
    target: Option<TargetArchetype>,
    snd_settle_mode: SenderSettleMode,
    rcv_settle_mode: ReceiverSettleMode,
    max_message_size: Option<u64>,
}

impl SenderBuilder {
    pub(crate) fn new() -> Self {
        Self {
            name: String::new(),
            target: None,
            snd_settle_mode: SenderSettleMode::default(),
            rcv_settle_mode: ReceiverSettleMode::default(),
            max_message_size: None,
        }
    }

    /// The link name; it must be unique between the two containers
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The node the deliveries are sent to
    pub fn target(mut self, address: impl Into<String>) -> Self {
        self.target = Some(TargetArchetype::Target(Target::with_address(address)));
        self
    }

    /// Attach against the transaction coordinator instead of a node
    pub(crate) fn coordinator(mut self, coordinator: Coordinator) -> Self {
        self.target = Some(TargetArchetype::Coordinator(coordinator));
        self
    }

    pub fn sender_settle_mode(mut self, mode: SenderSettleMode) -> Self {
        self.snd_settle_mode = mode;
        self
    }

    pub fn receiver_settle_mode(mut self, mode: ReceiverSettleMode) -> Self {
        self.rcv_settle_mode = mode;
        self
    }

    /// The largest message this end will send; zero means unlimited
    pub fn max_message_size(mut self, max_message_size: u64) -> Self {
        self.max_message_size = Some(max_message_size).filter(|size| *size > 0);
        self
    }

    pub async fn attach(self, session: &mut Session) -> Result<Sender, AttachError> {
        let local_attach = Attach {
            name: self.name.clone(),
            role: Role::Sender,
            snd_settle_mode: self.snd_settle_mode,
            rcv_settle_mode: self.rcv_settle_mode,
            source: Some(Source::default()),
            target: self.target.clone(),
            initial_delivery_count: Some(0),
            max_message_size: self.max_message_size,
            ..Default::default()
        };

        let exchange =
            exchange_attach(session, self.name.clone(), Role::Sender, local_attach).await?;

        // a null target on the answering attach refuses the link
        if exchange.remote_attach.target.is_none() {
            let error = refusal_detach(session, exchange).await?;
            return Err(AttachError::Refused { error });
        }

        let max_message_size =
            negotiated_max_message_size(self.max_message_size, &exchange.remote_attach);

        trace!(name = %self.name, "sender attached");
        Ok(Sender {
            inner: LinkInner {
                name: self.name,
                output_handle: exchange.output_handle,
                incoming: exchange.incoming,
                outgoing: session.outgoing.clone(),
                session_control: session.control.clone(),
                flow_state: exchange.flow_state,
                snd_settle_mode: self.snd_settle_mode,
                rcv_settle_mode: self.rcv_settle_mode,
                max_frame_size: session.max_frame_size,
                max_message_size,
                state: LinkState::Attached,
            },
        })
    }
}

/// Builds a [`Receiver`] attached on a session
pub struct ReceiverBuilder {
    name: String,
    source: Option<Source>,
    rcv_settle_mode: ReceiverSettleMode,
    credit_mode: CreditMode,
    max_message_size: Option<u64>,
}

impl ReceiverBuilder {
    pub(crate) fn new() -> Self {
        Self {
            name: String::new(),
            source: None,
            rcv_settle_mode: ReceiverSettleMode::default(),
            credit_mode: CreditMode::default(),
            max_message_size: None,
        }
    }

    /// The link name; it must be unique between the two containers
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The node the deliveries are received from
    pub fn source(mut self, address: impl Into<String>) -> Self {
        self.source = Some(Source::with_address(address));
        self
    }

    pub fn receiver_settle_mode(mut self, mode: ReceiverSettleMode) -> Self {
        self.rcv_settle_mode = mode;
        self
    }

    /// How credit is granted to the peer sender; defaults to an
    /// automatically topped up window
    pub fn credit_mode(mut self, credit_mode: CreditMode) -> Self {
        self.credit_mode = credit_mode;
        self
    }

    /// The largest message this end will accept; zero means unlimited
    pub fn max_message_size(mut self, max_message_size: u64) -> Self {
        self.max_message_size = Some(max_message_size).filter(|size| *size > 0);
        self
    }

    pub async fn attach(self, session: &mut Session) -> Result<Receiver, AttachError> {
        let local_attach = Attach {
            name: self.name.clone(),
            role: Role::Receiver,
            snd_settle_mode: SenderSettleMode::default(),
            rcv_settle_mode: self.rcv_settle_mode,
            source: self.source.clone(),
            target: Some(TargetArchetype::Target(Target::default())),
            max_message_size: self.max_message_size,
            ..Default::default()
        };

        let exchange =
            exchange_attach(session, self.name.clone(), Role::Receiver, local_attach).await?;

        // a null source on the answering attach refuses the link
        if exchange.remote_attach.source.is_none() {
            let error = refusal_detach(session, exchange).await?;
            return Err(AttachError::Refused { error });
        }

        // the sender dictates where delivery counting starts
        exchange
            .flow_state
            .sync_delivery_count(exchange.remote_attach.initial_delivery_count.unwrap_or(0));

        let max_message_size =
            negotiated_max_message_size(self.max_message_size, &exchange.remote_attach);

        trace!(name = %self.name, "receiver attached");
        let mut receiver = Receiver {
            inner: LinkInner {
                name: self.name,
                output_handle: exchange.output_handle,
                incoming: exchange.incoming,
                outgoing: session.outgoing.clone(),
                session_control: session.control.clone(),
                flow_state: exchange.flow_state,
                snd_settle_mode: SenderSettleMode::default(),
                rcv_settle_mode: self.rcv_settle_mode,
                max_frame_size: session.max_frame_size,
                max_message_size,
                state: LinkState::Attached,
            },
            credit_mode: self.credit_mode,
            processed: 0,
            partial: None,
        };

        if let CreditMode::Auto(window) = receiver.credit_mode {
            if window > 0 {
                receiver
                    .set_credit(window)
                    .await
                    .map_err(|_| AttachError::SessionDropped)?;
            }
        }
        Ok(receiver)
    }
}

/// The tighter of the two ends' message size caps; an absent or zero
/// cap means unlimited
fn negotiated_max_message_size(local: Option<u64>, remote_attach: &Attach) -> Option<u64> {
    let remote = remote_attach.max_message_size.filter(|size| *size > 0);
    match (local, remote) {
        (Some(ours), Some(theirs)) => Some(ours.min(theirs)),
        (ours, None) => ours,
        (None, theirs) => theirs,
    }
}

struct AttachExchange {
    output_handle: Handle,
    incoming: mpsc::Receiver<LinkIncomingItem>,
    flow_state: Arc<LinkFlowState>,
    remote_attach: Attach,
}

/// Allocates a handle, sends the attach and waits for the peer's
async fn exchange_attach(
    session: &mut Session,
    name: String,
    role: Role,
    mut local_attach: Attach,
) -> Result<AttachExchange, AttachError> {
    let flow_state = Arc::new(match role {
        Role::Sender => LinkFlowState::sender(0),
        Role::Receiver => LinkFlowState::receiver(0),
    });
    let (incoming_tx, mut incoming) = mpsc::channel(session.buffer_size);
    let (responder, allocated) = oneshot::channel();

    session
        .control
        .send(SessionControl::AllocateLink {
            name,
            role,
            tx: incoming_tx,
            flow_state: flow_state.clone(),
            responder,
        })
        .await
        .map_err(|_| AttachError::SessionDropped)?;
    let output_handle = allocated.await.map_err(|_| AttachError::SessionDropped)??;

    local_attach.handle = output_handle;
    session
        .outgoing
        .send(LinkFrame::Attach(local_attach))
        .await
        .map_err(|_| AttachError::SessionDropped)?;

    let remote_attach = match timeout(HANDSHAKE_TIMEOUT, incoming.recv())
        .await
        .map_err(|_| AttachError::AttachTimeout)?
    {
        Some(LinkIncomingItem::Attach(attach)) => attach,
        Some(_) => return Err(AttachError::UnexpectedFrame),
        None => return Err(AttachError::SessionDropped),
    };

    Ok(AttachExchange {
        output_handle,
        incoming,
        flow_state,
        remote_attach,
    })
}

/// After a refusing attach the link is closed again; answer the peer's
/// detach, free the handle and harvest the error it carried
async fn refusal_detach(
    session: &mut Session,
    mut exchange: AttachExchange,
) -> Result<Option<AmqpDefError>, AttachError> {
    let detach = Detach {
        handle: exchange.output_handle,
        closed: true,
        error: None,
    };
    session
        .outgoing
        .send(LinkFrame::Detach(detach))
        .await
        .map_err(|_| AttachError::SessionDropped)?;

    let error = timeout(HANDSHAKE_TIMEOUT, async {
        loop {
            match exchange.incoming.recv().await {
                Some(LinkIncomingItem::Detach(detach)) => break Ok(detach.error),
                Some(_) => continue,
                None => break Err(AttachError::SessionDropped),
            }
        }
    })
    .await
    .map_err(|_| AttachError::SessionDropped)??;

    let _ = session
        .control
        .send(SessionControl::DeallocateLink(exchange.output_handle))
        .await;
    Ok(error)
}
