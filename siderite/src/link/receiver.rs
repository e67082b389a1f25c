//! The receiving end of a link

use bytes::{Bytes, BytesMut};

use siderite_types::definitions::{
    AmqpError, DeliveryNumber, DeliveryTag, Error as AmqpDefError, ReceiverSettleMode, Role,
};
use siderite_types::messaging::{
    Accepted, DeliveryState, Message, Modified, Rejected, Released,
};
use siderite_types::performatives::Transfer;

use crate::session::Session;

use super::builder::ReceiverBuilder;
use super::delivery::Delivery;
use super::error::{AttachError, DetachError, DispositionError, RecvError};
use super::frame::{LinkFlow, LinkFrame, LinkIncomingItem};
use super::LinkInner;

/// How a receiver grants credit to the peer sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditMode {
    /// Keep a window of this many credits open, topping it up once half
    /// of it has been consumed
    Auto(u32),
    /// Credit only moves when [`Receiver::set_credit`] is called
    Manual,
}

impl Default for CreditMode {
    fn default() -> Self {
        CreditMode::Auto(100)
    }
}

/// A delivery that is still missing transfer frames
pub(crate) struct PartialDelivery {
    delivery_id: DeliveryNumber,
    delivery_tag: DeliveryTag,
    settled: bool,
    buffer: BytesMut,
}

/// The receiving end of a link.
///
/// Deliveries are pulled with [`recv`](Receiver::recv) and settled with
/// one of the disposition methods.
pub struct Receiver {
    pub(crate) inner: LinkInner,
    pub(crate) credit_mode: CreditMode,
    /// Deliveries consumed since the last top up
    pub(crate) processed: u32,
    pub(crate) partial: Option<PartialDelivery>,
}

impl Receiver {
    pub fn builder() -> ReceiverBuilder {
        ReceiverBuilder::new()
    }

    /// Attaches a receiver with default settings
    pub async fn attach(
        session: &mut Session,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<Receiver, AttachError> {
        Self::builder()
            .name(name)
            .source(address)
            .attach(session)
            .await
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Receives the next delivery, assembling it from however many
    /// transfer frames the sender split it into
    pub async fn recv(&mut self) -> Result<Delivery, RecvError> {
        loop {
            match self.inner.incoming.recv().await {
                None => return Err(RecvError::SessionDropped),
                Some(LinkIncomingItem::Attach(_)) => {
                    // a resuming attach; nothing to do for a fresh link
                    continue;
                }
                Some(LinkIncomingItem::Detach(detach)) => {
                    self.inner.on_remote_detach(&detach).await;
                    return Err(RecvError::DetachedByRemote {
                        error: detach.error,
                    });
                }
                Some(LinkIncomingItem::Transfer {
                    performative,
                    payload,
                }) => match self.on_transfer(performative, payload) {
                    Ok(Some(delivery)) => {
                        self.replenish().await?;
                        return Ok(delivery);
                    }
                    Ok(None) => {}
                    // a broken delivery stream is unrecoverable; close
                    // the link carrying the violated condition
                    Err(err) => {
                        let condition = match &err {
                            RecvError::DeliveryInterleaved => AmqpError::IllegalState,
                            _ => AmqpError::DecodeError,
                        };
                        let error = AmqpDefError::new(condition, None);
                        let _ = self.inner.detach_with(true, Some(error)).await;
                        return Err(err);
                    }
                },
            }
        }
    }

    fn on_transfer(
        &mut self,
        transfer: Transfer,
        payload: Bytes,
    ) -> Result<Option<Delivery>, RecvError> {
        if transfer.aborted {
            self.partial = None;
            return Ok(None);
        }

        let mut partial = match self.partial.take() {
            Some(partial) => {
                // continuation frames must not restart delivery identity
                let id_conflict = transfer
                    .delivery_id
                    .map_or(false, |id| id != partial.delivery_id);
                let tag_conflict = transfer
                    .delivery_tag
                    .as_ref()
                    .map_or(false, |tag| *tag != partial.delivery_tag);
                if id_conflict || tag_conflict {
                    return Err(RecvError::DeliveryInterleaved);
                }
                partial
            }
            None => PartialDelivery {
                delivery_id: transfer.delivery_id.unwrap_or(0),
                delivery_tag: transfer.delivery_tag.clone().unwrap_or_default(),
                settled: transfer.settled.unwrap_or(false),
                buffer: BytesMut::new(),
            },
        };
        partial.buffer.extend_from_slice(&payload);

        if transfer.more {
            self.partial = Some(partial);
            return Ok(None);
        }

        let message = Message::from_payload(partial.buffer.freeze())?;
        Ok(Some(Delivery {
            delivery_id: partial.delivery_id,
            delivery_tag: partial.delivery_tag,
            settled: partial.settled,
            message,
        }))
    }

    /// Tops the window back up once half of it has been consumed
    async fn replenish(&mut self) -> Result<(), RecvError> {
        if let CreditMode::Auto(window) = self.credit_mode {
            self.processed += 1;
            if self.processed >= (window / 2).max(1) {
                self.set_credit(window)
                    .await
                    .map_err(|_| RecvError::SessionDropped)?;
            }
        }
        Ok(())
    }

    /// Grants the peer sender this much credit
    pub async fn set_credit(&mut self, credit: u32) -> Result<(), DispositionError> {
        self.processed = 0;
        self.inner.flow_state.set_link_credit(credit);
        let snapshot = self.inner.flow_state.snapshot();
        let flow = LinkFlow {
            handle: self.inner.output_handle,
            delivery_count: Some(snapshot.delivery_count),
            link_credit: Some(credit),
            available: None,
            drain: false,
            echo: false,
        };
        self.inner
            .outgoing
            .send(LinkFrame::Flow(flow))
            .await
            .map_err(|_| DispositionError::SessionDropped)
    }

    pub async fn accept(&mut self, delivery: &Delivery) -> Result<(), DispositionError> {
        self.dispose(delivery, DeliveryState::Accepted(Accepted {}))
            .await
    }

    pub async fn reject(
        &mut self,
        delivery: &Delivery,
        error: Option<AmqpDefError>,
    ) -> Result<(), DispositionError> {
        self.dispose(delivery, DeliveryState::Rejected(Rejected { error }))
            .await
    }

    pub async fn release(&mut self, delivery: &Delivery) -> Result<(), DispositionError> {
        self.dispose(delivery, DeliveryState::Released(Released {}))
            .await
    }

    pub async fn modify(
        &mut self,
        delivery: &Delivery,
        modified: Modified,
    ) -> Result<(), DispositionError> {
        self.dispose(delivery, DeliveryState::Modified(modified))
            .await
    }

    pub(crate) async fn dispose(
        &mut self,
        delivery: &Delivery,
        state: DeliveryState,
    ) -> Result<(), DispositionError> {
        // in the default mode the receiver settles as it resolves
        let settled = matches!(self.inner.rcv_settle_mode, ReceiverSettleMode::First);
        self.inner
            .outgoing
            .send(LinkFrame::Disposition {
                role: Role::Receiver,
                first: delivery.delivery_id,
                last: None,
                settled,
                state: Some(state),
            })
            .await
            .map_err(|_| DispositionError::SessionDropped)
    }

    /// Detaches the link but keeps it resumable by the peer
    pub async fn detach(mut self) -> Result<(), DetachError> {
        self.inner.detach_with(false, None).await
    }

    /// Closes the link for good
    pub async fn close(mut self) -> Result<(), DetachError> {
        self.inner.detach_with(true, None).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use siderite_types::definitions::Handle;
    use siderite_types::states::LinkState;
    use tokio::sync::mpsc;

    use crate::link::state::LinkFlowState;

    use super::*;

    fn test_receiver() -> (Receiver, mpsc::Receiver<LinkFrame>) {
        let (outgoing, outgoing_rx) = mpsc::channel(16);
        let (_incoming_tx, incoming) = mpsc::channel(16);
        let (session_control, _control_rx) = mpsc::channel(16);
        let receiver = Receiver {
            inner: LinkInner {
                name: "test".to_string(),
                output_handle: Handle(0),
                incoming,
                outgoing,
                session_control,
                flow_state: Arc::new(LinkFlowState::receiver(0)),
                snd_settle_mode: Default::default(),
                rcv_settle_mode: Default::default(),
                max_frame_size: 512,
                max_message_size: None,
                state: LinkState::Attached,
            },
            credit_mode: CreditMode::Manual,
            processed: 0,
            partial: None,
        };
        (receiver, outgoing_rx)
    }

    fn transfer_frame(delivery_id: u32, more: bool, first: bool) -> Transfer {
        Transfer {
            handle: Handle(0),
            delivery_id: first.then_some(delivery_id),
            delivery_tag: first.then(|| Bytes::from_static(b"tag-1")),
            settled: first.then_some(false),
            more,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn multi_frame_delivery_is_assembled() {
        let (mut receiver, _rx) = test_receiver();
        let message = Message::value("hello from a split delivery");
        let payload = message.to_payload();
        let (head, tail) = payload.split_at(payload.len() / 2);

        let none = receiver
            .on_transfer(transfer_frame(7, true, true), Bytes::copy_from_slice(head))
            .unwrap();
        assert!(none.is_none());

        let delivery = receiver
            .on_transfer(transfer_frame(7, false, false), Bytes::copy_from_slice(tail))
            .unwrap()
            .expect("last frame completes the delivery");
        assert_eq!(delivery.delivery_id(), 7);
        assert_eq!(delivery.delivery_tag(), &Bytes::from_static(b"tag-1"));
        assert_eq!(delivery.message(), &message);
    }

    #[tokio::test]
    async fn interleaved_delivery_is_a_protocol_violation() {
        let (mut receiver, _rx) = test_receiver();
        receiver
            .on_transfer(transfer_frame(1, true, true), Bytes::from_static(b"first"))
            .unwrap();

        // a second delivery may not start while the first is unfinished
        let mut second = transfer_frame(2, false, true);
        second.delivery_tag = Some(Bytes::from_static(b"tag-2"));
        let result = receiver.on_transfer(second, Bytes::from_static(b"second"));
        assert!(matches!(result, Err(RecvError::DeliveryInterleaved)));
    }

    #[tokio::test]
    async fn aborted_delivery_is_dropped() {
        let (mut receiver, _rx) = test_receiver();
        receiver
            .on_transfer(transfer_frame(3, true, true), Bytes::from_static(b"part"))
            .unwrap();

        let mut abort = transfer_frame(3, false, false);
        abort.aborted = true;
        let none = receiver.on_transfer(abort, Bytes::new()).unwrap();
        assert!(none.is_none());
        assert!(receiver.partial.is_none());
    }

    #[tokio::test]
    async fn set_credit_sends_a_flow() {
        let (mut receiver, mut rx) = test_receiver();
        receiver.set_credit(10).await.unwrap();
        match rx.recv().await.unwrap() {
            LinkFrame::Flow(flow) => {
                assert_eq!(flow.link_credit, Some(10));
                assert_eq!(flow.delivery_count, Some(0));
            }
            other => panic!("expected a flow, got {other:?}"),
        }
        assert_eq!(receiver.inner.flow_state.link_credit(), 10);
    }
}
