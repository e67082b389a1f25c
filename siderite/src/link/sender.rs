//! The sending end of a link

use bytes::{Bytes, BytesMut};
use tokio::sync::oneshot;
use tokio::time::timeout;
use uuid::Uuid;

use siderite_types::codec::Encode;
use siderite_types::definitions::{Error as AmqpDefError, SenderSettleMode};
use siderite_types::messaging::{Accepted, DeliveryState, Message, Outcome};
use siderite_types::performatives::Transfer;

use crate::frames::FRAME_HEADER_LEN;
use crate::session::Session;
use crate::util::HANDSHAKE_TIMEOUT;

use super::builder::SenderBuilder;
use super::error::{AttachError, DetachError, SendError};
use super::frame::LinkFrame;
use super::LinkInner;

/// The sending end of a link.
///
/// Sends block until the receiver has granted credit, and by default
/// until it has settled the delivery with a terminal outcome.
pub struct Sender {
    pub(crate) inner: LinkInner,
}

impl Sender {
    pub fn builder() -> SenderBuilder {
        SenderBuilder::new()
    }

    /// Attaches a sender with default settings
    pub async fn attach(
        session: &mut Session,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<Sender, AttachError> {
        Self::builder()
            .name(name)
            .target(address)
            .attach(session)
            .await
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Sends one message as one delivery.
    ///
    /// Unless the link settles on send, this waits for the receiver's
    /// disposition and maps any non-accepted outcome to an error.
    pub async fn send(&mut self, message: Message) -> Result<(), SendError> {
        let settled = matches!(self.inner.snd_settle_mode, SenderSettleMode::Settled);
        let state = self.send_with_state(message, None, settled).await?;
        match state {
            DeliveryState::Accepted(_) => Ok(()),
            DeliveryState::Rejected(rejected) => Err(SendError::Rejected(rejected)),
            DeliveryState::Released(released) => Err(SendError::Released(released)),
            DeliveryState::Modified(modified) => Err(SendError::Modified(modified)),
            DeliveryState::TransactionalState(txn) => match txn.outcome {
                Some(Outcome::Accepted(_)) => Ok(()),
                Some(Outcome::Rejected(rejected)) => Err(SendError::Rejected(rejected)),
                Some(Outcome::Released(released)) => Err(SendError::Released(released)),
                Some(Outcome::Modified(modified)) => Err(SendError::Modified(modified)),
                _ => Err(SendError::IllegalDeliveryState),
            },
            _ => Err(SendError::IllegalDeliveryState),
        }
    }

    /// Sends one delivery, optionally pre-stamped with a delivery
    /// state, and returns the state the receiver resolved it to
    pub(crate) async fn send_with_state(
        &mut self,
        message: Message,
        state: Option<DeliveryState>,
        settled: bool,
    ) -> Result<DeliveryState, SendError> {
        let payload = message.to_payload();
        if let Some(limit) = self.inner.max_message_size {
            if payload.len() as u64 > limit {
                return Err(SendError::MessageSizeExceeded);
            }
        }

        timeout(HANDSHAKE_TIMEOUT, self.inner.flow_state.consume(1))
            .await
            .map_err(|_| SendError::Timeout)?;

        let delivery_tag = Bytes::copy_from_slice(Uuid::new_v4().as_bytes());
        let frames = self.split_delivery(payload, delivery_tag, settled, state);

        let (settlement, resolution) = match settled {
            true => (None, None),
            false => {
                let (tx, rx) = oneshot::channel();
                (Some(tx), Some(rx))
            }
        };

        self.inner
            .outgoing
            .send(LinkFrame::Transfer { frames, settlement })
            .await
            .map_err(|_| SendError::SessionDropped)?;

        match resolution {
            None => Ok(DeliveryState::Accepted(Accepted {})),
            Some(resolution) => timeout(HANDSHAKE_TIMEOUT, resolution)
                .await
                .map_err(|_| SendError::Timeout)?
                .map_err(|_| SendError::SessionDropped),
        }
    }

    /// Splits one delivery into as many transfer frames as the
    /// negotiated max frame size requires
    fn split_delivery(
        &self,
        payload: Bytes,
        delivery_tag: Bytes,
        settled: bool,
        state: Option<DeliveryState>,
    ) -> Vec<(Transfer, Bytes)> {
        let first = Transfer {
            handle: self.inner.output_handle,
            delivery_tag: Some(delivery_tag),
            message_format: Some(0),
            settled: Some(settled),
            state,
            ..Default::default()
        };

        // size against the worst case: the session fills in the
        // delivery id before the frame goes out
        let mut probe = first.clone();
        probe.delivery_id = Some(u32::MAX);
        let mut sizing = BytesMut::new();
        probe.encode(&mut sizing);
        let max_payload = self
            .inner
            .max_frame_size
            .saturating_sub(FRAME_HEADER_LEN + sizing.len())
            .max(1);

        let mut remaining = payload;
        let mut frames = Vec::new();
        loop {
            let take = remaining.len().min(max_payload);
            let chunk = remaining.split_to(take);
            let more = !remaining.is_empty();
            let transfer = match frames.is_empty() {
                true => {
                    let mut transfer = first.clone();
                    transfer.more = more;
                    transfer
                }
                false => Transfer {
                    handle: self.inner.output_handle,
                    more,
                    ..Default::default()
                },
            };
            frames.push((transfer, chunk));
            if !more {
                break frames;
            }
        }
    }

    /// Detaches the link but keeps it resumable by the peer
    pub async fn detach(mut self) -> Result<(), DetachError> {
        self.inner.detach_with(false, None).await
    }

    /// Closes the link for good
    pub async fn close(mut self) -> Result<(), DetachError> {
        self.inner.detach_with(true, None).await
    }

    /// Closes the link carrying an error condition
    pub async fn close_with_error(mut self, error: AmqpDefError) -> Result<(), DetachError> {
        self.inner.detach_with(true, Some(error)).await
    }
}
