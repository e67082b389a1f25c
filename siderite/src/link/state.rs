//! Link credit accounting shared between a link handle and its session
//! engine.
//!
//! The handle consumes credit when it sends; the session engine grants
//! credit when peer flow frames arrive. Both sides go through the same
//! [`LinkFlowState`], which is why it lives behind a lock with a
//! [`Notify`] for the waiting side.

use std::pin::pin;

use parking_lot::RwLock;
use tokio::sync::Notify;

use siderite_types::definitions::{Handle, Role, SequenceNo};
use siderite_types::performatives::Flow;

use super::frame::LinkFlow;

#[derive(Debug, Clone)]
pub(crate) struct LinkFlowStateInner {
    pub initial_delivery_count: SequenceNo,
    pub delivery_count: SequenceNo,
    pub link_credit: u32,
    pub available: u32,
    pub drain: bool,
}

#[derive(Debug)]
pub(crate) struct LinkFlowState {
    inner: RwLock<LinkFlowStateInner>,
    notify: Notify,
}

impl LinkFlowState {
    /// Flow state of a sending endpoint; it starts with no credit
    pub fn sender(initial_delivery_count: SequenceNo) -> Self {
        Self {
            inner: RwLock::new(LinkFlowStateInner {
                initial_delivery_count,
                delivery_count: initial_delivery_count,
                link_credit: 0,
                available: 0,
                drain: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Flow state of a receiving endpoint
    pub fn receiver(initial_delivery_count: SequenceNo) -> Self {
        Self::sender(initial_delivery_count)
    }

    pub fn snapshot(&self) -> LinkFlowStateInner {
        self.inner.read().clone()
    }

    /// Takes `count` credits, waiting until the peer has granted
    /// enough. Cancelling the future leaves the credit untouched.
    pub async fn consume(&self, count: u32) {
        loop {
            let mut notified = pin!(self.notify.notified());
            notified.as_mut().enable();
            {
                let mut inner = self.inner.write();
                if inner.link_credit >= count {
                    inner.link_credit -= count;
                    inner.delivery_count = inner.delivery_count.wrapping_add(count);
                    return;
                }
            }
            notified.await;
        }
    }

    /// Non-blocking view of the remaining credit
    pub fn link_credit(&self) -> u32 {
        self.inner.read().link_credit
    }

    /// Sets the credit granted to the peer sender (receiver side)
    pub fn set_link_credit(&self, credit: u32) {
        self.inner.write().link_credit = credit;
    }

    /// Aligns the counter with the peer sender's initial-delivery-count
    /// (receiver side)
    pub fn sync_delivery_count(&self, initial: SequenceNo) {
        let mut inner = self.inner.write();
        inner.initial_delivery_count = initial;
        inner.delivery_count = initial;
    }

    /// Books one incoming delivery against the granted credit
    /// (receiver side)
    pub fn on_incoming_delivery(&self) {
        let mut inner = self.inner.write();
        inner.delivery_count = inner.delivery_count.wrapping_add(1);
        inner.link_credit = inner.link_credit.saturating_sub(1);
    }

    /// Applies a peer flow to this link and returns the reply flow to
    /// send, if the peer asked for one
    pub fn on_incoming_flow(&self, flow: &Flow, role: Role, handle: Handle) -> Option<LinkFlow> {
        match role {
            Role::Sender => self.on_incoming_flow_as_sender(flow, handle),
            Role::Receiver => self.on_incoming_flow_as_receiver(flow, handle),
        }
    }

    // Credit granted by the receiving peer:
    //   link-credit = delivery-count_rcv + link-credit_rcv - delivery-count_snd
    fn on_incoming_flow_as_sender(&self, flow: &Flow, handle: Handle) -> Option<LinkFlow> {
        let mut inner = self.inner.write();
        let their_count = flow
            .delivery_count
            .unwrap_or(inner.initial_delivery_count);
        let credit = their_count
            .wrapping_add(flow.link_credit.unwrap_or(0))
            .wrapping_sub(inner.delivery_count);

        if flow.drain {
            // a drain burns the rest of the credit immediately and
            // must be confirmed with an updated delivery count
            inner.delivery_count = inner.delivery_count.wrapping_add(credit);
            inner.link_credit = 0;
            let reply = LinkFlow {
                handle,
                delivery_count: Some(inner.delivery_count),
                link_credit: Some(0),
                available: Some(inner.available),
                drain: true,
                echo: false,
            };
            drop(inner);
            self.notify.notify_waiters();
            return Some(reply);
        }

        inner.link_credit = credit;
        let reply = flow.echo.then(|| LinkFlow {
            handle,
            delivery_count: Some(inner.delivery_count),
            link_credit: Some(inner.link_credit),
            available: Some(inner.available),
            drain: inner.drain,
            echo: false,
        });
        drop(inner);
        self.notify.notify_waiters();
        reply
    }

    fn on_incoming_flow_as_receiver(&self, flow: &Flow, handle: Handle) -> Option<LinkFlow> {
        let mut inner = self.inner.write();
        if let Some(available) = flow.available {
            inner.available = available;
        }
        flow.echo.then(|| LinkFlow {
            handle,
            delivery_count: Some(inner.delivery_count),
            link_credit: Some(inner.link_credit),
            available: None,
            drain: inner.drain,
            echo: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::poll;

    use super::*;

    fn peer_flow(delivery_count: u32, link_credit: u32) -> Flow {
        Flow {
            next_incoming_id: Some(0),
            next_outgoing_id: 0,
            incoming_window: 2048,
            outgoing_window: 2048,
            handle: Some(Handle(0)),
            delivery_count: Some(delivery_count),
            link_credit: Some(link_credit),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn credit_formula() {
        let state = LinkFlowState::sender(0);
        state.on_incoming_flow(&peer_flow(0, 10), Role::Sender, Handle(0));
        assert_eq!(state.link_credit(), 10);

        state.consume(3).await;
        assert_eq!(state.link_credit(), 7);
        assert_eq!(state.snapshot().delivery_count, 3);

        // a repeated identical grant accounts for consumed credit
        state.on_incoming_flow(&peer_flow(0, 10), Role::Sender, Handle(0));
        assert_eq!(state.link_credit(), 7);
    }

    #[tokio::test]
    async fn consume_waits_for_credit() {
        let state = Arc::new(LinkFlowState::sender(0));

        let mut wait = Box::pin(state.consume(1));
        assert!(poll!(wait.as_mut()).is_pending());

        state.on_incoming_flow(&peer_flow(0, 1), Role::Sender, Handle(0));
        tokio::time::timeout(Duration::from_secs(1), wait)
            .await
            .unwrap();
        assert_eq!(state.link_credit(), 0);
    }

    #[tokio::test]
    async fn drain_burns_remaining_credit() {
        let state = LinkFlowState::sender(0);
        state.on_incoming_flow(&peer_flow(0, 5), Role::Sender, Handle(0));
        state.consume(2).await;

        let mut flow = peer_flow(0, 5);
        flow.drain = true;
        let reply = state
            .on_incoming_flow(&flow, Role::Sender, Handle(0))
            .expect("drain must be confirmed");
        assert_eq!(reply.delivery_count, Some(5));
        assert_eq!(reply.link_credit, Some(0));
        assert!(reply.drain);
        assert_eq!(state.link_credit(), 0);
    }

    #[tokio::test]
    async fn echo_requests_a_reply() {
        let state = LinkFlowState::sender(0);
        let mut flow = peer_flow(0, 4);
        flow.echo = true;
        let reply = state.on_incoming_flow(&flow, Role::Sender, Handle(0));
        assert!(reply.is_some());
    }
}
