//! The session engine: one task per session that owns the transfer
//! windows, assigns delivery ids and routes frames to links

use std::cmp::min;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use bytes::Bytes;
use slab::Slab;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, instrument, trace, warn};

use siderite_types::definitions::{
    DeliveryNumber, Error as AmqpDefError, Handle, Role, SessionError,
};
use siderite_types::messaging::DeliveryState;
use siderite_types::performatives::{Begin, Detach, Disposition, End, Flow, Transfer};
use siderite_types::states::SessionState;

use crate::control::{ConnectionControl, SessionAllocation, SessionControl, SessionId};
use crate::link::frame::{LinkFlow, LinkFrame, LinkIncomingItem};
use crate::link::state::LinkFlowState;
use crate::util::{Running, HANDSHAKE_TIMEOUT};

use super::builder::SessionBuilder;
use super::error::{BeginError, Error};
use super::frame::{SessionFrame, SessionFrameBody};

struct LinkEntry {
    name: String,
    tx: mpsc::Sender<LinkIncomingItem>,
    flow_state: Arc<LinkFlowState>,
    role: Role,
    /// The peer's handle for this link, learnt from its attach
    input_handle: Option<u32>,
    /// Whether the last incoming transfer had more frames to come
    mid_delivery: bool,
}

pub(crate) struct SessionEngine {
    session_id: SessionId,
    outgoing_channel: u16,
    state: SessionState,
    conn_outgoing: mpsc::Sender<SessionFrame>,
    conn_control: mpsc::Sender<ConnectionControl>,
    incoming: mpsc::Receiver<SessionFrame>,
    control: mpsc::Receiver<SessionControl>,
    link_frames: mpsc::Receiver<LinkFrame>,

    next_outgoing_id: u32,
    next_incoming_id: u32,
    incoming_window: u32,
    initial_incoming_window: u32,
    outgoing_window: u32,
    /// How many more transfers the peer will accept
    remote_incoming_window: u32,
    remote_outgoing_window: u32,
    handle_max: u32,

    links: Slab<LinkEntry>,
    links_by_name: HashMap<String, usize>,
    links_by_input_handle: HashMap<u32, usize>,

    next_outgoing_delivery_id: DeliveryNumber,
    outgoing_unsettled: BTreeMap<DeliveryNumber, oneshot::Sender<DeliveryState>>,
    /// Transfers held back while the remote incoming window is shut
    paused: VecDeque<(Transfer, Bytes)>,
    remote_end_error: Option<AmqpDefError>,
}

impl SessionEngine {
    /// Performs the begin handshake but does not start the event loop
    pub async fn begin(
        builder: &SessionBuilder,
        allocation: SessionAllocation,
        conn_outgoing: mpsc::Sender<SessionFrame>,
        conn_control: mpsc::Sender<ConnectionControl>,
        incoming: mpsc::Receiver<SessionFrame>,
        control: mpsc::Receiver<SessionControl>,
        link_frames: mpsc::Receiver<LinkFrame>,
    ) -> Result<Self, BeginError> {
        let mut engine = Self {
            session_id: allocation.session_id,
            outgoing_channel: allocation.outgoing_channel,
            state: SessionState::Unmapped,
            conn_outgoing,
            conn_control,
            incoming,
            control,
            link_frames,
            next_outgoing_id: 0,
            next_incoming_id: 0,
            incoming_window: builder.incoming_window,
            initial_incoming_window: builder.incoming_window,
            outgoing_window: builder.outgoing_window,
            remote_incoming_window: 0,
            remote_outgoing_window: 0,
            handle_max: builder.handle_max.0,
            links: Slab::new(),
            links_by_name: HashMap::new(),
            links_by_input_handle: HashMap::new(),
            next_outgoing_delivery_id: 0,
            outgoing_unsettled: BTreeMap::new(),
            paused: VecDeque::new(),
            remote_end_error: None,
        };

        let begin = Begin {
            next_outgoing_id: engine.next_outgoing_id,
            incoming_window: engine.incoming_window,
            outgoing_window: engine.outgoing_window,
            handle_max: builder.handle_max,
            ..Default::default()
        };
        engine
            .send_to_connection(SessionFrameBody::Begin(begin))
            .await
            .map_err(|_| BeginError::ConnectionDropped)?;
        engine.state = SessionState::BeginSent;

        let remote_begin = timeout(HANDSHAKE_TIMEOUT, async {
            loop {
                let frame = engine
                    .incoming
                    .recv()
                    .await
                    .ok_or(BeginError::ConnectionDropped)?;
                match frame.body {
                    SessionFrameBody::Begin(remote_begin) => return Ok(remote_begin),
                    SessionFrameBody::End(end) => {
                        return Err(BeginError::RemoteEnded { error: end.error })
                    }
                    _ => {
                        // frames for a session that is not mapped yet
                        warn!("ignoring frame received before the remote begin");
                    }
                }
            }
        })
        .await
        .map_err(|_| BeginError::BeginTimeout)??;
        engine.on_remote_begin(&remote_begin);

        engine.state = SessionState::Mapped;
        trace!(channel = engine.outgoing_channel, "session mapped");
        Ok(engine)
    }

    fn on_remote_begin(&mut self, begin: &Begin) {
        self.next_incoming_id = begin.next_outgoing_id;
        self.remote_incoming_window = begin.incoming_window;
        self.remote_outgoing_window = begin.outgoing_window;
        // neither end may use a handle the other cannot accept
        self.handle_max = min(self.handle_max, begin.handle_max.0);
    }

    pub fn spawn(self) -> JoinHandle<Result<(), Error>> {
        tokio::spawn(self.event_loop())
    }

    async fn send_to_connection(&mut self, body: SessionFrameBody) -> Result<(), Error> {
        self.conn_outgoing
            .send(SessionFrame::new(self.outgoing_channel, body))
            .await
            .map_err(|_| Error::ConnectionDropped)
    }

    fn session_flow(&self) -> Flow {
        Flow {
            next_incoming_id: Some(self.next_incoming_id),
            next_outgoing_id: self.next_outgoing_id,
            incoming_window: self.incoming_window,
            outgoing_window: self.outgoing_window,
            ..Default::default()
        }
    }

    async fn send_link_flow(&mut self, link_flow: LinkFlow) -> Result<(), Error> {
        let flow = Flow {
            handle: Some(link_flow.handle),
            delivery_count: link_flow.delivery_count,
            link_credit: link_flow.link_credit,
            available: link_flow.available,
            drain: link_flow.drain,
            echo: link_flow.echo,
            ..self.session_flow()
        };
        self.send_to_connection(SessionFrameBody::Flow(flow)).await
    }

    async fn on_incoming(&mut self, frame: SessionFrame) -> Result<Running, Error> {
        match frame.body {
            SessionFrameBody::Begin(_) => return Err(Error::IllegalState),
            SessionFrameBody::Attach(attach) => self.on_incoming_attach(attach).await?,
            SessionFrameBody::Flow(flow) => self.on_incoming_flow(flow).await?,
            SessionFrameBody::Transfer {
                performative,
                payload,
            } => self.on_incoming_transfer(performative, payload).await?,
            SessionFrameBody::Disposition(disposition) => {
                self.on_incoming_disposition(disposition).await?
            }
            SessionFrameBody::Detach(detach) => self.on_incoming_detach(detach).await?,
            SessionFrameBody::End(end) => return self.on_incoming_end(end).await,
        }
        Ok(Running::Continue)
    }

    async fn on_incoming_attach(
        &mut self,
        attach: siderite_types::performatives::Attach,
    ) -> Result<(), Error> {
        let key = match self.links_by_name.get(&attach.name) {
            Some(key) => *key,
            None => {
                // remotely initiated links are not supported
                warn!(name = %attach.name, "ignoring attach for an unknown link");
                return Ok(());
            }
        };
        let input_handle = attach.handle.0;
        if let Some(entry) = self.links.get_mut(key) {
            entry.input_handle = Some(input_handle);
            self.links_by_input_handle.insert(input_handle, key);
            let _ = entry.tx.send(LinkIncomingItem::Attach(attach)).await;
        }
        Ok(())
    }

    async fn on_incoming_flow(&mut self, flow: Flow) -> Result<(), Error> {
        self.next_incoming_id = flow.next_outgoing_id;
        self.remote_outgoing_window = flow.outgoing_window;
        // the peer's window is anchored at the id it has seen, which may
        // trail what we have already sent
        self.remote_incoming_window = match flow.next_incoming_id {
            Some(next_incoming_id) => next_incoming_id
                .wrapping_add(flow.incoming_window)
                .wrapping_sub(self.next_outgoing_id),
            None => flow.incoming_window,
        };
        self.flush_paused().await?;

        if let Some(handle) = flow.handle {
            let key = match self.links_by_input_handle.get(&handle.0) {
                Some(key) => *key,
                None => return Err(Error::UnattachedHandle),
            };
            if let Some(entry) = self.links.get(key) {
                let reply =
                    entry
                        .flow_state
                        .on_incoming_flow(&flow, entry.role, Handle(key as u32));
                if let Some(reply) = reply {
                    self.send_link_flow(reply).await?;
                }
            }
        } else if flow.echo {
            let reply = self.session_flow();
            self.send_to_connection(SessionFrameBody::Flow(reply)).await?;
        }
        Ok(())
    }

    async fn on_incoming_transfer(
        &mut self,
        transfer: Transfer,
        payload: Bytes,
    ) -> Result<(), Error> {
        if self.incoming_window == 0 {
            return Err(Error::WindowViolation);
        }
        self.next_incoming_id = self.next_incoming_id.wrapping_add(1);
        self.incoming_window -= 1;

        // reopen the window before the peer can run it dry
        if self.incoming_window < self.initial_incoming_window / 2 {
            self.incoming_window = self.initial_incoming_window;
            let flow = self.session_flow();
            self.send_to_connection(SessionFrameBody::Flow(flow)).await?;
        }

        let key = match self.links_by_input_handle.get(&transfer.handle.0) {
            Some(key) => *key,
            None => return Err(Error::UnattachedHandle),
        };
        if let Some(entry) = self.links.get_mut(key) {
            if !entry.mid_delivery {
                entry.flow_state.on_incoming_delivery();
            }
            entry.mid_delivery = transfer.more;
            let _ = entry
                .tx
                .send(LinkIncomingItem::Transfer {
                    performative: transfer,
                    payload,
                })
                .await;
        }
        Ok(())
    }

    async fn on_incoming_disposition(&mut self, disposition: Disposition) -> Result<(), Error> {
        // only the receiving peer settles our outgoing deliveries; its
        // dispositions carry the receiver role
        if disposition.role != Role::Receiver {
            return Ok(());
        }

        let first = disposition.first;
        let last = disposition.last.unwrap_or(first);
        let mut id = first;
        loop {
            // ids the peer already settled are simply absent
            if let Some(resolved) = self.outgoing_unsettled.remove(&id) {
                if let Some(state) = disposition.state.clone() {
                    let _ = resolved.send(state);
                }
            }
            if id == last {
                break;
            }
            id = id.wrapping_add(1);
        }

        if !disposition.settled {
            let echo = Disposition {
                role: Role::Sender,
                first,
                last: disposition.last,
                settled: true,
                state: disposition.state,
                ..Default::default()
            };
            self.send_to_connection(SessionFrameBody::Disposition(echo))
                .await?;
        }
        Ok(())
    }

    async fn on_incoming_detach(&mut self, detach: Detach) -> Result<(), Error> {
        let key = match self.links_by_input_handle.get(&detach.handle.0) {
            Some(key) => *key,
            None => return Err(Error::UnattachedHandle),
        };
        if let Some(entry) = self.links.get(key) {
            let _ = entry.tx.send(LinkIncomingItem::Detach(detach)).await;
        }
        Ok(())
    }

    async fn on_incoming_end(&mut self, end: End) -> Result<Running, Error> {
        if let Some(error) = end.error {
            error!(%error, "remote ended session with error");
            self.remote_end_error = Some(error);
        }

        match self.state {
            SessionState::EndSent | SessionState::Discarding => {
                self.state = SessionState::Unmapped;
            }
            _ => {
                self.send_to_connection(SessionFrameBody::End(End::default()))
                    .await?;
                self.state = SessionState::Unmapped;
            }
        }
        Ok(Running::Stop)
    }

    async fn on_control(&mut self, control: SessionControl) -> Result<Running, Error> {
        match control {
            SessionControl::End(error) => {
                self.send_to_connection(SessionFrameBody::End(End { error }))
                    .await?;
                self.state = SessionState::EndSent;
            }
            SessionControl::AllocateLink {
                name,
                role,
                tx,
                flow_state,
                responder,
            } => {
                let result = self.allocate_link(name, role, tx, flow_state);
                let _ = responder.send(result);
            }
            SessionControl::DeallocateLink(handle) => {
                let key = handle.0 as usize;
                if self.links.contains(key) {
                    let entry = self.links.remove(key);
                    self.links_by_name.remove(&entry.name);
                    if let Some(input_handle) = entry.input_handle {
                        self.links_by_input_handle.remove(&input_handle);
                    }
                }
            }
        }
        Ok(Running::Continue)
    }

    fn allocate_link(
        &mut self,
        name: String,
        role: Role,
        tx: mpsc::Sender<LinkIncomingItem>,
        flow_state: Arc<LinkFlowState>,
    ) -> Result<Handle, Error> {
        if self.state != SessionState::Mapped {
            return Err(Error::IllegalState);
        }
        if self.links_by_name.contains_key(&name) {
            return Err(Error::LinkNameInUse);
        }
        let entry = self.links.vacant_entry();
        let key = entry.key();
        if key as u32 > self.handle_max {
            return Err(Error::HandleMaxExceeded);
        }
        entry.insert(LinkEntry {
            name: name.clone(),
            tx,
            flow_state,
            role,
            input_handle: None,
            mid_delivery: false,
        });
        self.links_by_name.insert(name, key);
        Ok(Handle(key as u32))
    }

    async fn on_link_frame(&mut self, frame: LinkFrame) -> Result<Running, Error> {
        match frame {
            LinkFrame::Attach(attach) => {
                self.send_to_connection(SessionFrameBody::Attach(attach))
                    .await?;
            }
            LinkFrame::Flow(link_flow) => {
                self.send_link_flow(link_flow).await?;
            }
            LinkFrame::Transfer { frames, settlement } => {
                self.on_outgoing_transfer(frames, settlement).await?;
            }
            LinkFrame::Disposition {
                role,
                first,
                last,
                settled,
                state,
            } => {
                let disposition = Disposition {
                    role,
                    first,
                    last,
                    settled,
                    state,
                    ..Default::default()
                };
                self.send_to_connection(SessionFrameBody::Disposition(disposition))
                    .await?;
            }
            LinkFrame::Detach(detach) => {
                self.send_to_connection(SessionFrameBody::Detach(detach))
                    .await?;
            }
        }
        Ok(Running::Continue)
    }

    async fn on_outgoing_transfer(
        &mut self,
        mut frames: Vec<(Transfer, Bytes)>,
        settlement: Option<oneshot::Sender<DeliveryState>>,
    ) -> Result<(), Error> {
        let delivery_id = self.next_outgoing_delivery_id;
        self.next_outgoing_delivery_id = self.next_outgoing_delivery_id.wrapping_add(1);
        if let Some((first, _)) = frames.first_mut() {
            first.delivery_id = Some(delivery_id);
        }
        if let Some(settlement) = settlement {
            self.outgoing_unsettled.insert(delivery_id, settlement);
        }

        for (transfer, payload) in frames {
            self.send_or_pause(transfer, payload).await?;
        }
        Ok(())
    }

    /// A transfer only goes out while the peer's incoming window is
    /// open; otherwise it queues behind earlier paused transfers
    async fn send_or_pause(&mut self, transfer: Transfer, payload: Bytes) -> Result<(), Error> {
        if !self.paused.is_empty() || self.remote_incoming_window == 0 {
            self.paused.push_back((transfer, payload));
            return Ok(());
        }
        self.send_transfer(transfer, payload).await
    }

    async fn send_transfer(&mut self, transfer: Transfer, payload: Bytes) -> Result<(), Error> {
        self.next_outgoing_id = self.next_outgoing_id.wrapping_add(1);
        self.remote_incoming_window -= 1;
        self.send_to_connection(SessionFrameBody::Transfer {
            performative: transfer,
            payload,
        })
        .await
    }

    async fn flush_paused(&mut self) -> Result<(), Error> {
        while self.remote_incoming_window > 0 {
            match self.paused.pop_front() {
                Some((transfer, payload)) => self.send_transfer(transfer, payload).await?,
                None => break,
            }
        }
        Ok(())
    }

    #[instrument(name = "session_engine", skip_all, fields(channel = self.outgoing_channel))]
    async fn event_loop(mut self) -> Result<(), Error> {
        let result = loop {
            let running = tokio::select! {
                frame = self.incoming.recv() => match frame {
                    Some(frame) => self.on_incoming(frame).await,
                    // the connection engine is gone
                    None => Err(Error::ConnectionDropped),
                },
                control = self.control.recv() => match control {
                    Some(control) => self.on_control(control).await,
                    // every handle to this session is gone
                    None => Ok(Running::Stop),
                },
                frame = self.link_frames.recv() => match frame {
                    Some(frame) => self.on_link_frame(frame).await,
                    None => Ok(Running::Stop),
                },
            };

            match running {
                Ok(Running::Continue) => {}
                Ok(Running::Stop) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        let result = match result {
            Ok(()) => match self.remote_end_error.take() {
                Some(error) => Err(Error::RemoteEndedWithError(error)),
                None => Ok(()),
            },
            Err(err) => {
                error!(%err, "session engine error");
                if self.state == SessionState::Mapped {
                    let condition = match &err {
                        Error::WindowViolation => Some(SessionError::WindowViolation),
                        Error::UnattachedHandle => Some(SessionError::UnattachedHandle),
                        _ => None,
                    };
                    if let Some(condition) = condition {
                        let end = End {
                            error: Some(AmqpDefError::new(condition, None)),
                        };
                        let _ = self.send_to_connection(SessionFrameBody::End(end)).await;
                        self.state = SessionState::Discarding;
                    }
                }
                Err(err)
            }
        };

        let _ = self
            .conn_control
            .send(ConnectionControl::DropSession(self.session_id))
            .await;
        result
    }
}

#[cfg(test)]
mod tests {
    use siderite_types::messaging::Accepted;
    use siderite_types::performatives::Attach;

    use crate::session::DEFAULT_WINDOW;

    use super::*;

    fn test_engine() -> (SessionEngine, mpsc::Receiver<SessionFrame>) {
        let (conn_tx, conn_rx) = mpsc::channel(64);
        let (conn_ctl_tx, _) = mpsc::channel(64);
        let (_, incoming_rx) = mpsc::channel(64);
        let (_, control_rx) = mpsc::channel(64);
        let (_, link_rx) = mpsc::channel(64);
        let engine = SessionEngine {
            session_id: 0,
            outgoing_channel: 0,
            state: SessionState::Mapped,
            conn_outgoing: conn_tx,
            conn_control: conn_ctl_tx,
            incoming: incoming_rx,
            control: control_rx,
            link_frames: link_rx,
            next_outgoing_id: 0,
            next_incoming_id: 0,
            incoming_window: DEFAULT_WINDOW,
            initial_incoming_window: DEFAULT_WINDOW,
            outgoing_window: DEFAULT_WINDOW,
            remote_incoming_window: DEFAULT_WINDOW,
            remote_outgoing_window: DEFAULT_WINDOW,
            handle_max: u32::MAX,
            links: Slab::new(),
            links_by_name: HashMap::new(),
            links_by_input_handle: HashMap::new(),
            next_outgoing_delivery_id: 0,
            outgoing_unsettled: BTreeMap::new(),
            paused: VecDeque::new(),
            remote_end_error: None,
        };
        (engine, conn_rx)
    }

    async fn attach_test_link(
        engine: &mut SessionEngine,
        role: Role,
    ) -> (Handle, mpsc::Receiver<LinkIncomingItem>, Arc<LinkFlowState>) {
        let (tx, mut rx) = mpsc::channel(64);
        let flow_state = Arc::new(LinkFlowState::sender(0));
        let handle = engine
            .allocate_link("test-link".to_string(), role, tx, flow_state.clone())
            .unwrap();
        engine
            .on_incoming_attach(Attach {
                name: "test-link".to_string(),
                handle: Handle(9),
                ..Default::default()
            })
            .await
            .unwrap();
        // drain the forwarded attach
        let _ = rx.recv().await.unwrap();
        (handle, rx, flow_state)
    }

    #[tokio::test]
    async fn outgoing_transfer_takes_the_remote_window() {
        let (mut engine, mut conn_rx) = test_engine();
        engine.remote_incoming_window = 2;

        let (settle_tx, mut settle_rx) = oneshot::channel();
        let frames = vec![(Transfer::default(), Bytes::from_static(b"one"))];
        engine
            .on_outgoing_transfer(frames, Some(settle_tx))
            .await
            .unwrap();

        assert_eq!(engine.remote_incoming_window, 1);
        assert_eq!(engine.next_outgoing_id, 1);
        match conn_rx.recv().await.unwrap().body {
            SessionFrameBody::Transfer { performative, .. } => {
                assert_eq!(performative.delivery_id, Some(0));
            }
            other => panic!("expected a transfer, got {other:?}"),
        }

        engine
            .on_incoming_disposition(Disposition {
                role: Role::Receiver,
                first: 0,
                settled: true,
                state: Some(DeliveryState::Accepted(Accepted {})),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(matches!(
            settle_rx.try_recv(),
            Ok(DeliveryState::Accepted(_))
        ));
        assert!(engine.outgoing_unsettled.is_empty());
    }

    #[tokio::test]
    async fn transfers_pause_while_the_window_is_shut() {
        let (mut engine, mut conn_rx) = test_engine();
        engine.remote_incoming_window = 0;

        let frames = vec![(Transfer::default(), Bytes::from_static(b"held"))];
        engine.on_outgoing_transfer(frames, None).await.unwrap();
        assert_eq!(engine.paused.len(), 1);
        assert!(conn_rx.try_recv().is_err());

        // the peer reopening its window releases the queue in order
        engine
            .on_incoming_flow(Flow {
                next_incoming_id: Some(0),
                next_outgoing_id: 0,
                incoming_window: 10,
                outgoing_window: DEFAULT_WINDOW,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(engine.paused.is_empty());
        assert!(matches!(
            conn_rx.recv().await.unwrap().body,
            SessionFrameBody::Transfer { .. }
        ));
    }

    #[tokio::test]
    async fn unsettled_disposition_is_confirmed() {
        let (mut engine, mut conn_rx) = test_engine();
        let (settle_tx, _settle_rx) = oneshot::channel();
        engine.outgoing_unsettled.insert(0, settle_tx);

        engine
            .on_incoming_disposition(Disposition {
                role: Role::Receiver,
                first: 0,
                settled: false,
                state: Some(DeliveryState::Accepted(Accepted {})),
                ..Default::default()
            })
            .await
            .unwrap();

        match conn_rx.recv().await.unwrap().body {
            SessionFrameBody::Disposition(echo) => {
                assert_eq!(echo.role, Role::Sender);
                assert!(echo.settled);
                assert_eq!(echo.first, 0);
            }
            other => panic!("expected a disposition, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn settling_an_unknown_id_is_a_no_op() {
        let (mut engine, _conn_rx) = test_engine();
        engine
            .on_incoming_disposition(Disposition {
                role: Role::Receiver,
                first: 41,
                last: Some(43),
                settled: true,
                state: Some(DeliveryState::Accepted(Accepted {})),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn incoming_window_is_replenished() {
        let (mut engine, mut conn_rx) = test_engine();
        let (_handle, mut link_rx, _flow_state) =
            attach_test_link(&mut engine, Role::Receiver).await;
        engine.incoming_window = DEFAULT_WINDOW / 2;

        engine
            .on_incoming_transfer(
                Transfer {
                    handle: Handle(9),
                    delivery_id: Some(0),
                    ..Default::default()
                },
                Bytes::from_static(b"payload"),
            )
            .await
            .unwrap();

        assert_eq!(engine.incoming_window, DEFAULT_WINDOW);
        match conn_rx.recv().await.unwrap().body {
            SessionFrameBody::Flow(flow) => {
                assert_eq!(flow.incoming_window, DEFAULT_WINDOW);
                assert!(flow.handle.is_none());
            }
            other => panic!("expected a flow, got {other:?}"),
        }
        assert!(matches!(
            link_rx.recv().await.unwrap(),
            LinkIncomingItem::Transfer { .. }
        ));
    }

    #[tokio::test]
    async fn exhausted_incoming_window_is_a_violation() {
        let (mut engine, _conn_rx) = test_engine();
        engine.incoming_window = 0;
        let result = engine
            .on_incoming_transfer(Transfer::default(), Bytes::new())
            .await;
        assert!(matches!(result, Err(Error::WindowViolation)));
    }

    #[tokio::test]
    async fn handle_max_bounds_link_allocation() {
        let (mut engine, _conn_rx) = test_engine();
        engine.handle_max = 0;
        let (tx_a, _) = mpsc::channel(1);
        let (tx_b, _) = mpsc::channel(1);
        let state_a = Arc::new(LinkFlowState::sender(0));
        let state_b = Arc::new(LinkFlowState::sender(0));

        engine
            .allocate_link("a".to_string(), Role::Sender, tx_a, state_a)
            .unwrap();
        let result = engine.allocate_link("b".to_string(), Role::Sender, tx_b, state_b);
        assert!(matches!(result, Err(Error::HandleMaxExceeded)));
    }

    #[tokio::test]
    async fn duplicate_link_names_are_rejected() {
        let (mut engine, _conn_rx) = test_engine();
        let (tx_a, _) = mpsc::channel(1);
        let (tx_b, _) = mpsc::channel(1);
        let state_a = Arc::new(LinkFlowState::sender(0));
        let state_b = Arc::new(LinkFlowState::sender(0));

        engine
            .allocate_link("dup".to_string(), Role::Sender, tx_a, state_a)
            .unwrap();
        let result = engine.allocate_link("dup".to_string(), Role::Sender, tx_b, state_b);
        assert!(matches!(result, Err(Error::LinkNameInUse)));
    }
}
