//! The connection engine: one task that owns the transport and
//! multiplexes sessions over it

use std::cmp::min;
use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use slab::Slab;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, instrument, trace, warn};

use siderite_types::definitions::{AmqpError, Error as AmqpDefError};
use siderite_types::performatives::{Begin, Close, End, Open};
use siderite_types::states::ConnectionState;

use crate::control::{ConnectionControl, SessionAllocation, SessionId};
use crate::frames::amqp::{Frame, FrameBody};
use crate::session::frame::{SessionFrame, SessionFrameBody};
use crate::transport::Transport;
use crate::util::{Running, HANDSHAKE_TIMEOUT};

use super::error::{Error, OpenError};
use super::heartbeat::HeartBeat;

struct SessionEntry {
    tx: mpsc::Sender<SessionFrame>,
}

pub(crate) struct ConnectionEngine<Io> {
    transport: Transport<Io>,
    local_open: Open,
    state: ConnectionState,
    control: mpsc::Receiver<ConnectionControl>,
    outgoing_session_frames: mpsc::Receiver<SessionFrame>,
    heartbeat: HeartBeat,
    sessions: Slab<SessionEntry>,
    by_incoming_channel: HashMap<u16, SessionId>,
    negotiated_max_frame_size: usize,
    negotiated_channel_max: u16,
    remote_close_error: Option<AmqpDefError>,
}

impl<Io> ConnectionEngine<Io>
where
    Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Performs the open handshake but does not start the event loop
    pub async fn open(
        transport: Transport<Io>,
        local_open: Open,
        control: mpsc::Receiver<ConnectionControl>,
        outgoing_session_frames: mpsc::Receiver<SessionFrame>,
    ) -> Result<(Self, Open), OpenError> {
        let local_max_frame_size = local_open.max_frame_size.0 as usize;
        let local_channel_max = local_open.channel_max.0;
        let mut engine = Self {
            transport,
            local_open,
            state: ConnectionState::HeaderExchange,
            control,
            outgoing_session_frames,
            heartbeat: HeartBeat::never(),
            sessions: Slab::new(),
            by_incoming_channel: HashMap::new(),
            negotiated_max_frame_size: local_max_frame_size,
            negotiated_channel_max: local_channel_max,
            remote_close_error: None,
        };

        let open = engine.local_open.clone();
        engine.transport.send(Frame::new(0, FrameBody::Open(open))).await?;
        engine.state = ConnectionState::OpenSent;

        let remote_open = timeout(HANDSHAKE_TIMEOUT, async {
            loop {
                let frame = match engine.transport.next().await {
                    Some(frame) => frame?,
                    None => return Err(OpenError::StreamClosed),
                };
                match frame.body {
                    FrameBody::Open(open) => return Ok(open),
                    FrameBody::Close(close) => {
                        return Err(OpenError::RemoteClosed { error: close.error })
                    }
                    FrameBody::Empty => continue,
                    _ => return Err(OpenError::UnexpectedFrame),
                }
            }
        })
        .await
        .map_err(|_| OpenError::OpenTimeout)??;

        engine.on_remote_open(&remote_open);
        engine.state = ConnectionState::Opened;
        trace!(container_id = %remote_open.container_id, "connection opened");

        Ok((engine, remote_open))
    }

    fn on_remote_open(&mut self, remote_open: &Open) {
        self.negotiated_max_frame_size = min(
            self.local_open.max_frame_size.0 as usize,
            remote_open.max_frame_size.0 as usize,
        );
        self.transport
            .set_max_frame_size(self.negotiated_max_frame_size);
        self.negotiated_channel_max = min(
            self.local_open.channel_max.0,
            remote_open.channel_max.0,
        );

        // empty frames must go out at half the period the peer asked for
        self.heartbeat = match remote_open.idle_time_out {
            Some(millis) if millis > 0 => {
                HeartBeat::new(Duration::from_millis(millis as u64 / 2))
            }
            _ => HeartBeat::never(),
        };
    }

    pub fn negotiated_max_frame_size(&self) -> usize {
        self.negotiated_max_frame_size
    }

    pub fn spawn(self) -> JoinHandle<Result<(), Error>> {
        tokio::spawn(self.event_loop())
    }

    async fn forward_to_session(&mut self, channel: u16, frame: SessionFrame) -> Result<(), Error> {
        let session_id = self
            .by_incoming_channel
            .get(&channel)
            .copied()
            .ok_or(Error::SessionNotFound(channel))?;
        let entry = self
            .sessions
            .get(session_id)
            .ok_or(Error::SessionNotFound(channel))?;
        entry
            .tx
            .send(frame)
            .await
            .map_err(|_| Error::SessionNotFound(channel))
    }

    async fn on_incoming(&mut self, frame: Frame) -> Result<Running, Error> {
        let Frame { channel, body } = frame;

        match body {
            FrameBody::Open(_) => {
                // the peer already opened during the handshake
                return Err(Error::IllegalState);
            }
            FrameBody::Begin(begin) => self.on_incoming_begin(channel, begin).await?,
            FrameBody::Attach(attach) => {
                let frame = SessionFrame::new(channel, SessionFrameBody::Attach(attach));
                self.forward_to_session(channel, frame).await?;
            }
            FrameBody::Flow(flow) => {
                let frame = SessionFrame::new(channel, SessionFrameBody::Flow(flow));
                self.forward_to_session(channel, frame).await?;
            }
            FrameBody::Transfer {
                performative,
                payload,
            } => {
                let frame = SessionFrame::new(
                    channel,
                    SessionFrameBody::Transfer {
                        performative,
                        payload,
                    },
                );
                self.forward_to_session(channel, frame).await?;
            }
            FrameBody::Disposition(disposition) => {
                let frame = SessionFrame::new(channel, SessionFrameBody::Disposition(disposition));
                self.forward_to_session(channel, frame).await?;
            }
            FrameBody::Detach(detach) => {
                let frame = SessionFrame::new(channel, SessionFrameBody::Detach(detach));
                self.forward_to_session(channel, frame).await?;
            }
            FrameBody::End(end) => self.on_incoming_end(channel, end).await?,
            FrameBody::Close(close) => return self.on_incoming_close(close).await,
            FrameBody::Empty => {
                // heartbeat; the transport already reset the idle clock
            }
        }

        Ok(Running::Continue)
    }

    async fn on_incoming_begin(&mut self, channel: u16, begin: Begin) -> Result<(), Error> {
        match begin.remote_channel {
            Some(local_channel) => {
                let session_id = local_channel as SessionId;
                if !self.sessions.contains(session_id) {
                    return Err(Error::SessionNotFound(channel));
                }
                self.by_incoming_channel.insert(channel, session_id);
                let frame = SessionFrame::new(channel, SessionFrameBody::Begin(begin));
                self.forward_to_session(channel, frame).await
            }
            None => {
                // remotely initiated sessions are not supported on a
                // client connection
                warn!(channel, "ignoring remotely initiated begin");
                Ok(())
            }
        }
    }

    async fn on_incoming_end(&mut self, channel: u16, end: End) -> Result<(), Error> {
        let frame = SessionFrame::new(channel, SessionFrameBody::End(end));
        self.forward_to_session(channel, frame).await?;
        self.by_incoming_channel.remove(&channel);
        Ok(())
    }

    async fn on_incoming_close(&mut self, close: Close) -> Result<Running, Error> {
        if let Some(error) = close.error {
            error!(%error, "remote closed connection with error");
            self.remote_close_error = Some(error);
        }

        match self.state {
            ConnectionState::CloseSent | ConnectionState::Discarding => {
                self.state = ConnectionState::End;
            }
            _ => {
                self.transport
                    .send(Frame::new(0, FrameBody::Close(Close::default())))
                    .await?;
                self.state = ConnectionState::End;
            }
        }
        Ok(Running::Stop)
    }

    async fn on_control(&mut self, control: ConnectionControl) -> Result<Running, Error> {
        match control {
            ConnectionControl::Close(error) => {
                self.transport
                    .send(Frame::new(0, FrameBody::Close(Close { error })))
                    .await?;
                self.state = ConnectionState::CloseSent;
            }
            ConnectionControl::CreateSession { tx, responder } => {
                let result = self.create_session(tx);
                let _ = responder.send(result);
            }
            ConnectionControl::DropSession(session_id) => {
                self.sessions.try_remove(session_id);
                self.by_incoming_channel.retain(|_, id| *id != session_id);
            }
        }
        Ok(Running::Continue)
    }

    fn create_session(
        &mut self,
        tx: mpsc::Sender<SessionFrame>,
    ) -> Result<SessionAllocation, Error> {
        if self.state != ConnectionState::Opened {
            return Err(Error::IllegalState);
        }
        let entry = self.sessions.vacant_entry();
        let session_id = entry.key();
        if session_id > self.negotiated_channel_max as usize {
            return Err(Error::ChannelMaxExceeded);
        }
        entry.insert(SessionEntry { tx });
        Ok(SessionAllocation {
            session_id,
            outgoing_channel: session_id as u16,
            max_frame_size: self.negotiated_max_frame_size,
        })
    }

    async fn on_outgoing_session_frame(&mut self, frame: SessionFrame) -> Result<Running, Error> {
        if self.state != ConnectionState::Opened {
            // sessions racing against a close are dropped silently
            return Ok(Running::Continue);
        }

        let SessionFrame { channel, body } = frame;
        let body = match body {
            SessionFrameBody::Begin(begin) => FrameBody::Begin(begin),
            SessionFrameBody::Attach(attach) => FrameBody::Attach(attach),
            SessionFrameBody::Flow(flow) => FrameBody::Flow(flow),
            SessionFrameBody::Transfer {
                performative,
                payload,
            } => FrameBody::Transfer {
                performative,
                payload,
            },
            SessionFrameBody::Disposition(disposition) => FrameBody::Disposition(disposition),
            SessionFrameBody::Detach(detach) => FrameBody::Detach(detach),
            SessionFrameBody::End(end) => FrameBody::End(end),
        };

        self.transport.send(Frame::new(channel, body)).await?;
        Ok(Running::Continue)
    }

    async fn on_heartbeat(&mut self) -> Result<Running, Error> {
        match self.state {
            ConnectionState::Opened => {
                self.transport.send(Frame::empty()).await?;
                Ok(Running::Continue)
            }
            ConnectionState::End => Ok(Running::Stop),
            _ => Ok(Running::Continue),
        }
    }

    #[instrument(name = "connection_engine", skip_all)]
    async fn event_loop(mut self) -> Result<(), Error> {
        let result = loop {
            let running = tokio::select! {
                Some(_) = self.heartbeat.next() => self.on_heartbeat().await,
                incoming = self.transport.next() => match incoming {
                    Some(Ok(frame)) => self.on_incoming(frame).await,
                    Some(Err(err)) => Err(err.into()),
                    // peer dropped the stream without a close handshake
                    None => Ok(Running::Stop),
                },
                control = self.control.recv() => match control {
                    Some(control) => self.on_control(control).await,
                    // the connection handle is gone
                    None => Ok(Running::Stop),
                },
                frame = self.outgoing_session_frames.recv() => match frame {
                    Some(frame) => self.on_outgoing_session_frame(frame).await,
                    None => Ok(Running::Stop),
                },
            };

            match running {
                Ok(Running::Continue) => {}
                Ok(Running::Stop) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        match result {
            Ok(()) => match self.remote_close_error.take() {
                Some(error) => Err(Error::RemoteClosedWithError(error)),
                None => Ok(()),
            },
            Err(err) => {
                error!(%err, "connection engine error");
                // best effort close so the peer learns why
                if matches!(self.state, ConnectionState::Opened) {
                    let condition = match &err {
                        Error::SessionNotFound(_) => AmqpError::NotFound,
                        _ => AmqpError::InternalError,
                    };
                    let close = Close {
                        error: Some(AmqpDefError::new(condition, None)),
                    };
                    let _ = self
                        .transport
                        .send(Frame::new(0, FrameBody::Close(close)))
                        .await;
                    self.state = ConnectionState::Discarding;
                }
                Err(err)
            }
        }
    }
}
