//! Builder that runs the begin handshake with custom windows

use tokio::sync::{mpsc, oneshot};

use siderite_types::definitions::Handle;

use crate::connection::Connection;
use crate::control::ConnectionControl;

use super::engine::SessionEngine;
use super::error::BeginError;
use super::{Session, DEFAULT_WINDOW};

/// Builds a [`Session`] mapped on a connection
pub struct SessionBuilder {
    pub(crate) incoming_window: u32,
    pub(crate) outgoing_window: u32,
    pub(crate) handle_max: Handle,
    buffer_size: Option<usize>,
}

impl SessionBuilder {
    pub(crate) fn new() -> Self {
        Self {
            incoming_window: DEFAULT_WINDOW,
            outgoing_window: DEFAULT_WINDOW,
            handle_max: Handle(u32::MAX),
            buffer_size: None,
        }
    }

    /// How many incoming transfer frames may be in flight
    pub fn incoming_window(mut self, window: u32) -> Self {
        self.incoming_window = window;
        self
    }

    /// How many outgoing transfer frames may be in flight
    pub fn outgoing_window(mut self, window: u32) -> Self {
        self.outgoing_window = window;
        self
    }

    /// The highest link handle this session will accept
    pub fn handle_max(mut self, handle_max: u32) -> Self {
        self.handle_max = Handle(handle_max);
        self
    }

    /// Channel capacity for the session's frame plumbing; defaults to
    /// the connection's
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size.max(1));
        self
    }

    /// Begins the session and waits for the peer to map it
    pub async fn begin(self, connection: &mut Connection) -> Result<Session, BeginError> {
        let buffer_size = self.buffer_size.unwrap_or(connection.buffer_size);
        let (incoming_tx, incoming_rx) = mpsc::channel(buffer_size);
        let (responder, allocated) = oneshot::channel();

        connection
            .control
            .send(ConnectionControl::CreateSession {
                tx: incoming_tx,
                responder,
            })
            .await
            .map_err(|_| BeginError::ConnectionDropped)?;
        let allocation = allocated
            .await
            .map_err(|_| BeginError::ConnectionDropped)??;
        let max_frame_size = allocation.max_frame_size;

        let (control_tx, control_rx) = mpsc::channel(buffer_size);
        let (link_tx, link_rx) = mpsc::channel(buffer_size);

        let engine = SessionEngine::begin(
            &self,
            allocation,
            connection.session_frame_tx.clone(),
            connection.control.clone(),
            incoming_rx,
            control_rx,
            link_rx,
        )
        .await?;
        let engine_handle = engine.spawn();

        Ok(Session {
            control: control_tx,
            engine_handle,
            outgoing: link_tx,
            max_frame_size,
            buffer_size,
        })
    }
}
