//! Connection layer: open/close handshake, channel multiplexing and
//! heartbeats

pub mod builder;
pub(crate) mod engine;
pub mod error;
mod heartbeat;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::control::ConnectionControl;
use crate::session::frame::SessionFrame;
use crate::util::HANDSHAKE_TIMEOUT;

use builder::{Builder, WithoutContainerId};
use error::{Error, OpenError};

/// Handle to an open connection.
///
/// The connection itself runs as a task; dropping this handle without
/// calling [`close`](Connection::close) fires a best effort close but
/// does not wait for the peer's answer.
pub struct Connection {
    pub(crate) control: mpsc::Sender<ConnectionControl>,
    pub(crate) session_frame_tx: mpsc::Sender<SessionFrame>,
    pub(crate) engine_handle: JoinHandle<Result<(), Error>>,
    /// Negotiated connection-wide max frame size
    pub(crate) max_frame_size: usize,
    pub(crate) buffer_size: usize,
}

impl Connection {
    pub fn builder() -> Builder<WithoutContainerId> {
        Builder::new()
    }

    /// Opens a connection with default settings
    pub async fn open(
        container_id: impl Into<String>,
        address: &str,
    ) -> Result<Connection, OpenError> {
        Self::builder().container_id(container_id).open(address).await
    }

    /// The max frame size negotiated on open
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Performs the close handshake and waits for the peer's close.
    ///
    /// Gives up after ten seconds and aborts the engine, so a peer that
    /// never answers cannot park the caller forever.
    pub async fn close(mut self) -> Result<(), Error> {
        if self
            .control
            .send(ConnectionControl::Close(None))
            .await
            .is_err()
        {
            // the engine already exited, typically on a remote close;
            // its result carries whatever the peer reported
            return match (&mut self.engine_handle).await {
                Ok(result) => result,
                Err(_) => Err(Error::EngineDropped),
            };
        }

        match timeout(HANDSHAKE_TIMEOUT, &mut self.engine_handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::EngineDropped),
            Err(_) => {
                self.engine_handle.abort();
                Err(Error::CloseTimeout)
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // after an explicit close the engine is gone and this is a no-op
        let _ = self.control.try_send(ConnectionControl::Close(None));
    }
}
