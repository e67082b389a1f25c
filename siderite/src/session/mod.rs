//! Session layer: transfer windows, delivery ids and link multiplexing

pub mod builder;
pub(crate) mod engine;
pub mod error;
pub(crate) mod frame;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::connection::Connection;
use crate::control::SessionControl;
use crate::link::frame::LinkFrame;
use crate::util::HANDSHAKE_TIMEOUT;

use builder::SessionBuilder;
use error::{BeginError, Error};

/// Both windows open at this many frames
pub(crate) const DEFAULT_WINDOW: u32 = 2048;

/// Handle to a mapped session.
///
/// Links are attached against this handle; the session itself runs as a
/// task that meters transfers through the peer's windows.
pub struct Session {
    pub(crate) control: mpsc::Sender<SessionControl>,
    pub(crate) engine_handle: JoinHandle<Result<(), Error>>,
    /// Cloned into every link attached on this session
    pub(crate) outgoing: mpsc::Sender<LinkFrame>,
    pub(crate) max_frame_size: usize,
    pub(crate) buffer_size: usize,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Begins a session with default windows and waits for the peer to
    /// map it
    pub async fn begin(connection: &mut Connection) -> Result<Session, BeginError> {
        Self::builder().begin(connection).await
    }

    /// Performs the end handshake and waits for the peer's end
    pub async fn end(mut self) -> Result<(), Error> {
        self.control
            .send(SessionControl::End(None))
            .await
            .map_err(|_| Error::EngineDropped)?;

        match timeout(HANDSHAKE_TIMEOUT, &mut self.engine_handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::EngineDropped),
            Err(_) => {
                self.engine_handle.abort();
                Err(Error::EndTimeout)
            }
        }
    }
}
