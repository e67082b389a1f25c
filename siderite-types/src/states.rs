//! Endpoint state machines of the protocol (parts 2.4.6 and 2.5.5)

/// State of a connection endpoint, including the pipelined variants
/// reached by sending open before the peer's header arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Start,
    HeaderReceived,
    HeaderSent,
    HeaderExchange,
    OpenPipe,
    OpenClosePipe,
    OpenReceived,
    OpenSent,
    ClosePipe,
    Opened,
    CloseReceived,
    CloseSent,
    /// Close was sent due to an error; inbound frames are discarded
    /// until the peer's close arrives
    Discarding,
    End,
}

impl ConnectionState {
    /// Whether frames other than close should still be processed
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Opened)
    }
}

/// State of a session endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unmapped,
    BeginSent,
    BeginReceived,
    Mapped,
    EndSent,
    EndReceived,
    Discarding,
}

/// State of a link endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Unattached,
    AttachSent,
    AttachReceived,
    Attached,
    DetachSent,
    DetachReceived,
    Detached,
    /// The link was closed with an error or by the peer
    Closed,
}
