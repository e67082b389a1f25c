//! Frames exchanged between the connection engine and session engines

use bytes::Bytes;

use siderite_types::performatives::{
    Attach, Begin, Detach, Disposition, End, Flow, Transfer,
};

/// A session-scoped frame tagged with the channel it travels on
#[derive(Debug)]
pub(crate) struct SessionFrame {
    pub channel: u16,
    pub body: SessionFrameBody,
}

impl SessionFrame {
    pub fn new(channel: u16, body: SessionFrameBody) -> Self {
        Self { channel, body }
    }
}

#[derive(Debug)]
pub(crate) enum SessionFrameBody {
    Begin(Begin),
    Attach(Attach),
    Flow(Flow),
    Transfer {
        performative: Transfer,
        payload: Bytes,
    },
    Disposition(Disposition),
    Detach(Detach),
    End(End),
}
