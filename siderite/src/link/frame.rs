//! Frames exchanged between link handles and their session engine

use bytes::Bytes;
use tokio::sync::oneshot;

use siderite_types::definitions::{DeliveryNumber, Handle, Role, SequenceNo};
use siderite_types::messaging::DeliveryState;
use siderite_types::performatives::{Attach, Detach, Transfer};

/// Sent from a link handle to the session engine
#[derive(Debug)]
pub(crate) enum LinkFrame {
    Attach(Attach),
    Flow(LinkFlow),
    /// One delivery, already split into its transfer frames. The
    /// session assigns the delivery id and meters the frames through
    /// its windows.
    Transfer {
        frames: Vec<(Transfer, Bytes)>,
        settlement: Option<oneshot::Sender<DeliveryState>>,
    },
    Disposition {
        role: Role,
        first: DeliveryNumber,
        last: Option<DeliveryNumber>,
        settled: bool,
        state: Option<DeliveryState>,
    },
    Detach(Detach),
}

/// The link-level fields of a flow; the session fills in its window
/// fields before the frame goes out
#[derive(Debug, Clone)]
pub(crate) struct LinkFlow {
    pub handle: Handle,
    pub delivery_count: Option<SequenceNo>,
    pub link_credit: Option<u32>,
    pub available: Option<u32>,
    pub drain: bool,
    pub echo: bool,
}

/// Sent from the session engine to a link handle
#[derive(Debug)]
pub(crate) enum LinkIncomingItem {
    Attach(Attach),
    Transfer {
        performative: Transfer,
        payload: Bytes,
    },
    Detach(Detach),
}
