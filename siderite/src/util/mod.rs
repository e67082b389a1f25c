//! Small shared utilities for the engine tasks

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// How long a handshake (open, begin, attach and their closing
/// counterparts) waits for the peer's reply before giving up
pub(crate) const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Whether an engine's event loop should keep running after handling
/// one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Running {
    Continue,
    Stop,
}

/// A deadline that is pushed back every time traffic arrives.
///
/// Resolves when the peer has been silent for the whole duration. The
/// sleep is boxed so the holder stays `Unpin`.
#[derive(Debug)]
pub(crate) struct IdleTimeout {
    sleep: Pin<Box<Sleep>>,
    duration: Duration,
}

impl IdleTimeout {
    pub fn new(duration: Duration) -> Self {
        Self {
            sleep: Box::pin(tokio::time::sleep(duration)),
            duration,
        }
    }

    pub fn reset(&mut self) {
        let next = Instant::now() + self.duration;
        self.sleep.as_mut().reset(next);
    }
}

impl Future for IdleTimeout {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.sleep.as_mut().poll(cx)
    }
}
