//! Heartbeat clock driving empty-frame keepalives

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;

/// A stream that ticks whenever an empty frame is due. A connection
/// whose peer advertised no idle-time-out never ticks.
#[derive(Debug)]
pub(crate) struct HeartBeat(Option<IntervalStream>);

impl HeartBeat {
    /// No heartbeat at all
    pub fn never() -> Self {
        Self(None)
    }

    /// Ticks every `period`, starting one period from now
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self(Some(IntervalStream::new(interval)))
    }
}

impl Stream for HeartBeat {
    type Item = ();

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut().0.as_mut() {
            Some(stream) => Pin::new(stream).poll_next(cx).map(|next| next.map(|_| ())),
            None => Poll::Pending,
        }
    }
}
