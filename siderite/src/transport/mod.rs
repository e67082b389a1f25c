//! Framed transport over a raw byte stream.
//!
//! Two layers: `tokio_util::codec::LengthDelimitedCodec` handles the
//! 4-octet size prefix, and [`FrameCodec`] handles the frame header and
//! body on top of it. The transport also owns the idle timeout clock,
//! which is reset whenever a frame (including an empty one) arrives.

pub mod error;
pub mod protocol_header;

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::{Future, Sink, Stream};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{
    Decoder, Encoder, Framed, LengthDelimitedCodec, LengthDelimitedCodecError,
};

use siderite_types::states::ConnectionState;

use crate::frames::amqp::{Frame, FrameCodec};
use crate::util::IdleTimeout;

use error::Error;
use protocol_header::ProtocolHeader;

pin_project! {
    /// A stream and sink of AMQP frames over any `AsyncRead + AsyncWrite`
    pub struct Transport<Io> {
        #[pin]
        framed: Framed<Io, LengthDelimitedCodec>,
        idle_timeout: Option<IdleTimeout>,
    }
}

impl<Io> Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    /// Binds the framed layers onto `io`.
    ///
    /// Before negotiation the max frame size must be the protocol
    /// minimum of 512 octets.
    pub fn bind(io: Io, max_frame_size: usize, idle_timeout: Option<Duration>) -> Self {
        let framed = LengthDelimitedCodec::builder()
            .big_endian()
            .length_field_length(4)
            .max_frame_length(max_frame_size)
            // the size field counts itself
            .length_adjustment(-4)
            .new_framed(io);
        let idle_timeout = idle_timeout
            .filter(|duration| !duration.is_zero())
            .map(IdleTimeout::new);

        Self {
            framed,
            idle_timeout,
        }
    }

    pub async fn send_proto_header(
        io: &mut Io,
        local_state: &mut ConnectionState,
        proto_header: ProtocolHeader,
    ) -> Result<(), Error> {
        let buf: [u8; 8] = proto_header.into();
        match local_state {
            ConnectionState::Start => {
                io.write_all(&buf).await?;
                *local_state = ConnectionState::HeaderSent;
            }
            ConnectionState::HeaderReceived => {
                io.write_all(&buf).await?;
                *local_state = ConnectionState::HeaderExchange;
            }
            _ => return Err(Error::IllegalState),
        }
        Ok(())
    }

    pub async fn recv_proto_header(
        io: &mut Io,
        local_state: &mut ConnectionState,
        proto_header: &ProtocolHeader,
    ) -> Result<ProtocolHeader, Error> {
        match local_state {
            ConnectionState::Start => {
                let incoming = read_and_compare_proto_header(io, local_state, proto_header).await?;
                *local_state = ConnectionState::HeaderReceived;
                Ok(incoming)
            }
            ConnectionState::HeaderSent => {
                let incoming = read_and_compare_proto_header(io, local_state, proto_header).await?;
                *local_state = ConnectionState::HeaderExchange;
                Ok(incoming)
            }
            _ => Err(Error::IllegalState),
        }
    }

    /// Sends the local header and awaits a matching one from the peer
    pub async fn negotiate(
        io: &mut Io,
        local_state: &mut ConnectionState,
        proto_header: ProtocolHeader,
    ) -> Result<ProtocolHeader, Error> {
        Self::send_proto_header(io, local_state, proto_header.clone()).await?;
        Self::recv_proto_header(io, local_state, &proto_header).await
    }

    pub fn set_max_frame_size(&mut self, max_frame_size: usize) -> &mut Self {
        self.framed.codec_mut().set_max_frame_length(max_frame_size);
        self
    }

    pub fn set_idle_timeout(&mut self, duration: Duration) -> &mut Self {
        self.idle_timeout = match duration.is_zero() {
            true => None,
            false => Some(IdleTimeout::new(duration)),
        };
        self
    }

    /// Consumes the transport and returns the underlying io
    pub fn into_inner(self) -> Io {
        self.framed.into_inner()
    }
}

async fn read_and_compare_proto_header<Io>(
    io: &mut Io,
    local_state: &mut ConnectionState,
    proto_header: &ProtocolHeader,
) -> Result<ProtocolHeader, Error>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    let mut inbound_buf = [0u8; 8];
    io.read_exact(&mut inbound_buf).await?;
    let incoming_header = ProtocolHeader::try_from(inbound_buf)?;
    if incoming_header != *proto_header {
        // version negotiation failed; the connection is dead
        *local_state = ConnectionState::End;
        return Err(Error::UnexpectedProtocolHeader(inbound_buf));
    }
    Ok(incoming_header)
}

impl<Io> Sink<Frame> for Transport<Io>
where
    Io: AsyncWrite + Unpin,
{
    type Error = Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_ready(cx).map_err(Into::into)
    }

    fn start_send(self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        let mut bytes = BytesMut::new();
        FrameCodec {}.encode(item, &mut bytes)?;

        let this = self.project();
        this.framed
            .start_send(Bytes::from(bytes))
            .map_err(Into::into)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_flush(cx).map_err(Into::into)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        let this = self.project();
        this.framed.poll_close(cx).map_err(Into::into)
    }
}

impl<Io> Stream for Transport<Io>
where
    Io: AsyncRead + Unpin,
{
    type Item = Result<Frame, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.framed.poll_next(cx) {
            Poll::Ready(next) => {
                // any inbound traffic counts against the idle timeout
                if let Some(delay) = this.idle_timeout.as_mut() {
                    delay.reset();
                }

                match next {
                    Some(Ok(mut src)) => {
                        let mut decoder = FrameCodec {};
                        Poll::Ready(decoder.decode(&mut src).transpose())
                    }
                    Some(Err(err)) => {
                        let oversized = err
                            .get_ref()
                            .and_then(|e| e.downcast_ref::<LengthDelimitedCodecError>())
                            .is_some();
                        if oversized {
                            Poll::Ready(Some(Err(Error::MaxFrameSizeExceeded)))
                        } else {
                            Poll::Ready(Some(Err(err.into())))
                        }
                    }
                    None => Poll::Ready(None),
                }
            }
            Poll::Pending => {
                if let Some(delay) = this.idle_timeout.as_mut() {
                    match Pin::new(delay).poll(cx) {
                        Poll::Ready(()) => return Poll::Ready(Some(Err(Error::IdleTimeout))),
                        Poll::Pending => return Poll::Pending,
                    }
                }
                Poll::Pending
            }
        }
    }
}
