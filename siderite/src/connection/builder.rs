//! Builder for [`Connection`](super::Connection)

use std::marker::PhantomData;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use url::Url;

use siderite_types::definitions::AMQP_PORT;
use siderite_types::performatives::{ChannelMax, MaxFrameSize, Open};
use siderite_types::states::ConnectionState;

use crate::sasl_profile::{self, SaslProfile};
use crate::transport::protocol_header::ProtocolHeader;
use crate::transport::Transport;

use super::engine::ConnectionEngine;
use super::error::OpenError;
use super::Connection;

/// Marker for a builder that still misses its mandatory container id
pub struct WithoutContainerId;
/// Marker for a builder that is ready to open
pub struct WithContainerId;

/// Builds a [`Connection`] with explicit settings.
///
/// The container id is mandatory, which the builder tracks in its type
/// state: only a `Builder<WithContainerId>` can open.
pub struct Builder<Mode> {
    container_id: String,
    hostname: Option<String>,
    max_frame_size: MaxFrameSize,
    channel_max: ChannelMax,
    idle_time_out: Option<Duration>,
    sasl_profile: Option<SaslProfile>,
    buffer_size: usize,
    marker: PhantomData<Mode>,
}

impl Default for Builder<WithoutContainerId> {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder<WithoutContainerId> {
    pub fn new() -> Self {
        Self {
            container_id: String::new(),
            hostname: None,
            max_frame_size: MaxFrameSize(65_536),
            channel_max: ChannelMax(255),
            idle_time_out: None,
            sasl_profile: None,
            buffer_size: 128,
            marker: PhantomData,
        }
    }
}

impl<Mode> Builder<Mode> {
    /// The container id carried on the open frame
    pub fn container_id(self, container_id: impl Into<String>) -> Builder<WithContainerId> {
        Builder {
            container_id: container_id.into(),
            hostname: self.hostname,
            max_frame_size: self.max_frame_size,
            channel_max: self.channel_max,
            idle_time_out: self.idle_time_out,
            sasl_profile: self.sasl_profile,
            buffer_size: self.buffer_size,
            marker: PhantomData,
        }
    }

    /// Overrides the hostname sent to the peer; defaults to the host
    /// part of the address
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// The largest frame this peer accepts. Values below the protocol
    /// minimum of 512 are raised to it.
    pub fn max_frame_size(mut self, max_frame_size: u32) -> Self {
        let clamped = max_frame_size.max(siderite_types::definitions::MIN_MAX_FRAME_SIZE as u32);
        self.max_frame_size = MaxFrameSize(clamped);
        self
    }

    pub fn channel_max(mut self, channel_max: u16) -> Self {
        self.channel_max = ChannelMax(channel_max);
        self
    }

    /// Local idle threshold: if the peer stays silent this long the
    /// connection is torn down. Half of it is advertised to the peer as
    /// our idle-time-out.
    pub fn idle_time_out(mut self, threshold: Duration) -> Self {
        self.idle_time_out = Some(threshold);
        self
    }

    /// Authenticates with the given SASL profile before opening
    pub fn sasl_profile(mut self, profile: SaslProfile) -> Self {
        self.sasl_profile = Some(profile);
        self
    }

    /// Capacity of the internal frame queues
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }
}

impl Builder<WithContainerId> {
    /// Connects over TCP and opens the connection.
    ///
    /// Credentials in the url select the PLAIN profile unless a profile
    /// was set explicitly.
    pub async fn open(mut self, address: &str) -> Result<Connection, OpenError> {
        let url =
            Url::parse(address).map_err(|err| OpenError::InvalidAddress(err.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| OpenError::InvalidAddress("address misses a host".to_string()))?
            .to_string();
        let port = url.port().unwrap_or(AMQP_PORT);

        if self.sasl_profile.is_none() {
            self.sasl_profile = SaslProfile::try_from(&url).ok();
        }
        if self.hostname.is_none() {
            self.hostname = Some(host.clone());
        }

        let stream = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(crate::transport::error::Error::from)?;
        self.open_with_stream(stream).await
    }

    /// Opens the connection over an already established stream
    pub async fn open_with_stream<Io>(self, mut io: Io) -> Result<Connection, OpenError>
    where
        Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let Builder {
            container_id,
            hostname,
            max_frame_size,
            channel_max,
            idle_time_out,
            mut sasl_profile,
            buffer_size,
            ..
        } = self;

        if let Some(profile) = sasl_profile.as_mut() {
            io = sasl_profile::negotiate(io, hostname.as_deref(), profile).await?;
        }

        let mut header_state = ConnectionState::Start;
        Transport::negotiate(&mut io, &mut header_state, ProtocolHeader::amqp()).await?;
        let transport = Transport::bind(io, max_frame_size.0 as usize, idle_time_out);

        // advertise half the local threshold so a well behaved peer
        // heartbeats well before we give up on it
        let advertised_idle_time_out = idle_time_out
            .map(|threshold| (threshold.as_millis() / 2) as u32)
            .filter(|millis| *millis > 0);

        let local_open = Open {
            container_id,
            hostname,
            max_frame_size,
            channel_max,
            idle_time_out: advertised_idle_time_out,
            ..Default::default()
        };

        let (control_tx, control_rx) = mpsc::channel(buffer_size);
        let (session_frame_tx, session_frame_rx) = mpsc::channel(buffer_size);

        let (engine, _remote_open) =
            ConnectionEngine::open(transport, local_open, control_rx, session_frame_rx).await?;
        let max_frame_size = engine.negotiated_max_frame_size();
        let engine_handle = engine.spawn();

        Ok(Connection {
            control: control_tx,
            session_frame_tx,
            engine_handle,
            max_frame_size,
            buffer_size,
        })
    }
}
