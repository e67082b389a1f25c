//! An AMQP 1.0 protocol engine.
//!
//! The crate is organized the way the protocol is layered. A
//! [`Connection`] multiplexes channels over a framed byte stream and
//! exchanges heartbeats; a [`Session`] maps a channel pair and meters
//! transfers through its windows; a [`Sender`] or [`Receiver`] moves
//! message deliveries across a link governed by credit. SASL
//! negotiation and the transactions extension sit on the outside and
//! the inside of that stack respectively.
//!
//! Each layer runs as its own task and is driven through a handle that
//! owns a control channel, mirroring the usual tokio actor shape.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut connection = Connection::builder()
//!     .container_id("example-client")
//!     .open("amqp://localhost:5672")
//!     .await?;
//! let mut session = Session::begin(&mut connection).await?;
//! let mut sender = Sender::attach(&mut session, "sender-1", "queue-a").await?;
//! sender.send(Message::value("hello")).await?;
//! ```

pub mod connection;
pub(crate) mod control;
pub mod frames;
pub mod link;
pub mod sasl_profile;
pub mod session;
pub mod transaction;
pub mod transport;
pub(crate) mod util;

pub use connection::Connection;
pub use link::{
    delivery::Delivery, receiver::CreditMode, receiver::Receiver, sender::Sender,
};
pub use sasl_profile::SaslProfile;
pub use session::Session;
pub use transaction::{controller::Controller, Transaction};
