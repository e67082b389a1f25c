//! Errors of the SASL negotiation

use siderite_types::primitives::{Binary, Symbol};
use siderite_types::sasl::SaslCode;

use crate::transport;

/// Errors raised while negotiating the SASL security layer
#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error(transparent)]
    Transport(#[from] transport::error::Error),

    /// The server does not offer the mechanism this profile speaks
    #[error("server does not offer mechanism {0}")]
    MechanismNotOffered(Symbol),

    /// The mechanism received a challenge it cannot answer
    #[error("mechanism cannot answer the challenge")]
    ChallengeNotSupported,

    /// The server reported a non-ok outcome
    #[error("sasl outcome code {code:?}")]
    OutcomeFailed {
        code: SaslCode,
        additional_data: Option<Binary>,
    },

    /// The server sent a frame that does not belong in the exchange
    #[error("unexpected sasl frame")]
    UnexpectedFrame,

    /// The stream closed before the exchange finished
    #[error("stream closed during sasl negotiation")]
    StreamClosed,
}
