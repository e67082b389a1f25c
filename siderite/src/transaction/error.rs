//! Errors of the transaction controller

use crate::link::error::SendError;

/// Errors raised while declaring or discharging a transaction
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Send(#[from] SendError),

    /// The coordinator resolved the request with a state that is not
    /// valid for it
    #[error("invalid coordinator outcome")]
    InvalidOutcome,
}
