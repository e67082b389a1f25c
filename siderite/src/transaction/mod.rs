//! Transactional work: declaring, enrolling and discharging
//! transactions through a control link

pub mod controller;
pub mod error;

use siderite_types::messaging::{Accepted, DeliveryState, Message, Outcome};
use siderite_types::transaction::{TransactionId, TransactionalState};

use crate::link::delivery::Delivery;
use crate::link::error::{DispositionError, SendError};
use crate::link::{Receiver, Sender};

pub use controller::Controller;
use error::ControllerError;

/// A declared transaction.
///
/// Work is enrolled by posting and retiring through it; dropping it
/// without a commit or rollback leaves the discharge to the
/// coordinator's timeout.
pub struct Transaction<'a> {
    pub(crate) controller: &'a mut Controller,
    pub(crate) txn_id: TransactionId,
}

impl Transaction<'_> {
    pub fn txn_id(&self) -> &TransactionId {
        &self.txn_id
    }

    /// Sends a message whose outcome only takes effect when the
    /// transaction commits
    pub async fn post(
        &mut self,
        sender: &mut Sender,
        message: Message,
    ) -> Result<(), SendError> {
        let state = DeliveryState::TransactionalState(TransactionalState {
            txn_id: self.txn_id.clone(),
            outcome: None,
        });
        let resolved = sender.send_with_state(message, Some(state), false).await?;
        match resolved {
            DeliveryState::Accepted(_) => Ok(()),
            DeliveryState::TransactionalState(txn) => match txn.outcome {
                None | Some(Outcome::Accepted(_)) => Ok(()),
                Some(Outcome::Rejected(rejected)) => Err(SendError::Rejected(rejected)),
                Some(Outcome::Released(released)) => Err(SendError::Released(released)),
                Some(Outcome::Modified(modified)) => Err(SendError::Modified(modified)),
                Some(Outcome::Declared(_)) => Err(SendError::IllegalDeliveryState),
            },
            DeliveryState::Rejected(rejected) => Err(SendError::Rejected(rejected)),
            DeliveryState::Released(released) => Err(SendError::Released(released)),
            DeliveryState::Modified(modified) => Err(SendError::Modified(modified)),
            _ => Err(SendError::IllegalDeliveryState),
        }
    }

    /// Accepts a received delivery under this transaction; the accept
    /// only takes effect when the transaction commits
    pub async fn retire(
        &mut self,
        receiver: &mut Receiver,
        delivery: &Delivery,
    ) -> Result<(), DispositionError> {
        let state = DeliveryState::TransactionalState(TransactionalState {
            txn_id: self.txn_id.clone(),
            outcome: Some(Outcome::Accepted(Accepted {})),
        });
        receiver.dispose(delivery, state).await
    }

    /// Discharges the transaction, applying all enrolled work
    pub async fn commit(self) -> Result<(), ControllerError> {
        self.controller.discharge(self.txn_id, false).await
    }

    /// Discharges the transaction, undoing all enrolled work
    pub async fn rollback(self) -> Result<(), ControllerError> {
        self.controller.discharge(self.txn_id, true).await
    }
}
