//! The control link through which transactions are declared and
//! discharged

use tracing::trace;

use siderite_types::messaging::{DeliveryState, Message};
use siderite_types::transaction::{Coordinator, Declare, Discharge, TransactionId};
use siderite_types::value::{Described, Descriptor, Value};

use crate::link::error::{AttachError, DetachError};
use crate::link::Sender;
use crate::session::Session;

use super::error::ControllerError;
use super::Transaction;

/// A sender attached to the peer's transaction coordinator.
///
/// Declare and discharge requests travel as ordinary deliveries whose
/// body carries the request composite.
pub struct Controller {
    sender: Sender,
}

impl Controller {
    /// Attaches a control link on the session
    pub async fn attach(
        session: &mut Session,
        name: impl Into<String>,
    ) -> Result<Controller, AttachError> {
        let sender = Sender::builder()
            .name(name)
            .coordinator(Coordinator::default())
            .attach(session)
            .await?;
        Ok(Controller { sender })
    }

    /// Declares a new transaction and hands back a handle scoped to it
    pub async fn declare(&mut self) -> Result<Transaction<'_>, ControllerError> {
        let body = Value::Described(Box::new(Described {
            descriptor: Descriptor::Code(Declare::DESCRIPTOR),
            value: Value::List(vec![]),
        }));
        let resolved = self
            .sender
            .send_with_state(Message::value(body), None, false)
            .await?;
        match resolved {
            DeliveryState::Declared(declared) => {
                trace!(txn_id = ?declared.txn_id, "transaction declared");
                Ok(Transaction {
                    controller: self,
                    txn_id: declared.txn_id,
                })
            }
            _ => Err(ControllerError::InvalidOutcome),
        }
    }

    pub(crate) async fn discharge(
        &mut self,
        txn_id: TransactionId,
        fail: bool,
    ) -> Result<(), ControllerError> {
        let body = Value::Described(Box::new(Described {
            descriptor: Descriptor::Code(Discharge::DESCRIPTOR),
            value: Value::List(vec![Value::Binary(txn_id), Value::Bool(fail)]),
        }));
        let resolved = self
            .sender
            .send_with_state(Message::value(body), None, false)
            .await?;
        match resolved {
            DeliveryState::Accepted(_) => Ok(()),
            DeliveryState::Rejected(rejected) => Err(ControllerError::Send(
                crate::link::error::SendError::Rejected(rejected),
            )),
            _ => Err(ControllerError::InvalidOutcome),
        }
    }

    /// Closes the control link
    pub async fn close(self) -> Result<(), DetachError> {
        self.sender.close().await
    }
}
