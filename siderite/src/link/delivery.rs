//! A received delivery and its metadata

use siderite_types::definitions::{DeliveryNumber, DeliveryTag};
use siderite_types::messaging::Message;

/// A fully assembled incoming delivery.
///
/// The receiver hands one of these back per delivery, however many
/// transfer frames it arrived in.
#[derive(Debug)]
pub struct Delivery {
    pub(crate) delivery_id: DeliveryNumber,
    pub(crate) delivery_tag: DeliveryTag,
    pub(crate) settled: bool,
    pub(crate) message: Message,
}

impl Delivery {
    pub fn delivery_id(&self) -> DeliveryNumber {
        self.delivery_id
    }

    pub fn delivery_tag(&self) -> &DeliveryTag {
        &self.delivery_tag
    }

    /// Whether the sender already settled this delivery; settled
    /// deliveries need no disposition
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}
