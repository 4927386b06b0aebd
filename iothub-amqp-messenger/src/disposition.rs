//! Disposition handles for received messages

use fe2o3_amqp_types::definitions::{self, DeliveryNumber, ErrorCondition};
use fe2o3_amqp_types::messaging::{Accepted, Outcome, Rejected, Released};
use serde_amqp::primitives::Symbol;

use crate::constants::REJECTED_BY_APPLICATION;

/// Verdict the application returns for a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispositionResult {
    /// Do not answer the delivery at all (a disposition may still be sent
    /// later through [`send_disposition`](crate::AmqpMessenger::send_disposition)).
    None,

    /// Settle the delivery as accepted.
    Accepted,

    /// Settle the delivery as rejected, with the fixed
    /// "Rejected by application" condition.
    Rejected,

    /// Settle the delivery as released.
    Released,
}

impl DispositionResult {
    /// The wire outcome for this verdict; `None` means nothing is sent.
    pub(crate) fn into_outcome(self) -> Option<Outcome> {
        match self {
            DispositionResult::None => None,
            DispositionResult::Accepted => Some(Outcome::Accepted(Accepted {})),
            DispositionResult::Released => Some(Outcome::Released(Released {})),
            DispositionResult::Rejected => Some(Outcome::Rejected(Rejected {
                error: Some(definitions::Error::new(
                    ErrorCondition::Custom(Symbol::from(REJECTED_BY_APPLICATION)),
                    Some(REJECTED_BY_APPLICATION.to_owned()),
                    None,
                )),
            })),
        }
    }
}

/// Identifies a received message for a later disposition.
///
/// One handle is produced per inbound message, captured from the receiver
/// before the application callback runs. The successful path of
/// [`send_disposition`](crate::AmqpMessenger::send_disposition) consumes it;
/// otherwise it is simply dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispositionInfo {
    /// Delivery number of the message within its link.
    pub delivery_number: DeliveryNumber,

    /// Name of the link the message arrived on.
    pub link_name: String,
}
