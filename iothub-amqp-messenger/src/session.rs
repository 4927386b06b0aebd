//! Transport seam between the messenger and the AMQP session
//!
//! The underlying AMQP stack (framing, SASL, TLS, flow control) is not part
//! of this crate. The messenger only ever talks to the session and its link
//! endpoints through the object-safe traits defined here, which the host
//! implements over its transport of choice. Every method is non-blocking;
//! confirmations and inbound messages are buffered by the endpoint and
//! polled from within [`do_work`](crate::AmqpMessenger::do_work).

use std::fmt;

use fe2o3_amqp_types::definitions::{self, DeliveryNumber, Fields, ReceiverSettleMode};
use fe2o3_amqp_types::messaging::{Message, Outcome, Source, Target};
use serde_amqp::Value;

use crate::queue::SendToken;

/// Observed state of a link endpoint.
///
/// This is the coarse lifecycle the messenger reacts to, not the attach
/// handshake detail of the wire protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkState {
    /// The endpoint exists but has not started attaching.
    #[default]
    Idle,

    /// The attach handshake is in progress.
    Opening,

    /// The link is attached and usable.
    Open,

    /// A detach is in progress.
    Closing,

    /// The link failed or was detached by the peer.
    Error,
}

/// Everything needed to attach the telemetry sender link.
#[derive(Debug, Clone)]
pub struct SenderAttach {
    /// Unique link name.
    pub name: String,

    /// Source terminus; carries the locally generated source name.
    pub source: Source,

    /// Target terminus; carries the send link address.
    pub target: Target,

    /// Maximum message size for the link.
    pub max_message_size: u64,

    /// Attach-time link properties, if any.
    pub properties: Option<Fields>,
}

/// Everything needed to attach the cloud-to-device receiver link.
#[derive(Debug, Clone)]
pub struct ReceiverAttach {
    /// Unique link name.
    pub name: String,

    /// Source terminus; carries the receive link address.
    pub source: Source,

    /// Target terminus; carries the locally generated target name.
    pub target: Target,

    /// Settle mode requested from the peer. The messenger always asks for
    /// [`ReceiverSettleMode::First`].
    pub rcv_settle_mode: ReceiverSettleMode,

    /// Maximum message size for the link.
    pub max_message_size: u64,

    /// Attach-time link properties, if any.
    pub properties: Option<Fields>,
}

/// Settlement of a previously dispatched send.
#[derive(Debug)]
pub struct SendConfirmation {
    /// Token under which the send was dispatched.
    pub token: SendToken,

    /// Terminal outcome reported by the peer, or the transport failure that
    /// ended the delivery.
    pub outcome: Result<Outcome, EndpointError>,
}

/// An AMQP session capable of attaching links.
///
/// The session is handed to [`start`](crate::AmqpMessenger::start) and owned
/// by the messenger until it is dropped or replaced by the next `start`.
pub trait Session: fmt::Debug {
    /// Attaches a sender link and begins opening it.
    fn attach_sender(&mut self, attach: SenderAttach)
        -> Result<Box<dyn SenderEndpoint>, AttachError>;

    /// Attaches a receiver link and begins opening it.
    fn attach_receiver(
        &mut self,
        attach: ReceiverAttach,
    ) -> Result<Box<dyn ReceiverEndpoint>, AttachError>;
}

/// Sending half of the link pair.
pub trait SenderEndpoint: fmt::Debug {
    /// Current observed state of the endpoint.
    fn state(&self) -> LinkState;

    /// Hands a message to the transport. The token is echoed back in the
    /// matching [`SendConfirmation`].
    fn send(&mut self, token: SendToken, message: Message<Value>) -> Result<(), EndpointError>;

    /// Takes the next buffered settlement, if any.
    fn try_recv_confirmation(&mut self) -> Option<SendConfirmation>;

    /// Closes the link. Dropping the endpoint afterwards must not block.
    fn close(&mut self);
}

/// Receiving half of the link pair.
pub trait ReceiverEndpoint: fmt::Debug {
    /// Current observed state of the endpoint.
    fn state(&self) -> LinkState;

    /// Name the link was attached with.
    fn link_name(&self) -> &str;

    /// Takes the next buffered inbound message, if any.
    fn try_recv(&mut self) -> Option<(DeliveryNumber, Message<Value>)>;

    /// Sends a disposition for an earlier delivery.
    fn disposition(
        &mut self,
        delivery_number: DeliveryNumber,
        outcome: Outcome,
    ) -> Result<(), EndpointError>;

    /// Closes the link. Dropping the endpoint afterwards must not block.
    fn close(&mut self);
}

/// Error attaching a link to the session.
#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    /// The session has ended or cannot attach links right now.
    #[error("the session is in an illegal state")]
    IllegalSessionState,

    /// A link with the same name is already attached.
    #[error("link name is already in use")]
    DuplicatedLinkName,

    /// The peer refused the attach.
    #[error("link attach was refused by the remote peer")]
    Refused(Option<definitions::Error>),
}

/// Error on an attached link endpoint.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// The endpoint is not in a state that allows the operation.
    #[error("the link endpoint is in an illegal state")]
    IllegalState,

    /// The link was detached, locally or by the peer.
    #[error("the link has been detached")]
    Detached(Option<definitions::Error>),

    /// The referenced delivery is unknown or already settled.
    #[error("delivery is not found or already settled")]
    DeliveryNotFound,
}
