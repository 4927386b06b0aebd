//! Error types surfaced by the messenger API

use crate::messenger::MessengerState;
use crate::session::EndpointError;

/// Error constructing a messenger.
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    /// The configured device id is empty.
    #[error("device id must not be empty")]
    EmptyDeviceId,

    /// The configured host fqdn is empty.
    #[error("iothub host fqdn must not be empty")]
    EmptyHostFqdn,
}

/// The messenger was not in the right state for the call.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// `start` requires the messenger to be stopped.
    #[error("messenger cannot start from the {0:?} state")]
    NotStopped(MessengerState),

    /// `stop` on an already stopped messenger.
    #[error("messenger is already stopped")]
    AlreadyStopped,
}

/// Error changing the cloud-to-device subscription.
#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    /// A message callback is already installed.
    #[error("messenger is already subscribed for messages")]
    AlreadySubscribed,

    /// There is no message callback to remove.
    #[error("messenger is not subscribed for messages")]
    NotSubscribed,
}

/// Error sending a disposition for a received message.
#[derive(Debug, thiserror::Error)]
pub enum DispositionError {
    /// The receiver link has been torn down.
    #[error("message receiver is not attached; check if the messenger is subscribed")]
    ReceiverNotAttached,

    /// The handle refers to a link other than the attached receiver.
    #[error("disposition refers to unknown link `{link_name}`")]
    UnknownLink {
        /// Link name carried by the disposition handle.
        link_name: String,
    },

    /// The verdict has no wire representation
    /// ([`DispositionResult::None`](crate::DispositionResult::None)).
    #[error("disposition result is not representable on the wire")]
    UnsupportedResult,

    /// The receiver endpoint failed to issue the disposition.
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

/// Error setting or applying messenger options.
#[derive(Debug, thiserror::Error)]
pub enum OptionError {
    /// The option name is not recognized.
    #[error("option `{0}` is not supported")]
    UnsupportedName(String),

    /// The value does not have the type the option expects.
    #[error("value for option `{name}` has the wrong type")]
    InvalidValue {
        /// Name of the option the value was offered for.
        name: String,
    },
}
