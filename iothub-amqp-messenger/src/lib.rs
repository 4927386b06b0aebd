#![deny(missing_docs, missing_debug_implementations)]

//! Device-side AMQP 1.0 application messenger for IoT hub style endpoints.
//!
//! An [`AmqpMessenger`] owns one telemetry sender link and, while
//! subscribed, one cloud-to-device receiver link on an AMQP session the
//! host supplies at [`start`](AmqpMessenger::start). Sends are serialized
//! through a retry and timeout aware queue; received messages are handed to
//! the application together with a [`DispositionInfo`] handle used to
//! accept, reject or release the delivery.
//!
//! The messenger is single-threaded and cooperative: no internal threads,
//! no blocking calls. All progress happens inside
//! [`do_work`](AmqpMessenger::do_work), which the host must call regularly.
//! The AMQP transport itself (framing, SASL, TLS) is out of scope and is
//! reached through the traits in the [`session`] module.
//!
//! # Quick start
//!
//! ```rust
//! use iothub_amqp_messenger::{AmqpMessenger, MessengerConfig, SendResult};
//! use fe2o3_amqp_types::messaging::Message;
//! use serde_amqp::Value;
//!
//! let config = MessengerConfig::new("device-1", "contoso.azure-devices.net")
//!     .on_state_changed(|previous, new| println!("{previous:?} -> {new:?}"));
//! let mut messenger = AmqpMessenger::new(config).unwrap();
//!
//! let message = Message::builder()
//!     .body(Value::String("telemetry".to_owned()))
//!     .build();
//! messenger.send_async(message, |result| {
//!     // the messenger is dropped below before a session ever attaches,
//!     // so the send completes exactly once with MessengerDestroyed
//!     assert_eq!(result, SendResult::MessengerDestroyed);
//! });
//! drop(messenger);
//! ```
//!
//! Starting the messenger requires a [`session::Session`] implementation
//! bridging to the actual transport; see the trait documentation for the
//! required semantics.

mod addressing;
mod attach;

pub mod constants;
pub mod disposition;
pub mod error;
pub mod messenger;
pub mod options;
pub mod queue;
pub mod session;
pub mod time;
pub mod twin;

pub use constants::{OPTION_EVENT_SEND_TIMEOUT_SECS, OPTION_SAVED_MESSAGE_QUEUE_OPTIONS};
pub use disposition::{DispositionInfo, DispositionResult};
pub use messenger::{AmqpMessenger, MessengerConfig, MessengerState, SendResult, SendStatus};
pub use options::{OptionValue, OptionsSnapshot};
