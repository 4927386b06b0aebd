//! Protocol literals and default knob values

use std::time::Duration;

use fe2o3_amqp_types::definitions::Seconds;

/// Prefix of the unique name given to the telemetry sender link.
pub const MESSAGE_SENDER_LINK_NAME_PREFIX: &str = "link-snd";

/// Prefix of the unique name given to the cloud-to-device receiver link.
pub const MESSAGE_RECEIVER_LINK_NAME_PREFIX: &str = "link-rcv";

/// Maximum message size negotiated for the sender link.
pub const MESSAGE_SENDER_MAX_MESSAGE_SIZE: u64 = u64::MAX;

/// Maximum message size negotiated for the receiver link.
pub const MESSAGE_RECEIVER_MAX_MESSAGE_SIZE: u64 = 65536;

/// Default devices-path format. The first substitution receives the host
/// fqdn, the second the device id.
pub const DEFAULT_DEVICES_PATH_FORMAT: &str = "%s/devices/%s";

/// Default suffix appended to the devices path for the sender link target.
pub const DEFAULT_SEND_LINK_TARGET_SUFFIX: &str = "messages/events";

/// Default suffix appended to the devices path for the receiver link source.
pub const DEFAULT_RECEIVE_LINK_SOURCE_SUFFIX: &str = "messages/devicebound";

/// Default retry limit for a queued send (0 = do not retry).
pub const DEFAULT_EVENT_SEND_RETRY_LIMIT: u32 = 0;

/// Default bound on how long a send may sit in the queue before it
/// completes with a timeout.
pub const DEFAULT_EVENT_SEND_TIMEOUT_SECS: Seconds = 600;

/// Number of failed sends after which the messenger gives up and reports an
/// error state.
pub const DEFAULT_MAX_SEND_ERROR_COUNT: u32 = 10;

/// How long the sender link may stay in the same non-open state while the
/// messenger is starting.
pub const MAX_MESSAGE_SENDER_STATE_CHANGE_TIMEOUT: Duration = Duration::from_secs(300);

/// How long the receiver link may keep opening while the messenger is
/// started.
pub const MAX_MESSAGE_RECEIVER_STATE_CHANGE_TIMEOUT: Duration = Duration::from_secs(300);

/// Option name for the send timeout, in seconds.
pub const OPTION_EVENT_SEND_TIMEOUT_SECS: &str = "amqp_event_send_timeout_secs";

/// Name under which the send queue's own option snapshot is embedded in the
/// messenger snapshot.
pub const OPTION_SAVED_MESSAGE_QUEUE_OPTIONS: &str = "amqp_message_queue_options";

/// Queue option: maximum time a message may spend enqueued, in seconds.
pub const OPTION_MAX_MESSAGE_ENQUEUED_TIME_SECS: &str = "max_message_enqueued_time_secs";

/// Queue option: maximum time a message may spend in processing, in seconds.
pub const OPTION_MAX_MESSAGE_PROCESSING_TIME_SECS: &str = "max_message_processing_time_secs";

/// Queue option: how many times a failed message is retried.
pub const OPTION_MAX_RETRY_COUNT: &str = "max_retry_count";

/// Condition and description attached to rejected dispositions.
pub const REJECTED_BY_APPLICATION: &str = "Rejected by application";
