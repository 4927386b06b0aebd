//! Device-twin composition of the core messenger
//!
//! The twin pipeline is a separate layer that reuses [`AmqpMessenger`] with
//! twin-specific link addresses and attach properties. This module provides
//! that composition: the messenger configuration both twin links are
//! attached with, and the desired-properties patch message shape. The twin
//! request/response tracking itself lives with the consumer of the core
//! contract.

use fe2o3_amqp_types::messaging::annotations::{Annotations, OwnedKey};
use fe2o3_amqp_types::messaging::{Message, MessageAnnotations};
use serde_amqp::primitives::{Binary, OrderedMap, Symbol};
use serde_amqp::Value;
use uuid::Uuid;

use crate::messenger::MessengerConfig;

/// Attach property carrying the channel correlation id shared by the twin
/// link pair.
pub const TWIN_CORRELATION_ID_PROPERTY_NAME: &str = "com.microsoft:channel-correlation-id";

/// Attach property carrying the twin api version.
pub const TWIN_API_VERSION_PROPERTY_NAME: &str = "com.microsoft:api-version";

/// Twin api version sent at attach time.
pub const TWIN_API_VERSION_NUMBER: &str = "1.0";

/// Annotation naming the twin operation.
pub const TWIN_MESSAGE_PROPERTY_OPERATION: &str = "operation";

/// Annotation naming the twin resource.
pub const TWIN_MESSAGE_PROPERTY_RESOURCE: &str = "resource";

/// Annotation carrying the twin resource version.
pub const TWIN_MESSAGE_PROPERTY_VERSION: &str = "version";

/// Resource patched when desired properties change.
pub const TWIN_RESOURCE_DESIRED: &str = "/notifications/twin/properties/desired";

/// The patch operation.
pub const TWIN_OPERATION_PATCH: &str = "PATCH";

const TWIN_SEND_LINK_TARGET_SUFFIX: &str = "twin/";
const TWIN_RECEIVE_LINK_SOURCE_SUFFIX: &str = "twin/";

/// Builds the messenger configuration the twin layer attaches its link pair
/// with: `twin/` send and receive suffixes and a fresh
/// `twin:<uuid>` channel correlation id shared by both links.
pub fn twin_messenger_config(
    device_id: impl Into<String>,
    iothub_host_fqdn: impl Into<String>,
) -> MessengerConfig {
    let mut properties = OrderedMap::default();
    properties.insert(
        TWIN_CORRELATION_ID_PROPERTY_NAME.to_owned(),
        format!("twin:{}", Uuid::new_v4()),
    );
    properties.insert(
        TWIN_API_VERSION_PROPERTY_NAME.to_owned(),
        TWIN_API_VERSION_NUMBER.to_owned(),
    );

    MessengerConfig::new(device_id, iothub_host_fqdn)
        .send_link_target_suffix(TWIN_SEND_LINK_TARGET_SUFFIX)
        .receive_link_source_suffix(TWIN_RECEIVE_LINK_SOURCE_SUFFIX)
        .send_link_attach_properties(properties.clone())
        .receive_link_attach_properties(properties)
}

/// Builds a desired-properties patch message: `PATCH` on the desired
/// properties resource with the payload as the binary body.
pub fn twin_patch_message(payload: impl Into<Binary>) -> Message<Value> {
    let mut annotations = Annotations::default();
    annotations.insert(
        OwnedKey::from(Symbol::from(TWIN_MESSAGE_PROPERTY_OPERATION)),
        Value::String(TWIN_OPERATION_PATCH.to_owned()),
    );
    annotations.insert(
        OwnedKey::from(Symbol::from(TWIN_MESSAGE_PROPERTY_RESOURCE)),
        Value::String(TWIN_RESOURCE_DESIRED.to_owned()),
    );
    annotations.insert(
        OwnedKey::from(Symbol::from(TWIN_MESSAGE_PROPERTY_VERSION)),
        Value::Null,
    );

    Message::builder()
        .body(Value::Binary(payload.into()))
        .message_annotations(MessageAnnotations(annotations))
        .build()
}
