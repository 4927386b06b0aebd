//! Devices-path, link-address and link-name construction

use uuid::Uuid;

/// The devices-path format did not carry exactly two `%s` substitutions.
#[derive(Debug, thiserror::Error)]
#[error("devices path format `{format}` must contain exactly two `%s` substitutions")]
pub struct AddressError {
    /// The offending format string.
    pub format: String,
}

/// Substitutes the host fqdn and device id into the devices-path format.
///
/// The canonical format is `%s/devices/%s`, yielding
/// `<host>/devices/<device_id>`.
pub(crate) fn devices_path(
    format: &str,
    iothub_host_fqdn: &str,
    device_id: &str,
) -> Result<String, AddressError> {
    let mut parts = format.split("%s");
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(head), Some(mid), Some(tail), None) => {
            Ok(format!("{head}{iothub_host_fqdn}{mid}{device_id}{tail}"))
        }
        _ => Err(AddressError {
            format: format.to_owned(),
        }),
    }
}

/// Builds the full link address `amqps://<devices_path>/<suffix>`.
pub(crate) fn link_address(devices_path: &str, address_suffix: &str) -> String {
    format!("amqps://{devices_path}/{address_suffix}")
}

/// Builds a link name unique per AMQP session: `<prefix>-<device_id>-<uuid>`.
pub(crate) fn unique_link_name(prefix: &str, device_id: &str) -> String {
    format!("{prefix}-{device_id}-{}", Uuid::new_v4())
}

pub(crate) fn link_source_name(link_name: &str) -> String {
    format!("{link_name}-source")
}

pub(crate) fn link_target_name(link_name: &str) -> String {
    format!("{link_name}-target")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn devices_path_substitutes_host_and_device_id() {
        let path = devices_path("%s/devices/%s", "contoso.azure-devices.net", "device-1").unwrap();
        assert_eq!(path, "contoso.azure-devices.net/devices/device-1");
    }

    #[test]
    fn devices_path_rejects_wrong_substitution_count() {
        assert!(devices_path("%s/devices", "host", "d1").is_err());
        assert!(devices_path("%s/%s/%s", "host", "d1").is_err());
        assert!(devices_path("no-substitutions", "host", "d1").is_err());
    }

    #[test]
    fn link_address_joins_path_and_suffix() {
        let address = link_address("host/devices/d1", "messages/events");
        assert_eq!(address, "amqps://host/devices/d1/messages/events");
    }

    #[test]
    fn link_names_carry_prefix_device_id_and_uuid() {
        let name = unique_link_name("link-snd", "device-1");
        let mut parts = name.splitn(3, '-');
        assert_eq!(parts.next(), Some("link"));
        // prefix itself contains a dash
        assert_eq!(parts.next(), Some("snd"));
        let rest = parts.next().unwrap();
        assert!(rest.starts_with("device-1-"));
        let uuid = &rest["device-1-".len()..];
        assert_eq!(uuid.len(), 36);

        assert_eq!(link_source_name(&name), format!("{name}-source"));
        assert_eq!(link_target_name(&name), format!("{name}-target"));
    }

    #[test]
    fn link_names_are_unique() {
        assert_ne!(
            unique_link_name("link-rcv", "d1"),
            unique_link_name("link-rcv", "d1")
        );
    }
}
