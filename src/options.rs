//! Log option validation and the driver variants they select.

use std::collections::HashMap;

use thiserror::Error;

/// Name under which the driver registers with the host.
pub const DRIVER_NAME: &str = "zmqlog";
/// Option key overriding the server address.
pub const ZMQ_ADDRESS: &str = "zmq-address";

/// Errors reported while validating host supplied log options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    #[error("unknown log opt '{key}' for {driver} log driver")]
    Unknown { key: String, driver: &'static str },
    #[error("missing required log opt '{key}' for {driver} log driver")]
    Missing { key: &'static str, driver: &'static str },
}

/// Deployment variant of the driver.
///
/// Variants differ in the routing frames prefixed to each message and in
/// whether the address option is mandatory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Variant {
    /// Routes on the service identifier alone and discovers the server
    /// address when no override is configured.
    #[default]
    ServiceRouted,
    /// Routes on tenant then service identifier and requires an explicit
    /// `zmq-address`.
    TenantRouted,
}

impl Variant {
    /// Whether `zmq-address` must be present and non-empty.
    pub fn requires_address(self) -> bool {
        matches!(self, Variant::TenantRouted)
    }

    /// Routing frames sent ahead of the payload frame.
    pub fn routing_frames<'a>(self, tenant_id: &'a str, service_id: &'a str) -> Vec<&'a [u8]> {
        match self {
            Variant::ServiceRouted => vec![service_id.as_bytes()],
            Variant::TenantRouted => vec![tenant_id.as_bytes(), service_id.as_bytes()],
        }
    }
}

/// Validate a host option map for the given variant.
///
/// Unknown keys are rejected first so the error always names the offending
/// key, even when a required key is also missing.
pub fn validate_log_opts(
    opts: &HashMap<String, String>,
    variant: Variant,
) -> Result<(), OptionError> {
    if let Some(key) = opts.keys().find(|key| key.as_str() != ZMQ_ADDRESS) {
        return Err(OptionError::Unknown {
            key: key.clone(),
            driver: DRIVER_NAME,
        });
    }
    if variant.requires_address() && address_override(opts).is_none() {
        return Err(OptionError::Missing {
            key: ZMQ_ADDRESS,
            driver: DRIVER_NAME,
        });
    }
    Ok(())
}

/// Return the configured address override, treating an empty value as absent.
pub fn address_override(opts: &HashMap<String, String>) -> Option<&str> {
    opts.get(ZMQ_ADDRESS)
        .map(String::as_str)
        .filter(|address| !address.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn opts(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[rstest]
    #[case(Variant::ServiceRouted)]
    #[case(Variant::TenantRouted)]
    fn accepts_address_override(#[case] variant: Variant) {
        let cfg = opts(&[(ZMQ_ADDRESS, "tcp://x:1")]);
        assert_eq!(validate_log_opts(&cfg, variant), Ok(()));
    }

    #[rstest]
    #[case(Variant::ServiceRouted)]
    #[case(Variant::TenantRouted)]
    fn rejects_unknown_key(#[case] variant: Variant) {
        let err = validate_log_opts(&opts(&[("unknown", "v")]), variant)
            .expect_err("unknown key must be rejected");
        assert!(matches!(&err, OptionError::Unknown { key, .. } if key == "unknown"));
        assert_eq!(err.to_string(), "unknown log opt 'unknown' for zmqlog log driver");
    }

    #[rstest]
    fn tenant_routed_requires_address() {
        let err = validate_log_opts(&HashMap::new(), Variant::TenantRouted)
            .expect_err("address is required");
        assert!(err.to_string().contains(ZMQ_ADDRESS));
    }

    #[rstest]
    fn tenant_routed_rejects_empty_address() {
        let err = validate_log_opts(&opts(&[(ZMQ_ADDRESS, "")]), Variant::TenantRouted)
            .expect_err("empty address is treated as missing");
        assert!(matches!(err, OptionError::Missing { .. }));
    }

    #[rstest]
    fn service_routed_accepts_empty_options() {
        assert_eq!(validate_log_opts(&HashMap::new(), Variant::ServiceRouted), Ok(()));
    }

    #[rstest]
    fn routing_frames_follow_variant() {
        assert_eq!(
            Variant::ServiceRouted.routing_frames("t", "s"),
            vec![b"s".as_slice()]
        );
        assert_eq!(
            Variant::TenantRouted.routing_frames("t", "s"),
            vec![b"t".as_slice(), b"s".as_slice()]
        );
    }
}
