//! Container identity attached to every published log line.
//!
//! Tenant and service identifiers come from the container environment by
//! exact key match. Missing or empty values fall back to [`DEFAULT_ID`] so a
//! session always carries a usable routing tag.

/// Environment key holding the tenant identifier.
pub const TENANT_ID_KEY: &str = "TENANT_ID";
/// Environment key holding the service identifier.
pub const SERVICE_ID_KEY: &str = "SERVICE_ID";
/// Identifier used when the environment does not provide one.
pub const DEFAULT_ID: &str = "default";

/// Immutable identity of one logging stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    container_id: String,
    tenant_id: String,
    service_id: String,
}

impl Identity {
    /// Build an identity from explicit values, defaulting empty identifiers.
    pub fn new(
        container_id: impl Into<String>,
        tenant_id: impl Into<String>,
        service_id: impl Into<String>,
    ) -> Self {
        Self {
            container_id: container_id.into(),
            tenant_id: or_default(tenant_id.into()),
            service_id: or_default(service_id.into()),
        }
    }

    /// Derive an identity from `KEY=VALUE` environment pairs.
    ///
    /// Pairs without `=` are ignored. Only the first `=` separates the key
    /// from the value, so values may themselves contain `=`. When a key is
    /// repeated the last occurrence wins.
    pub fn from_env<I, S>(container_id: impl Into<String>, env: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tenant_id = String::new();
        let mut service_id = String::new();
        for pair in env {
            let Some((key, value)) = pair.as_ref().split_once('=') else {
                continue;
            };
            match key {
                TENANT_ID_KEY => tenant_id = value.to_owned(),
                SERVICE_ID_KEY => service_id = value.to_owned(),
                _ => {}
            }
        }
        Self::new(container_id, tenant_id, service_id)
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// Format a log line as the payload frame: `"<container_id>: <line>"`.
    pub fn payload(&self, line: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.container_id.len() + 2 + line.len());
        buf.extend_from_slice(self.container_id.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(line);
        buf
    }
}

fn or_default(value: String) -> String {
    if value.is_empty() {
        DEFAULT_ID.to_owned()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::tenant_only(&["TENANT_ID=t1"], "t1", "default")]
    #[case::empty(&[], "default", "default")]
    #[case::both(&["SERVICE_ID=s1", "TENANT_ID=t1"], "t1", "s1")]
    #[case::empty_values(&["TENANT_ID=", "SERVICE_ID="], "default", "default")]
    #[case::no_separator(&["TENANT_ID", "PATH=/usr/bin"], "default", "default")]
    #[case::value_with_equals(&["SERVICE_ID=a=b"], "default", "a=b")]
    #[case::case_sensitive(&["tenant_id=t1"], "default", "default")]
    #[case::last_wins(&["TENANT_ID=t1", "TENANT_ID=t2"], "t2", "default")]
    fn derives_identity_from_env(
        #[case] env: &[&str],
        #[case] tenant: &str,
        #[case] service: &str,
    ) {
        let identity = Identity::from_env("abc123", env.iter());
        assert_eq!(identity.container_id(), "abc123");
        assert_eq!(identity.tenant_id(), tenant);
        assert_eq!(identity.service_id(), service);
    }

    #[rstest]
    fn payload_prefixes_container_id() {
        let identity = Identity::new("c1", "t", "s");
        assert_eq!(identity.payload(b"hello world"), b"c1: hello world");
    }

    #[rstest]
    fn payload_keeps_non_utf8_bytes() {
        let identity = Identity::new("c1", "t", "s");
        assert_eq!(identity.payload(&[0xff, 0x00]), b"c1: \xff\x00");
    }
}
