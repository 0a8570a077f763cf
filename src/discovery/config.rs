//! Discovery endpoints and timeouts.

use std::time::Duration;

/// Cluster directory listing the running log collector instances.
pub const DEFAULT_DIRECTORY_URL: &str =
    "http://region.goodrain.me:8888/v1/etcd/event-log/instances";
/// Status endpoint queried when the directory yields nothing usable.
pub const DEFAULT_STATUS_URL: &str = "http://region.goodrain.me:6363/docker-instance";
/// Transport address used when no candidate reports success.
pub const DEFAULT_ADDRESS: &str = "tcp://region.goodrain.me:6362";
/// Connect timeout for discovery requests.
pub const DEFAULT_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Overall timeout for a single discovery request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Endpoints and timeouts used by [`DiscoveryResolver`](super::DiscoveryResolver).
#[derive(Clone, Debug)]
pub struct DiscoveryConfig {
    /// Directory URL returning the collector instance list.
    pub directory_url: String,
    /// Status URL used when the directory yields no candidates. The service
    /// identifier is appended as a query parameter.
    pub default_status_url: String,
    /// Address returned when every candidate fails.
    pub default_address: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            directory_url: DEFAULT_DIRECTORY_URL.into(),
            default_status_url: DEFAULT_STATUS_URL.into(),
            default_address: DEFAULT_ADDRESS.into(),
            connect_timeout: DEFAULT_HTTP_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl DiscoveryConfig {
    pub fn with_directory_url(mut self, url: impl Into<String>) -> Self {
        self.directory_url = url.into();
        self
    }

    pub fn with_default_status_url(mut self, url: impl Into<String>) -> Self {
        self.default_status_url = url.into();
        self
    }

    pub fn with_default_address(mut self, address: impl Into<String>) -> Self {
        self.default_address = address.into();
        self
    }

    /// Apply the same timeout to connecting and to the whole request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self.request_timeout = timeout;
        self
    }
}
