//! Configuration structures consumed by the publishing session.
//!
//! [`ZmqLogConfig`] is built once per driver registration and cloned into
//! each [`Session`](super::Session). Production defaults point at the cluster
//! log service; tests substitute their own endpoints.

use std::time::Duration;

use crate::{
    discovery::DiscoveryConfig, options::Variant,
    rate_limited_warner::DEFAULT_WARN_INTERVAL,
};

/// Interval between polls of the connection-event source.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Consecutive closed events that trigger a reconnect. The transport emits
/// roughly two per second while the peer is unreachable. The reconnect fires
/// on the 60th event, one earlier than a strict `retry > 60` comparison.
pub const DEFAULT_DISCONNECT_THRESHOLD: u32 = 60;
/// Grace period given to queued frames on an explicit close.
pub const DEFAULT_CLOSE_LINGER: Duration = Duration::from_millis(10);
/// Linger applied to a socket torn down by a reconnect.
pub const DEFAULT_RECONNECT_LINGER: Duration = Duration::ZERO;
/// Default base delay between failed reconnect attempts.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);
/// Default maximum delay between failed reconnect attempts.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_secs(10);
/// Default absolute deadline for a reconnect sequence.
pub const DEFAULT_BACKOFF_DEADLINE: Duration = Duration::from_secs(120);

/// Configuration for a publishing [`Session`](super::Session).
#[derive(Clone, Debug)]
pub struct ZmqLogConfig {
    pub variant: Variant,
    pub poll_interval: Duration,
    pub disconnect_threshold: u32,
    pub close_linger: Duration,
    pub reconnect_linger: Duration,
    pub discovery: DiscoveryConfig,
    pub backoff: BackoffPolicy,
    pub warn_interval: Duration,
}

impl Default for ZmqLogConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            disconnect_threshold: DEFAULT_DISCONNECT_THRESHOLD,
            close_linger: DEFAULT_CLOSE_LINGER,
            reconnect_linger: DEFAULT_RECONNECT_LINGER,
            discovery: DiscoveryConfig::default(),
            backoff: BackoffPolicy::default(),
            warn_interval: DEFAULT_WARN_INTERVAL,
        }
    }
}

impl ZmqLogConfig {
    /// Select the deployment variant.
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_disconnect_threshold(mut self, threshold: u32) -> Self {
        self.disconnect_threshold = threshold;
        self
    }

    /// Override discovery endpoints and the static fallback address.
    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_warn_interval(mut self, interval: Duration) -> Self {
        self.warn_interval = interval;
        self
    }

    /// Reject values that would leave the monitor unable to make progress.
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_interval.is_zero() {
            return Err("poll_interval must be greater than zero".into());
        }
        if self.disconnect_threshold == 0 {
            return Err("disconnect_threshold must be greater than zero".into());
        }
        if self.discovery.default_address.is_empty() {
            return Err("default_address must not be empty".into());
        }
        Ok(())
    }
}

/// Exponential backoff policy for reconnect attempts.
#[derive(Clone, Debug)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub deadline: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BACKOFF_BASE,
            cap: DEFAULT_BACKOFF_CAP,
            deadline: DEFAULT_BACKOFF_DEADLINE,
        }
    }
}
