//! Log server discovery over HTTP.
//!
//! The [`DiscoveryResolver`] walks a fallback chain to find the address of an
//! active log collector:
//!
//! 1. Ask the cluster directory for collector instances.
//! 2. Without usable instances, fall back to the static default status URL.
//! 3. Ask each candidate for its status; the first `"success"` answer wins.
//! 4. Without a winner, return the static default transport address.
//!
//! Every HTTP, I/O and JSON failure is logged and treated as an unusable
//! candidate. Resolution never fails and never yields an empty address.

mod config;
mod resolver;
mod wire;

#[cfg(test)]
mod tests;

pub use config::{
    DEFAULT_ADDRESS, DEFAULT_DIRECTORY_URL, DEFAULT_HTTP_CONNECT_TIMEOUT, DEFAULT_HTTP_TIMEOUT,
    DEFAULT_STATUS_URL, DiscoveryConfig,
};
pub use resolver::{AddressResolver, DiscoveryResolver, status_url};
