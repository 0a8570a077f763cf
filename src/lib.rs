//! Container log driver publishing log lines over ZeroMQ.
//!
//! Each container stream gets a [`Session`] that publishes
//! `"<container_id>: <line>"` frames, prefixed with routing frames derived
//! from the container's tenant and service identifiers. The session watches
//! its socket's connection events and replaces the socket against a freshly
//! discovered server when the connection stays down.

pub mod discovery;
pub mod driver;
pub mod identity;
pub mod message;
pub mod options;
pub mod publisher;
pub mod rate_limited_warner;

#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;

pub use discovery::{AddressResolver, DiscoveryConfig, DiscoveryResolver};
pub use driver::{
    DriverError, DriverFactory, LogDriver, LoggerContext, OptionValidator, get_log_driver,
    new_session, register, register_log_driver, register_log_opt_validator,
    register_with_transport, validate_log_opts_for,
};
#[cfg(any(test, feature = "test-util"))]
pub use driver::reset_registry;
pub use identity::Identity;
pub use message::{LogMessage, Source};
pub use options::{DRIVER_NAME, OptionError, Variant, ZMQ_ADDRESS, validate_log_opts};
pub use publisher::{
    BackoffPolicy, ConnectionEvent, Generation, ReconnectError, Session, SessionError,
    Transport, TransportError, ZmqLogConfig, ZmqTransport,
};
