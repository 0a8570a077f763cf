//! ZeroMQ publishing session with monitored reconnection.
//!
//! A [`Session`] owns one [`PublishChannel`] at a time. Every channel is
//! watched by a [`ConnectionMonitor`] reading the socket's connection events.
//! When the monitor sees the disconnect threshold reached it hands over to a
//! reconnect coordinator, which closes the socket, resolves the server
//! address again, opens a new socket and starts a fresh monitor. Sends and
//! socket replacement share one guard, so no message is written to a socket
//! that is being swapped out.

mod backoff;
mod channel;
mod config;
mod monitor;
mod reconnect;
mod session;
mod transport;
mod zmq_transport;


pub use backoff::BackoffState;
pub use channel::PublishChannel;
pub use config::{
    BackoffPolicy, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_CAP, DEFAULT_BACKOFF_DEADLINE,
    DEFAULT_CLOSE_LINGER, DEFAULT_DISCONNECT_THRESHOLD, DEFAULT_POLL_INTERVAL,
    DEFAULT_RECONNECT_LINGER, ZmqLogConfig,
};
pub use monitor::{ConnectionMonitor, MonitorExit, MonitorHandle, RetryCounter};
pub use reconnect::ReconnectError;
pub use session::{Session, SessionError};
pub use transport::{
    Connection, ConnectionEvent, EventSource, Generation, Publisher, Transport, TransportError,
};
pub use zmq_transport::{ZmqTransport, classify_event, monitor_endpoint};
