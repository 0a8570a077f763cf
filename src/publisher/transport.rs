//! Transport seams used by the publishing session.
//!
//! A [`Transport`] opens a publish socket together with the event source that
//! reports its connection state. The production implementation lives in
//! [`zmq_transport`](super::zmq_transport); tests plug in scripted fakes.

use std::{fmt, time::Duration};

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the transport layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("zmq error: {0}")]
    Zmq(#[from] zmq::Error),
    /// The event source produced a message that is not a connection event.
    #[error("malformed connection event: {0}")]
    MalformedEvent(String),
    /// The underlying socket is gone.
    #[error("transport closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

/// Identifies one socket generation and the monitor observing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Generation(Uuid);

impl Generation {
    /// Generate a fresh, unique generation token.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Connection-state transition reported by an [`EventSource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The socket established a connection to its peer.
    Connected,
    /// A connection or connection attempt was closed.
    Closed,
    /// Any other transport event, identified by its raw code.
    Other(u16),
}

/// Outbound publish socket.
pub trait Publisher: Send {
    /// Send one multi-part message without blocking.
    fn send_frames(&mut self, frames: &[&[u8]]) -> Result<(), TransportError>;

    /// Bound how long queued frames may linger once the socket is closed.
    fn set_linger(&mut self, linger: Duration) -> Result<(), TransportError>;

    /// Release the socket.
    fn close(self: Box<Self>) -> Result<(), TransportError>;
}

/// Out-of-band stream of connection events tied to one publisher.
pub trait EventSource: Send {
    /// Wait up to `timeout` for the next event.
    ///
    /// `Ok(None)` means the timeout elapsed without an event. An error means
    /// the source is unusable and must not be polled again.
    fn next_event(&mut self, timeout: Duration)
    -> Result<Option<ConnectionEvent>, TransportError>;
}

/// A freshly opened publisher and its event source.
pub struct Connection {
    pub publisher: Box<dyn Publisher>,
    pub events: Box<dyn EventSource>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Factory for publish sockets.
pub trait Transport: Send + Sync {
    /// Create a publisher connected to `address`, with its event source
    /// registered under `generation`.
    fn open(&self, address: &str, generation: Generation) -> Result<Connection, TransportError>;
}
