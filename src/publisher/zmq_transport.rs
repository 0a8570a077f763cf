//! ZeroMQ implementation of the publisher transport.
//!
//! Each opened publisher is a `PUB` socket with socket monitoring enabled on
//! an `inproc://` endpoint named after its [`Generation`]. A `PAIR` socket in
//! the same context reads the monitor stream.

use std::time::Duration;

use super::transport::{
    Connection, ConnectionEvent, EventSource, Generation, Publisher, Transport, TransportError,
};

const EVENT_CONNECTED: u16 = zmq::SocketEvent::CONNECTED as u16;
const EVENT_CLOSED: u16 = zmq::SocketEvent::CLOSED as u16;

/// Transport opening ZeroMQ `PUB` sockets from a shared context.
#[derive(Clone)]
pub struct ZmqTransport {
    context: zmq::Context,
}

impl ZmqTransport {
    /// Create a transport with its own ZeroMQ context.
    pub fn new() -> Self {
        Self::with_context(zmq::Context::new())
    }

    /// Create a transport sharing an existing context.
    ///
    /// Monitor endpoints are `inproc://`, so the context must outlive every
    /// socket opened through this transport.
    pub fn with_context(context: zmq::Context) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &zmq::Context {
        &self.context
    }
}

impl Default for ZmqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ZmqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZmqTransport").finish_non_exhaustive()
    }
}

/// `inproc://` endpoint the monitor for `generation` is published on.
pub fn monitor_endpoint(generation: Generation) -> String {
    format!("inproc://zmqlog-monitor-{generation}.rep")
}

impl Transport for ZmqTransport {
    fn open(&self, address: &str, generation: Generation) -> Result<Connection, TransportError> {
        let socket = self.context.socket(zmq::PUB)?;
        let endpoint = monitor_endpoint(generation);
        // Monitor before connecting so the first CONNECTED event is observed.
        socket.monitor(&endpoint, zmq::SocketEvent::ALL as i32)?;
        let monitor = self.context.socket(zmq::PAIR)?;
        monitor.set_linger(0)?;
        monitor.connect(&endpoint)?;
        if let Err(err) = socket.connect(address) {
            let _ = socket.set_linger(0);
            return Err(err.into());
        }
        Ok(Connection {
            publisher: Box::new(ZmqPublisher { socket }),
            events: Box::new(ZmqEventSource { socket: monitor }),
        })
    }
}

struct ZmqPublisher {
    socket: zmq::Socket,
}

impl Publisher for ZmqPublisher {
    fn send_frames(&mut self, frames: &[&[u8]]) -> Result<(), TransportError> {
        self.socket
            .send_multipart(frames.iter().copied(), zmq::DONTWAIT)
            .map_err(TransportError::from)
    }

    fn set_linger(&mut self, linger: Duration) -> Result<(), TransportError> {
        let millis = i32::try_from(linger.as_millis()).unwrap_or(i32::MAX);
        self.socket.set_linger(millis).map_err(TransportError::from)
    }

    fn close(self: Box<Self>) -> Result<(), TransportError> {
        // zmq_close runs on drop; it cannot fail once linger is configured.
        drop(self);
        Ok(())
    }
}

struct ZmqEventSource {
    socket: zmq::Socket,
}

impl EventSource for ZmqEventSource {
    fn next_event(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ConnectionEvent>, TransportError> {
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        let mut items = [self.socket.as_poll_item(zmq::POLLIN)];
        match zmq::poll(&mut items, timeout_ms) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(zmq::Error::EINTR) => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        if !items[0].is_readable() {
            return Ok(None);
        }
        let frames = self.socket.recv_multipart(zmq::DONTWAIT)?;
        parse_event(&frames).map(Some)
    }
}

/// Decode a monitor message: the first frame starts with the native-endian
/// `u16` event code followed by a `u32` value; the second frame carries the
/// affected endpoint.
pub(crate) fn parse_event(frames: &[Vec<u8>]) -> Result<ConnectionEvent, TransportError> {
    let first = frames
        .first()
        .ok_or_else(|| TransportError::MalformedEvent("empty monitor message".into()))?;
    let code: [u8; 2] = first
        .get(..2)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| {
            TransportError::MalformedEvent(format!("event frame of {} bytes", first.len()))
        })?;
    Ok(classify_event(u16::from_ne_bytes(code)))
}

/// Map a raw ZeroMQ monitor event code onto a [`ConnectionEvent`].
pub fn classify_event(code: u16) -> ConnectionEvent {
    match code {
        EVENT_CONNECTED => ConnectionEvent::Connected,
        EVENT_CLOSED => ConnectionEvent::Closed,
        other => ConnectionEvent::Other(other),
    }
}
