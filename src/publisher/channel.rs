//! The current publish socket of a session.

use std::time::Duration;

use super::transport::{EventSource, Generation, Publisher, Transport, TransportError};

/// One live publish socket bound to a monitor generation.
///
/// A channel is never mutated in place on reconnect: the session closes it
/// and installs a freshly opened one.
pub struct PublishChannel {
    publisher: Box<dyn Publisher>,
    address: String,
    generation: Generation,
}

impl PublishChannel {
    /// Open a publisher connected to `address` under a fresh generation.
    ///
    /// Returns the channel together with the event source its monitor must
    /// watch.
    pub fn open(
        transport: &dyn Transport,
        address: &str,
    ) -> Result<(Self, Box<dyn EventSource>), TransportError> {
        let generation = Generation::fresh();
        let connection = transport.open(address, generation)?;
        let channel = Self {
            publisher: connection.publisher,
            address: address.to_owned(),
            generation,
        };
        Ok((channel, connection.events))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Send routing frames followed by the payload frame.
    pub fn send(&mut self, routing: &[&[u8]], payload: &[u8]) -> Result<(), TransportError> {
        let mut frames = Vec::with_capacity(routing.len() + 1);
        frames.extend_from_slice(routing);
        frames.push(payload);
        self.publisher.send_frames(&frames)
    }

    /// Apply `linger` and release the socket.
    ///
    /// A linger failure is reported but the socket is still released.
    pub fn close(mut self, linger: Duration) -> Result<(), TransportError> {
        let linger_result = self.publisher.set_linger(linger);
        let close_result = self.publisher.close();
        linger_result.and(close_result)
    }
}

impl std::fmt::Debug for PublishChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishChannel")
            .field("address", &self.address)
            .field("generation", &self.generation)
            .finish()
    }
}
