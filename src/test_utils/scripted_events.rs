//! Event source fed from the test thread.

use std::{thread, time::Duration};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::publisher::{ConnectionEvent, EventSource, TransportError};

#[derive(Debug)]
enum Scripted {
    Event(ConnectionEvent),
    Fail,
}

/// Producer side of a [`ScriptedEvents`] source.
#[derive(Clone, Debug)]
pub struct EventFeed {
    tx: Sender<Scripted>,
}

impl EventFeed {
    pub fn push(&self, event: ConnectionEvent) {
        let _ = self.tx.send(Scripted::Event(event));
    }

    /// Queue `count` closed events.
    pub fn closed(&self, count: u32) {
        for _ in 0..count {
            self.push(ConnectionEvent::Closed);
        }
    }

    pub fn connected(&self) {
        self.push(ConnectionEvent::Connected);
    }

    /// Queue a read failure.
    pub fn fail(&self) {
        let _ = self.tx.send(Scripted::Fail);
    }

    /// Items queued but not yet consumed by the source.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

/// [`EventSource`] replaying whatever its [`EventFeed`] pushes.
///
/// Once every feed is dropped the source behaves like an idle socket.
#[derive(Debug)]
pub struct ScriptedEvents {
    rx: Receiver<Scripted>,
}

/// Create a connected feed/source pair.
pub fn scripted_events() -> (EventFeed, ScriptedEvents) {
    let (tx, rx) = unbounded();
    (EventFeed { tx }, ScriptedEvents { rx })
}

impl EventSource for ScriptedEvents {
    fn next_event(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<ConnectionEvent>, TransportError> {
        match self.rx.recv_timeout(timeout) {
            Ok(Scripted::Event(event)) => Ok(Some(event)),
            Ok(Scripted::Fail) => Err(TransportError::Other("scripted event failure".into())),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(timeout);
                Ok(None)
            }
        }
    }
}
