//! Test doubles shared by unit and integration tests.
//!
//! Compiled for unit tests and, behind the `test-util` feature, for the
//! integration tests under `tests/`.

mod fake_resolver;
mod fake_transport;
mod scripted_events;

pub use fake_resolver::FakeResolver;
pub use fake_transport::{FakeSocket, FakeTransport, SocketLog};
pub use scripted_events::{EventFeed, ScriptedEvents, scripted_events};
