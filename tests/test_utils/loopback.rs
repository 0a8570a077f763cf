//! Loopback `SUB` socket standing in for the log server.

use std::time::{Duration, Instant};

use rstest::fixture;

/// A bound `SUB` socket subscribed to every topic.
pub struct Subscriber {
    // Keeps the context alive for the socket.
    _context: zmq::Context,
    socket: zmq::Socket,
    endpoint: String,
}

impl Subscriber {
    /// `tcp://` endpoint the subscriber is bound to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Call `publish` until a message arrives or `timeout` passes.
    ///
    /// PUB sockets drop messages until the subscription has propagated, so a
    /// single send is not enough.
    #[allow(dead_code)]
    pub fn receive_while(
        &self,
        timeout: Duration,
        mut publish: impl FnMut(),
    ) -> Option<Vec<Vec<u8>>> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            publish();
            match self.socket.recv_multipart(0) {
                Ok(frames) => return Some(frames),
                Err(zmq::Error::EAGAIN) => continue,
                Err(err) => panic!("subscriber receive failed: {err}"),
            }
        }
        None
    }
}

/// A subscriber bound to an ephemeral loopback port.
#[fixture]
pub fn subscriber() -> Subscriber {
    let context = zmq::Context::new();
    let socket = context.socket(zmq::SUB).expect("create SUB socket");
    socket.set_subscribe(b"").expect("subscribe");
    socket.set_rcvtimeo(50).expect("set receive timeout");
    socket.set_linger(0).expect("set linger");
    socket.bind("tcp://127.0.0.1:*").expect("bind SUB socket");
    let endpoint = socket
        .get_last_endpoint()
        .expect("read endpoint")
        .expect("endpoint is utf-8");
    Subscriber {
        _context: context,
        socket,
        endpoint,
    }
}
