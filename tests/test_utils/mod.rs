pub mod loopback;

pub use loopback::{Subscriber, subscriber};
