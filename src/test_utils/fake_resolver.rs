//! Resolver double returning preset addresses.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::discovery::AddressResolver;

/// Returns the configured addresses in order, repeating the last one.
#[derive(Debug)]
pub struct FakeResolver {
    addresses: Vec<String>,
    calls: AtomicUsize,
}

impl FakeResolver {
    /// Always resolve to `address`.
    pub fn fixed(address: impl Into<String>) -> Self {
        Self::sequence([address.into()])
    }

    /// Resolve to each address in turn.
    pub fn sequence<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AddressResolver for FakeResolver {
    fn resolve(&self, _service_id: &str) -> String {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.addresses
            .get(call)
            .or_else(|| self.addresses.last())
            .cloned()
            .unwrap_or_default()
    }
}
