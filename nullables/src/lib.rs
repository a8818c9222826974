//! Nullable infrastructure for deterministic testing.
//!
//! Each nullable stands in for one external dependency and can be steered
//! from the test:
//! - [`NullClock`]: time only moves when told to.
//! - [`NullNetwork`]: a transport with detached connections whose sent
//!   frames are recorded and which can be broken on demand.
//! - [`NullDocumentStore`]: an in-memory document store.
//!
//! None of them touch the filesystem or the network.

pub mod clock;
pub mod network;
pub mod store;

pub use clock::NullClock;
pub use network::NullNetwork;
pub use store::NullDocumentStore;

use std::sync::{Mutex, MutexGuard};

/// Lock, recovering the data if a panicking test poisoned it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
