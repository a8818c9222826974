//! The live connections of one transport.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::Connection;

/// Connections in the order they were established.
///
/// The lock is only ever held for a push, a retain or a clone, never across
/// an await, so readers see the set either before or after a change.
#[derive(Debug, Default)]
pub struct ConnectionSet {
    inner: RwLock<Vec<Arc<Connection>>>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, conn: Arc<Connection>) {
        self.write().push(conn);
    }

    /// Remove by id. Returns whether it was present.
    pub fn remove(&self, id: u64) -> bool {
        let mut set = self.write();
        let before = set.len();
        set.retain(|c| c.id() != id);
        set.len() != before
    }

    /// Point-in-time copy, oldest first.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every connection out of the set.
    pub fn drain(&self) -> Vec<Arc<Connection>> {
        std::mem::take(&mut *self.write())
    }

    // A panic while holding the lock cannot leave the Vec half-updated.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<Connection>>> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<Connection>>> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }
}
