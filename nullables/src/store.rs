//! Nullable document store: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use datt_store::{Document, DocumentStore, StoreError, StoreInfo};
use datt_types::Timestamp;

use crate::lock;

#[derive(Default)]
struct Inner {
    docs: BTreeMap<String, Document>,
    by_time: BTreeSet<(Timestamp, String)>,
    destroyed: bool,
}

/// In-memory [`DocumentStore`] with the same ordering rules as the LMDB one.
pub struct NullDocumentStore {
    name: String,
    inner: Mutex<Inner>,
}

impl NullDocumentStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for NullDocumentStore {
    fn default() -> Self {
        Self::new("null")
    }
}

impl DocumentStore for NullDocumentStore {
    fn put(&self, doc: &Document) -> Result<(), StoreError> {
        let mut inner = lock(&self.inner);
        if inner.destroyed {
            return Err(StoreError::Destroyed);
        }
        if inner.docs.contains_key(&doc.id) {
            return Err(StoreError::Duplicate(doc.id.clone()));
        }
        inner.by_time.insert((doc.time, doc.id.clone()));
        inner.docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let inner = lock(&self.inner);
        if inner.destroyed {
            return Err(StoreError::Destroyed);
        }
        Ok(inner.docs.get(id).cloned())
    }

    fn find_by_time(&self, start: Timestamp, end: Timestamp) -> Result<Vec<Document>, StoreError> {
        let inner = lock(&self.inner);
        if inner.destroyed {
            return Err(StoreError::Destroyed);
        }
        Ok(inner
            .by_time
            .iter()
            .filter(|(time, _)| *time >= start && *time < end)
            .filter_map(|(_, id)| inner.docs.get(id).cloned())
            .collect())
    }

    fn all_docs(&self) -> Result<Vec<Document>, StoreError> {
        let inner = lock(&self.inner);
        if inner.destroyed {
            return Err(StoreError::Destroyed);
        }
        Ok(inner.docs.values().cloned().collect())
    }

    fn info(&self) -> Result<StoreInfo, StoreError> {
        let inner = lock(&self.inner);
        if inner.destroyed {
            return Err(StoreError::Destroyed);
        }
        Ok(StoreInfo {
            name: self.name.clone(),
            doc_count: inner.docs.len() as u64,
        })
    }

    fn destroy(&self) -> Result<(), StoreError> {
        let mut inner = lock(&self.inner);
        inner.docs.clear();
        inner.by_time.clear();
        inner.destroyed = true;
        Ok(())
    }
}
