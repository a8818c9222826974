//! LMDB implementation of `DocumentStore`.
//!
//! Two databases:
//! - `docs`: document id (UTF-8) → JSON-encoded `Document`.
//! - `docs_by_time`: `time_be_u64(8) ++ id` → empty. Big-endian sorts by time,
//!   so a time window is one range scan.

use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use datt_store::{Document, DocumentStore, StoreError, StoreInfo};
use datt_types::Timestamp;
use heed::types::Bytes;
use heed::Database;
use tracing::info;

use crate::environment::DEFAULT_MAP_SIZE;
use crate::{LmdbEnvironment, LmdbError};

const MAX_DBS: u32 = 4;

pub struct LmdbDocumentStore {
    environment: LmdbEnvironment,
    docs_db: Database<Bytes, Bytes>,
    time_db: Database<Bytes, Bytes>,
    destroyed: AtomicBool,
}

fn time_key(time: Timestamp, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(8 + id.len());
    key.extend_from_slice(&time.as_millis().to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

fn decode(bytes: &[u8]) -> Result<Document, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| LmdbError::Serialization(e.to_string()).into())
}

impl LmdbDocumentStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size(path: &Path, map_size: usize) -> Result<Self, StoreError> {
        let environment = LmdbEnvironment::open(path, MAX_DBS, map_size)?;
        let env = environment.env();
        let mut wtxn = env.write_txn().map_err(LmdbError::from)?;
        let docs_db = env
            .create_database(&mut wtxn, Some("docs"))
            .map_err(LmdbError::from)?;
        let time_db = env
            .create_database(&mut wtxn, Some("docs_by_time"))
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        Ok(Self {
            environment,
            docs_db,
            time_db,
            destroyed: AtomicBool::new(false),
        })
    }

    fn guard(&self) -> Result<(), StoreError> {
        if self.destroyed.load(Ordering::Acquire) {
            Err(StoreError::Destroyed)
        } else {
            Ok(())
        }
    }
}

impl DocumentStore for LmdbDocumentStore {
    fn put(&self, doc: &Document) -> Result<(), StoreError> {
        self.guard()?;
        let bytes =
            serde_json::to_vec(doc).map_err(|e| LmdbError::Serialization(e.to_string()))?;

        let env = self.environment.env();
        let mut wtxn = env.write_txn().map_err(LmdbError::from)?;
        if self
            .docs_db
            .get(&wtxn, doc.id.as_bytes())
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(doc.id.clone()));
        }
        self.docs_db
            .put(&mut wtxn, doc.id.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        self.time_db
            .put(&mut wtxn, &time_key(doc.time, &doc.id), &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.guard()?;
        let rtxn = self.environment.env().read_txn().map_err(LmdbError::from)?;
        match self.docs_db.get(&rtxn, id.as_bytes()).map_err(LmdbError::from)? {
            Some(bytes) => decode(bytes).map(Some),
            None => Ok(None),
        }
    }

    fn find_by_time(&self, start: Timestamp, end: Timestamp) -> Result<Vec<Document>, StoreError> {
        self.guard()?;
        if start >= end {
            return Ok(Vec::new());
        }
        let rtxn = self.environment.env().read_txn().map_err(LmdbError::from)?;
        let lower = start.as_millis().to_be_bytes();
        let upper = end.as_millis().to_be_bytes();
        let bounds = (
            Bound::Included(lower.as_slice()),
            Bound::Excluded(upper.as_slice()),
        );

        let iter = self.time_db.range(&rtxn, &bounds).map_err(LmdbError::from)?;
        let mut docs = Vec::new();
        for entry in iter {
            let (key, _) = entry.map_err(LmdbError::from)?;
            let id = key.get(8..).unwrap_or_default();
            let bytes = self
                .docs_db
                .get(&rtxn, id)
                .map_err(LmdbError::from)?
                .ok_or_else(|| {
                    StoreError::Corruption(format!(
                        "time index points at missing document {}",
                        String::from_utf8_lossy(id)
                    ))
                })?;
            docs.push(decode(bytes)?);
        }
        Ok(docs)
    }

    fn all_docs(&self) -> Result<Vec<Document>, StoreError> {
        self.guard()?;
        let rtxn = self.environment.env().read_txn().map_err(LmdbError::from)?;
        let iter = self.docs_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut docs = Vec::new();
        for entry in iter {
            let (_, bytes) = entry.map_err(LmdbError::from)?;
            docs.push(decode(bytes)?);
        }
        Ok(docs)
    }

    fn info(&self) -> Result<StoreInfo, StoreError> {
        self.guard()?;
        let rtxn = self.environment.env().read_txn().map_err(LmdbError::from)?;
        let doc_count = self.docs_db.len(&rtxn).map_err(LmdbError::from)?;
        let name = self
            .environment
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(StoreInfo { name, doc_count })
    }

    fn destroy(&self) -> Result<(), StoreError> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let env = self.environment.env();
        let mut wtxn = env.write_txn().map_err(LmdbError::from)?;
        self.docs_db.clear(&mut wtxn).map_err(LmdbError::from)?;
        self.time_db.clear(&mut wtxn).map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;

        match std::fs::remove_dir_all(self.environment.path()) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(LmdbError::Io(e).into()),
        }
        info!(path = %self.environment.path().display(), "document store destroyed");
        Ok(())
    }
}
