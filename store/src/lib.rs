//! Document storage for datt.
//!
//! Backends (LMDB, in-memory for testing) implement [`DocumentStore`]; the
//! rest of the codebase depends only on the trait. The store knows nothing
//! about what a document means beyond its id and its millisecond timestamp.

pub mod document;
pub mod error;

pub use document::{Document, StoreInfo};
pub use error::StoreError;

use datt_types::Timestamp;

/// A JSON document store with lookup by id and by time.
///
/// Implementations must be safe to share between threads. Calls may block;
/// async callers should go through `spawn_blocking`.
pub trait DocumentStore: Send + Sync {
    /// Insert a new document. Fails with [`StoreError::Duplicate`] if the id exists.
    fn put(&self, doc: &Document) -> Result<(), StoreError>;

    fn get(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// Documents with `start <= time < end`, ordered by time then id.
    fn find_by_time(&self, start: Timestamp, end: Timestamp) -> Result<Vec<Document>, StoreError>;

    /// Every document, ordered by id.
    fn all_docs(&self) -> Result<Vec<Document>, StoreError>;

    fn info(&self) -> Result<StoreInfo, StoreError>;

    /// Delete every document and the backing storage. Later calls fail with
    /// [`StoreError::Destroyed`].
    fn destroy(&self) -> Result<(), StoreError>;
}
