//! LMDB backend for `datt-store`, on the `heed` bindings.

pub mod document;
pub mod environment;
pub mod error;

pub use document::LmdbDocumentStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
