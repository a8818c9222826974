//! Persistence of content auths in a document store.
//!
//! Documents are keyed by the lowercase hex of [`ContentAuth::id`] and
//! indexed by the time the content auth was archived. Store calls block, so
//! every one runs on the blocking pool.

use std::sync::Arc;

use datt_content::{ContentAuth, ContentAuthError};
use datt_store::{Document, DocumentStore, StoreError, StoreInfo};
use datt_types::Timestamp;
use tracing::debug;

use crate::PeersError;

/// A content auth together with its archive metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchivedContent {
    pub id: String,
    pub archived_at: Timestamp,
    pub content_auth: ContentAuth,
}

#[derive(Clone)]
pub struct ContentArchive {
    store: Arc<dyn DocumentStore>,
}

pub fn archive_id(content_auth: &ContentAuth) -> Result<String, ContentAuthError> {
    Ok(hex::encode(content_auth.id()?))
}

fn to_document(content_auth: &ContentAuth, at: Timestamp) -> Result<Document, StoreError> {
    let id = archive_id(content_auth).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let body =
        serde_json::to_value(content_auth).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(Document::new(id, at, body))
}

fn from_document(doc: Document) -> Result<ArchivedContent, StoreError> {
    let content_auth = serde_json::from_value(doc.body)
        .map_err(|e| StoreError::Serialization(format!("document {}: {e}", doc.id)))?;
    Ok(ArchivedContent {
        id: doc.id,
        archived_at: doc.time,
        content_auth,
    })
}

impl ContentArchive {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, PeersError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn DocumentStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| StoreError::Backend(format!("store task failed: {e}")))?;
        Ok(result?)
    }

    /// Archive `content_auth` at time `at`. Returns `false` if it was already
    /// archived; the first copy is kept.
    pub async fn record(&self, content_auth: &ContentAuth, at: Timestamp) -> Result<bool, PeersError> {
        let doc = to_document(content_auth, at)?;
        let id = doc.id.clone();
        let stored = self
            .blocking(move |store| match store.put(&doc) {
                Ok(()) => Ok(true),
                Err(StoreError::Duplicate(_)) => Ok(false),
                Err(e) => Err(e),
            })
            .await?;
        debug!(%id, stored, "content auth archived");
        Ok(stored)
    }

    pub async fn get(&self, id: &str) -> Result<Option<ArchivedContent>, PeersError> {
        let id = id.to_string();
        self.blocking(move |store| store.get(&id)?.map(from_document).transpose())
            .await
    }

    /// Content auths archived in `[start, end)`, oldest first.
    pub async fn between(
        &self,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<ArchivedContent>, PeersError> {
        self.blocking(move |store| {
            store
                .find_by_time(start, end)?
                .into_iter()
                .map(from_document)
                .collect()
        })
        .await
    }

    pub async fn info(&self) -> Result<StoreInfo, PeersError> {
        self.blocking(|store| store.info()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datt_content::{Content, UnsignedContentAuth};
    use datt_crypto::{derive_address, keypair_from_seed};
    use datt_nullables::{NullClock, NullDocumentStore};
    use datt_types::BlockHash;

    fn signed(title: &str, seed: u8) -> ContentAuth {
        let keypair = keypair_from_seed(&[seed; 32]);
        UnsignedContentAuth::new(
            Content::new(title, "body"),
            BlockHash::from_bytes([seed; 32]),
            376_949,
            derive_address(&keypair.public),
        )
        .sign(&keypair)
        .unwrap()
    }

    #[tokio::test]
    async fn record_get_and_window() {
        let clock = NullClock::new(1_000);
        let archive = ContentArchive::new(Arc::new(NullDocumentStore::default()));
        let first = signed("first", 1);
        let second = signed("second", 2);

        assert!(archive.record(&first, clock.tick(100)).await.unwrap());
        assert!(archive.record(&second, clock.tick(100)).await.unwrap());
        assert!(!archive.record(&first, clock.now()).await.unwrap());

        let got = archive.get(&archive_id(&first).unwrap()).await.unwrap().unwrap();
        assert_eq!(got.content_auth, first);
        assert_eq!(got.archived_at.as_millis(), 1_000);
        assert!(got.content_auth.verify().unwrap());

        let window = archive
            .between(Timestamp::from_millis(1_050), Timestamp::from_millis(2_000))
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].content_auth.title(), "second");
        assert_eq!(archive.info().await.unwrap().doc_count, 2);
    }

    #[tokio::test]
    async fn missing_id_is_none() {
        let archive = ContentArchive::new(Arc::new(NullDocumentStore::default()));
        assert!(archive.get("00").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn foreign_documents_are_serialization_errors() {
        let store = Arc::new(NullDocumentStore::default());
        store
            .put(&Document::new("junk", Timestamp::EPOCH, serde_json::json!({"x": 1})))
            .unwrap();
        let archive = ContentArchive::new(store);
        assert!(matches!(
            archive.get("junk").await,
            Err(PeersError::Store(StoreError::Serialization(_)))
        ));
    }
}
