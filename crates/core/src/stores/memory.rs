//! In-memory gateway for tests and local runs without a vector database.
//!
//! Similarity is brute-force cosine over the hashing embedder. Records that
//! share no trigram with the query (similarity 0) are not considered matches.

use crate::config::DEFAULT_COLLECTION_NAME;
use crate::embeddings::{cosine_similarity, CharacterNgramEmbedder, Embedder};
use crate::traits::VectorStoreGateway;
use crate::{Metadata, MetadataFilter, ScoredRecord, StoreError, StoreRecord};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

struct Entry {
    record: StoreRecord,
    embedding: Vec<f32>,
}

#[derive(Default)]
struct Collection {
    metadata: Metadata,
    entries: BTreeMap<String, Entry>,
}

pub struct MemoryStore {
    name: String,
    embedder: CharacterNgramEmbedder,
    collection: RwLock<Collection>,
    online: AtomicBool,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            embedder: CharacterNgramEmbedder::default(),
            collection: RwLock::new(Collection::default()),
            online: AtomicBool::new(true),
        }
    }

    /// Simulates losing (or regaining) the connection to the store.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub async fn collection_metadata(&self) -> Metadata {
        self.collection.read().await.metadata.clone()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!(
                "memory collection {} is offline",
                self.name
            )))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_COLLECTION_NAME)
    }
}

fn passes(filter: Option<&MetadataFilter>, metadata: &Metadata) -> bool {
    filter.map_or(true, |filter| filter.matches(metadata))
}

#[async_trait]
impl VectorStoreGateway for MemoryStore {
    fn collection_name(&self) -> &str {
        &self.name
    }

    async fn add(&self, records: &[StoreRecord]) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut collection = self.collection.write().await;
        for record in records {
            let embedding = self.embedder.embed(&record.content);
            collection.entries.insert(
                record.id.clone(),
                Entry {
                    record: record.clone(),
                    embedding,
                },
            );
        }
        debug!(collection = %self.name, added = records.len(), "memory upsert");
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        self.ensure_online()?;
        let query = self.embedder.embed(text);
        let collection = self.collection.read().await;

        let mut scored: Vec<(f32, &StoreRecord)> = collection
            .entries
            .values()
            .filter(|entry| passes(filter, &entry.record.metadata))
            .map(|entry| (cosine_similarity(&query, &entry.embedding), &entry.record))
            .filter(|(similarity, _)| *similarity > 0.0)
            .collect();

        scored.sort_by(|left, right| right.0.total_cmp(&left.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(similarity, record)| ScoredRecord {
                id: record.id.clone(),
                content: record.content.clone(),
                metadata: record.metadata.clone(),
                similarity_score: f64::from(similarity).clamp(0.0, 1.0),
            })
            .collect())
    }

    async fn get(
        &self,
        filter: Option<&MetadataFilter>,
        limit: Option<usize>,
    ) -> Result<Vec<StoreRecord>, StoreError> {
        self.ensure_online()?;
        let collection = self.collection.read().await;
        Ok(collection
            .entries
            .values()
            .filter(|entry| passes(filter, &entry.record.metadata))
            .take(limit.unwrap_or(usize::MAX))
            .map(|entry| entry.record.clone())
            .collect())
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoreRecord>, StoreError> {
        self.ensure_online()?;
        let collection = self.collection.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| collection.entries.get(id))
            .map(|entry| entry.record.clone())
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut collection = self.collection.write().await;
        for id in ids {
            collection.entries.remove(id);
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.ensure_online()?;
        Ok(self.collection.read().await.entries.len())
    }

    async fn recreate(&self, metadata: Metadata) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut collection = self.collection.write().await;
        *collection = Collection {
            metadata,
            entries: BTreeMap::new(),
        };
        debug!(collection = %self.name, "memory collection recreated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, document_id: &str, content: &str) -> StoreRecord {
        let mut metadata = Metadata::new();
        metadata.insert("document_id".to_string(), json!(document_id));
        StoreRecord {
            id: id.to_string(),
            content: content.to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_existing_ids() {
        let store = MemoryStore::default();
        store
            .add(&[record("a", "doc", "first version")])
            .await
            .expect("add");
        store
            .add(&[record("a", "doc", "second version")])
            .await
            .expect("add");

        assert_eq!(store.count().await.expect("count"), 1);
        let fetched = store.get_by_ids(&["a".to_string()]).await.expect("get");
        assert_eq!(fetched[0].content, "second version");
    }

    #[tokio::test]
    async fn query_ranks_and_filters() {
        let store = MemoryStore::default();
        store
            .add(&[
                record("a", "doc-1", "hydraulic pump pressure"),
                record("b", "doc-2", "hydraulic pump failure"),
                record("c", "doc-1", "unrelated zebra text"),
            ])
            .await
            .expect("add");

        let hits = store
            .query("hydraulic pump", 5, Some(&MetadataFilter::document("doc-1")))
            .await
            .expect("query");
        assert_eq!(hits[0].id, "a");
        assert!(hits.iter().all(|hit| hit.id != "b"));
        assert!(hits
            .iter()
            .all(|hit| (0.0..=1.0).contains(&hit.similarity_score)));
    }

    #[tokio::test]
    async fn query_without_matches_is_empty() {
        let store = MemoryStore::default();
        store.add(&[record("a", "doc", "some text")]).await.expect("add");
        let hits = store.query("?!", 5, None).await.expect("query");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::default();
        store.add(&[record("a", "doc", "text")]).await.expect("add");
        store.delete(&["a".to_string(), "missing".to_string()]).await.expect("delete");
        store.delete(&["a".to_string()]).await.expect("delete again");
        assert_eq!(store.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn offline_store_is_unavailable() {
        let store = MemoryStore::default();
        store.set_online(false);
        let error = store.add(&[record("a", "doc", "text")]).await.unwrap_err();
        assert!(matches!(error, StoreError::Unavailable(_)));
        store.set_online(true);
        assert_eq!(store.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn recreate_empties_and_replaces_metadata() {
        let store = MemoryStore::default();
        store.add(&[record("a", "doc", "text")]).await.expect("add");

        let mut metadata = Metadata::new();
        metadata.insert("description".to_string(), json!("fresh"));
        store.recreate(metadata.clone()).await.expect("recreate");

        assert_eq!(store.count().await.expect("count"), 0);
        assert_eq!(store.collection_metadata().await, metadata);
    }
}
