use crate::config::DEFAULT_COLLECTION_DESCRIPTION;
use crate::store::SharedStore;
use crate::{
    ClearReport, DeleteReport, LifecycleError, Metadata, MetadataFilter, ResetReport,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use tracing::info;

/// Administrative operations over the collection: per-document deletion,
/// clearing all chunks, and dropping/recreating the collection.
#[derive(Clone)]
pub struct LifecycleManager {
    store: SharedStore,
}

pub fn reset_description(reset_at: DateTime<Utc>) -> String {
    format!(
        "{DEFAULT_COLLECTION_DESCRIPTION} - Reset on {}",
        reset_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

impl LifecycleManager {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// Removes every chunk of one document. Unknown ids delete nothing.
    pub async fn delete_document(&self, document_id: &str) -> Result<DeleteReport, LifecycleError> {
        if document_id.trim().is_empty() {
            return Err(LifecycleError::InvalidArgument(
                "document id must not be empty".to_string(),
            ));
        }

        let filter = MetadataFilter::document(document_id);
        let ids: Vec<String> = self
            .store
            .get(Some(&filter), None)
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();
        self.store.delete(&ids).await?;

        info!(document_id, chunks_deleted = ids.len(), "document deleted");
        Ok(DeleteReport {
            document_id: document_id.to_string(),
            chunks_deleted: ids.len(),
            deleted_at: Utc::now(),
        })
    }

    /// Deletes all chunks but keeps the collection. Runs exclusively.
    pub async fn clear_all(&self) -> Result<ClearReport, LifecycleError> {
        let exclusive = self.store.exclusive().await;
        let ids: Vec<String> = exclusive
            .get(None, None)
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();
        exclusive.delete(&ids).await?;

        info!(
            collection = self.store.collection_name(),
            chunks_cleared = ids.len(),
            "collection cleared"
        );
        Ok(ClearReport {
            collection_name: self.store.collection_name().to_string(),
            chunks_cleared: ids.len(),
            cleared_at: Utc::now(),
        })
    }

    /// Drops and recreates the collection. Refused unless `confirmed`; an
    /// unconfirmed call never touches the store.
    pub async fn reset(&self, confirmed: bool) -> Result<ResetReport, LifecycleError> {
        if !confirmed {
            return Err(LifecycleError::NotConfirmed);
        }

        let exclusive = self.store.exclusive().await;
        let chunks_before_reset = exclusive.count().await?;

        let reset_at = Utc::now();
        let mut metadata = Metadata::new();
        metadata.insert("description".to_string(), json!(reset_description(reset_at)));
        exclusive.recreate(metadata).await?;

        info!(
            collection = self.store.collection_name(),
            chunks_before_reset, "collection reset"
        );
        Ok(ResetReport {
            collection_name: self.store.collection_name().to_string(),
            chunks_before_reset,
            reset_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;
    use crate::traits::VectorStoreGateway;
    use crate::{StoreError, StoreRecord};
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::time::Duration;

    fn record(document_id: &str, sequence_index: usize) -> StoreRecord {
        let mut metadata = Metadata::new();
        metadata.insert("document_id".to_string(), json!(document_id));
        metadata.insert("sequence_index".to_string(), json!(sequence_index));
        StoreRecord {
            id: format!("{document_id}_chunk_{sequence_index}"),
            content: format!("chunk {sequence_index} of {document_id}"),
            metadata,
        }
    }

    async fn seeded() -> (Arc<MemoryStore>, LifecycleManager) {
        let gateway = Arc::new(MemoryStore::default());
        gateway
            .add(&[record("doc1", 0), record("doc1", 1), record("doc2", 0)])
            .await
            .expect("seed");
        let manager = LifecycleManager::new(SharedStore::new(gateway.clone(), Duration::from_secs(1)));
        (gateway, manager)
    }

    #[tokio::test]
    async fn delete_removes_only_that_document() {
        let (gateway, manager) = seeded().await;

        let report = manager.delete_document("doc1").await.expect("delete");
        assert_eq!(report.chunks_deleted, 2);
        assert_eq!(gateway.count().await.expect("count"), 1);

        let report = manager.delete_document("doc1").await.expect("delete again");
        assert_eq!(report.chunks_deleted, 0);
    }

    #[tokio::test]
    async fn clear_all_empties_the_collection() {
        let (gateway, manager) = seeded().await;

        let report = manager.clear_all().await.expect("clear");
        assert_eq!(report.chunks_cleared, 3);
        assert_eq!(report.collection_name, "knowledge_base");
        assert_eq!(gateway.count().await.expect("count"), 0);

        let report = manager.clear_all().await.expect("clear empty");
        assert_eq!(report.chunks_cleared, 0);
    }

    #[tokio::test]
    async fn unconfirmed_reset_changes_nothing() {
        let (gateway, manager) = seeded().await;
        gateway.set_online(false);

        let error = manager.reset(false).await.unwrap_err();
        assert!(matches!(error, LifecycleError::NotConfirmed));

        gateway.set_online(true);
        assert_eq!(gateway.count().await.expect("count"), 3);
    }

    #[tokio::test]
    async fn confirmed_reset_recreates_with_fresh_description() {
        let (gateway, manager) = seeded().await;

        let report = manager.reset(true).await.expect("reset");
        assert_eq!(report.chunks_before_reset, 3);
        assert_eq!(gateway.count().await.expect("count"), 0);

        let metadata = gateway.collection_metadata().await;
        let description = metadata
            .get("description")
            .and_then(|value| value.as_str())
            .expect("description");
        assert_eq!(description, reset_description(report.reset_at));
    }

    #[tokio::test]
    async fn store_failures_surface() {
        let (gateway, manager) = seeded().await;
        gateway.set_online(false);

        assert!(matches!(
            manager.clear_all().await.unwrap_err(),
            LifecycleError::Store(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            manager.delete_document("doc1").await.unwrap_err(),
            LifecycleError::Store(_)
        ));
        assert!(matches!(
            manager.delete_document(" ").await.unwrap_err(),
            LifecycleError::InvalidArgument(_)
        ));
    }

    #[test]
    fn reset_description_names_the_instant() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).single().expect("valid date");
        assert_eq!(
            reset_description(at),
            "PDF document knowledge base with text chunks - Reset on 2024-05-01T08:30:00Z"
        );
    }
}
