use crate::{Metadata, MetadataFilter, ScoredRecord, StoreError, StoreRecord};
use async_trait::async_trait;

/// Narrow contract over an external similarity-search store.
///
/// Implementations own a single named collection. Every operation fails with
/// [`StoreError::Unavailable`] when there is no live connection.
#[async_trait]
pub trait VectorStoreGateway: Send + Sync {
    fn collection_name(&self) -> &str;

    /// Upserts records, replacing any existing id.
    async fn add(&self, records: &[StoreRecord]) -> Result<(), StoreError>;

    /// Up to `k` records ranked by similarity to `text`, best first, scored
    /// `1 - distance`. No match is an empty list, not an error.
    async fn query(
        &self,
        text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>, StoreError>;

    /// Unranked exact-filter lookup.
    async fn get(
        &self,
        filter: Option<&MetadataFilter>,
        limit: Option<usize>,
    ) -> Result<Vec<StoreRecord>, StoreError>;

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoreRecord>, StoreError>;

    /// Idempotent; unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<(), StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;

    /// Drops the collection and creates an empty one with `metadata`.
    async fn recreate(&self, metadata: Metadata) -> Result<(), StoreError>;
}
