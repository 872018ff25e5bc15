//! Read-only views over what the collection holds.

use crate::store::SharedStore;
use crate::{
    ChunkMetadata, DocumentSummary, MetadataFilter, StoreError, StoreRecord, StoreStats,
};
use std::collections::BTreeMap;
use tracing::warn;

/// A stored chunk with its metadata parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl TryFrom<StoreRecord> for StoredChunk {
    type Error = StoreError;

    fn try_from(record: StoreRecord) -> Result<Self, Self::Error> {
        let metadata = record.chunk_metadata()?;
        Ok(Self {
            id: record.id,
            content: record.content,
            metadata,
        })
    }
}

#[derive(Clone)]
pub struct Catalog {
    store: SharedStore,
}

fn parse(records: Vec<StoreRecord>) -> Result<Vec<StoredChunk>, StoreError> {
    records.into_iter().map(StoredChunk::try_from).collect()
}

impl Catalog {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn list_chunks(&self, limit: Option<usize>) -> Result<Vec<StoredChunk>, StoreError> {
        parse(self.store.get(None, limit).await?)
    }

    /// All chunks of one document in sequence order.
    pub async fn document_chunks(&self, document_id: &str) -> Result<Vec<StoredChunk>, StoreError> {
        let filter = MetadataFilter::document(document_id);
        let mut chunks = parse(self.store.get(Some(&filter), None).await?)?;
        chunks.sort_by_key(|chunk| chunk.metadata.sequence_index);
        Ok(chunks)
    }

    pub async fn chunks_by_title(&self, title: &str) -> Result<Vec<StoredChunk>, StoreError> {
        let filter = MetadataFilter::title(title);
        let mut chunks = parse(self.store.get(Some(&filter), None).await?)?;
        chunks.sort_by(|left, right| {
            (&left.metadata.document_id, left.metadata.sequence_index)
                .cmp(&(&right.metadata.document_id, right.metadata.sequence_index))
        });
        Ok(chunks)
    }

    pub async fn chunk_by_id(&self, chunk_id: &str) -> Result<Option<StoredChunk>, StoreError> {
        let records = self.store.get_by_ids(&[chunk_id.to_string()]).await?;
        records.into_iter().next().map(StoredChunk::try_from).transpose()
    }

    pub async fn filter_chunks(
        &self,
        filter: &MetadataFilter,
        limit: Option<usize>,
    ) -> Result<Vec<StoredChunk>, StoreError> {
        parse(self.store.get(Some(filter), limit).await?)
    }

    /// One entry per document, newest upload first. Records without chunk
    /// metadata are left out.
    pub async fn document_summaries(&self) -> Result<Vec<DocumentSummary>, StoreError> {
        let records = self.store.get(None, None).await?;

        let mut documents: BTreeMap<String, DocumentSummary> = BTreeMap::new();
        for record in records {
            let meta = match record.chunk_metadata() {
                Ok(meta) => meta,
                Err(error) => {
                    warn!(id = %record.id, %error, "skipping record with unreadable metadata");
                    continue;
                }
            };
            let summary = documents
                .entry(meta.document_id.clone())
                .or_insert_with(|| DocumentSummary {
                    document_id: meta.document_id.clone(),
                    title: meta.title.clone(),
                    filename: meta.filename.clone(),
                    upload_time: meta.upload_time.clone(),
                    file_size: meta.file_size,
                    pages_count: meta.pages_count,
                    chunks_count: 0,
                    total_chunk_length: 0,
                });
            summary.chunks_count += 1;
            summary.total_chunk_length += meta.chunk_length;
        }

        let mut summaries: Vec<DocumentSummary> = documents.into_values().collect();
        // RFC 3339 timestamps in UTC sort chronologically as strings.
        summaries.sort_by(|left, right| right.upload_time.cmp(&left.upload_time));
        Ok(summaries)
    }

    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            collection_name: self.store.collection_name().to_string(),
            total_chunks: self.store.count().await?,
        })
    }
}
