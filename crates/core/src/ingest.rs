use crate::extractor::{discover_source_files, load_source, new_document_id};
use crate::store::SharedStore;
use crate::{
    build_chunks, Chunk, ChunkMetadata, ChunkingConfig, DocumentRecord, IngestError,
    IngestionOptions, IngestionReport, MetadataFilter, ReingestPolicy, SourceMetadata, StoreError,
    StoreRecord,
};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Turns raw document text into chunks and writes them to the store in one
/// batch.
#[derive(Clone)]
pub struct IngestionPipeline {
    store: SharedStore,
    options: IngestionOptions,
    /// Held across the existence check, delete and add, so two writers of the
    /// same document id cannot both see it as absent.
    write_lock: Arc<Mutex<()>>,
}

pub struct SkippedSource {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of ingesting a whole folder.
pub struct FolderIngestion {
    pub ingested: Vec<IngestionReport>,
    pub skipped: Vec<SkippedSource>,
}

impl IngestionPipeline {
    pub fn new(store: SharedStore, options: IngestionOptions) -> Self {
        Self {
            store,
            options,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn options(&self) -> &IngestionOptions {
        &self.options
    }

    pub fn with_options(mut self, options: IngestionOptions) -> Self {
        self.options = options;
        self
    }

    /// Chunks `raw_text` and indexes every chunk under `document_id`.
    ///
    /// A store that cannot be reached does not fail the call: the report comes
    /// back with `indexed == false` and a warning, and nothing is retried.
    pub async fn ingest(
        &self,
        document_id: &str,
        title: &str,
        description: &str,
        raw_text: &str,
        source: SourceMetadata,
    ) -> Result<IngestionReport, IngestError> {
        if document_id.trim().is_empty() {
            return Err(IngestError::InvalidArgument(
                "document id must not be empty".to_string(),
            ));
        }
        if raw_text.trim().is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "document {document_id} has no text"
            )));
        }

        let config = ChunkingConfig::from(&self.options);
        let chunks = build_chunks(document_id, raw_text, config)?;

        let document = DocumentRecord {
            document_id: document_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            original_filename: source.original_filename,
            original_length: raw_text.chars().count(),
            file_size: source.file_size,
            pages_count: source.pages_count,
            checksum: source.checksum,
            created_at: source.upload_time.unwrap_or_else(Utc::now),
        };

        let written = self.write(&document, &chunks).await;
        match written {
            Ok(()) => {
                info!(
                    document_id,
                    chunks = chunks.len(),
                    collection = self.store.collection_name(),
                    "document indexed"
                );
                Ok(IngestionReport {
                    document,
                    chunk_count: chunks.len(),
                    indexed: true,
                    warning: None,
                })
            }
            Err(WriteFailure::Exists) => Err(IngestError::DocumentExists(document_id.to_string())),
            Err(WriteFailure::Store(error)) => {
                warn!(document_id, %error, "document chunked but not indexed");
                Ok(IngestionReport {
                    document,
                    chunk_count: chunks.len(),
                    indexed: false,
                    warning: Some(format!("chunks were not added to the vector store: {error}")),
                })
            }
        }
    }

    /// Applies the re-ingest policy, then adds every chunk in one call.
    async fn write(&self, document: &DocumentRecord, chunks: &[Chunk]) -> Result<(), WriteFailure> {
        let document_id = document.document_id.as_str();
        let records = chunks
            .iter()
            .map(|chunk| -> Result<StoreRecord, StoreError> {
                Ok(StoreRecord {
                    id: chunk.chunk_id.clone(),
                    content: chunk.content.clone(),
                    metadata: ChunkMetadata::for_chunk(chunk, document).into_wire()?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let _writing = self.write_lock.lock().await;
        let filter = MetadataFilter::document(document_id);
        let existing: Vec<String> = self
            .store
            .get(Some(&filter), None)
            .await?
            .into_iter()
            .map(|record| record.id)
            .collect();

        if !existing.is_empty() {
            match self.options.reingest_policy {
                ReingestPolicy::Reject => return Err(WriteFailure::Exists),
                ReingestPolicy::Replace => {
                    info!(document_id, stale = existing.len(), "replacing existing chunks");
                    self.store.delete(&existing).await?;
                }
            }
        }

        self.store.add(&records).await?;
        Ok(())
    }

    /// Loads, chunks and indexes one file, assigning a fresh document id.
    pub async fn ingest_file(
        &self,
        path: &Path,
        title: Option<&str>,
        description: &str,
    ) -> Result<IngestionReport, IngestError> {
        self.ingest_file_as(&new_document_id(), path, title, description)
            .await
    }

    pub async fn ingest_file_as(
        &self,
        document_id: &str,
        path: &Path,
        title: Option<&str>,
        description: &str,
    ) -> Result<IngestionReport, IngestError> {
        let source = load_source(path)?;
        let title = title
            .map(str::to_string)
            .unwrap_or_else(|| default_title(&source.metadata.original_filename));

        self.ingest(document_id, &title, description, &source.text, source.metadata)
            .await
    }

    /// Ingests every supported file under `folder`; files that fail are
    /// reported as skipped rather than aborting the run.
    pub async fn ingest_folder(&self, folder: &Path) -> Result<FolderIngestion, IngestError> {
        let files = discover_source_files(folder);
        if files.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "no ingestible files found in {}",
                folder.display()
            )));
        }

        let mut ingested = Vec::new();
        let mut skipped = Vec::new();
        for path in files {
            match self.ingest_file(&path, None, "").await {
                Ok(report) => ingested.push(report),
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping source");
                    skipped.push(SkippedSource {
                        path,
                        reason: error.to_string(),
                    });
                }
            }
        }

        Ok(FolderIngestion { ingested, skipped })
    }
}

enum WriteFailure {
    Exists,
    Store(StoreError),
}

impl From<StoreError> for WriteFailure {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

fn default_title(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
        .to_string()
}
