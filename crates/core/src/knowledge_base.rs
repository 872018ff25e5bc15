use crate::catalog::Catalog;
use crate::ingest::{FolderIngestion, IngestionPipeline};
use crate::lifecycle::LifecycleManager;
use crate::orchestrator::RetrievalEngine;
use crate::store::SharedStore;
use crate::traits::VectorStoreGateway;
use crate::{
    ClearReport, DeleteReport, EngineConfig, IngestError, IngestionReport, LifecycleError,
    ResetReport, SearchError, SearchReport, SourceMetadata,
};
use std::path::Path;
use std::sync::Arc;

/// Wires ingestion, retrieval, administration and the catalog to one shared
/// store handle.
pub struct KnowledgeBase {
    config: EngineConfig,
    store: SharedStore,
    pipeline: IngestionPipeline,
    engine: RetrievalEngine,
    lifecycle: LifecycleManager,
    catalog: Catalog,
}

impl KnowledgeBase {
    pub fn new(gateway: Arc<dyn VectorStoreGateway>, config: EngineConfig) -> Self {
        let store = SharedStore::new(gateway, config.store_timeout);
        Self {
            pipeline: IngestionPipeline::new(store.clone(), config.ingestion.clone()),
            engine: RetrievalEngine::new(store.clone(), &config),
            lifecycle: LifecycleManager::new(store.clone()),
            catalog: Catalog::new(store.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }

    pub fn engine(&self) -> &RetrievalEngine {
        &self.engine
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub async fn ingest(
        &self,
        document_id: &str,
        title: &str,
        description: &str,
        raw_text: &str,
        source: SourceMetadata,
    ) -> Result<IngestionReport, IngestError> {
        self.pipeline
            .ingest(document_id, title, description, raw_text, source)
            .await
    }

    pub async fn ingest_file(
        &self,
        path: &Path,
        title: Option<&str>,
        description: &str,
    ) -> Result<IngestionReport, IngestError> {
        self.pipeline.ingest_file(path, title, description).await
    }

    pub async fn ingest_folder(&self, folder: &Path) -> Result<FolderIngestion, IngestError> {
        self.pipeline.ingest_folder(folder).await
    }

    /// Searches with the configured default result count when `k` is `None`.
    pub async fn search(
        &self,
        query: &str,
        k: Option<usize>,
        document_ids: Option<&[String]>,
    ) -> Result<SearchReport, SearchError> {
        let k = k.unwrap_or(self.config.default_top_k);
        self.engine.search(query, k, document_ids).await
    }

    pub async fn search_in_documents(
        &self,
        query: &str,
        document_ids: &[String],
        k: Option<usize>,
    ) -> Result<SearchReport, SearchError> {
        let k = k.unwrap_or(self.config.default_top_k);
        self.engine.search_in_documents(query, document_ids, k).await
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<DeleteReport, LifecycleError> {
        self.lifecycle.delete_document(document_id).await
    }

    pub async fn clear_all(&self) -> Result<ClearReport, LifecycleError> {
        self.lifecycle.clear_all().await
    }

    pub async fn reset(&self, confirmed: bool) -> Result<ResetReport, LifecycleError> {
        self.lifecycle.reset(confirmed).await
    }
}
