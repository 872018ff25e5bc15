pub mod catalog;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod filter;
pub mod ingest;
pub mod keywords;
pub mod knowledge_base;
pub mod lexical;
pub mod lifecycle;
pub mod models;
pub mod orchestrator;
pub mod store;
pub mod stores;
pub mod text;
pub mod traits;

pub use catalog::{Catalog, StoredChunk};
pub use chunking::{build_chunks, normalize_whitespace, split_text, ChunkingConfig};
pub use config::{EngineConfig, DEFAULT_COLLECTION_DESCRIPTION, DEFAULT_COLLECTION_NAME};
pub use embeddings::{CharacterNgramEmbedder, Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, LifecycleError, SearchError, StoreError};
pub use extractor::{
    digest_file, discover_source_files, load_source, new_document_id, ExtractedPdf,
    ExtractedSource, LopdfExtractor, PageText, PdfExtractor, MAX_SOURCE_BYTES,
};
pub use filter::MetadataFilter;
pub use ingest::{FolderIngestion, IngestionPipeline, SkippedSource};
pub use keywords::extract_keywords;
pub use knowledge_base::KnowledgeBase;
pub use lexical::{score_lexical, LexicalMatch};
pub use lifecycle::LifecycleManager;
pub use models::{
    Chunk, ChunkMetadata, ClearReport, DeleteReport, DocumentRecord, DocumentSummary,
    IngestionOptions, IngestionReport, LanguageTag, Metadata, ReingestPolicy, ResetReport,
    ResultSource, ScoredRecord, SearchMethod, SearchReport, SearchResult, SourceMetadata,
    StoreRecord, StoreStats, StrategyKind,
};
pub use orchestrator::{RetrievalEngine, SearchStrategy};
pub use store::{ExclusiveStore, SharedStore};
pub use stores::{ChromaStore, MemoryStore};
pub use text::{detect_language, normalize};
pub use traits::VectorStoreGateway;
