use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire form of per-chunk metadata as the vector store keeps it.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

pub const DOCUMENT_ID_FIELD: &str = "document_id";
pub const TITLE_FIELD: &str = "title";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum LanguageTag {
    Vi,
    En,
    Mixed,
    #[default]
    Unknown,
}

impl LanguageTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vi => "vi",
            Self::En => "en",
            Self::Mixed => "mixed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the extraction collaborator knows about the source file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceMetadata {
    pub original_filename: String,
    pub file_size: u64,
    pub pages_count: u32,
    pub upload_time: Option<DateTime<Utc>>,
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub title: String,
    pub description: String,
    pub original_filename: String,
    pub original_length: usize,
    pub file_size: u64,
    pub pages_count: u32,
    pub checksum: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: String,
    pub sequence_index: usize,
    pub content: String,
    pub normalized_content: String,
    pub language: LanguageTag,
    pub content_length: usize,
}

impl Chunk {
    pub fn id_for(document_id: &str, sequence_index: usize) -> String {
        format!("{document_id}_chunk_{sequence_index}")
    }
}

/// Structured view of the metadata stored next to every chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub sequence_index: usize,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub upload_time: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub pages_count: u32,
    #[serde(default)]
    pub original_length: usize,
    #[serde(default)]
    pub chunk_length: usize,
    #[serde(default)]
    pub language: LanguageTag,
    #[serde(default)]
    pub normalized_content: String,
}

impl ChunkMetadata {
    pub fn for_chunk(chunk: &Chunk, document: &DocumentRecord) -> Self {
        Self {
            document_id: chunk.document_id.clone(),
            sequence_index: chunk.sequence_index,
            title: document.title.clone(),
            description: document.description.clone(),
            filename: document.original_filename.clone(),
            upload_time: document.created_at.to_rfc3339(),
            file_size: document.file_size,
            pages_count: document.pages_count,
            original_length: document.original_length,
            chunk_length: chunk.content_length,
            language: chunk.language,
            normalized_content: chunk.normalized_content.clone(),
        }
    }

    pub fn into_wire(self) -> Result<Metadata, StoreError> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(StoreError::MalformedRecord {
                id: String::new(),
                details: format!("metadata serialised to {other}"),
            }),
        }
    }

    pub fn from_wire(id: &str, metadata: &Metadata) -> Result<Self, StoreError> {
        serde_json::from_value(serde_json::Value::Object(metadata.clone())).map_err(|error| {
            StoreError::MalformedRecord {
                id: id.to_string(),
                details: error.to_string(),
            }
        })
    }
}

/// One chunk as the store hands it back from `get`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreRecord {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
}

impl StoreRecord {
    pub fn chunk_metadata(&self) -> Result<ChunkMetadata, StoreError> {
        ChunkMetadata::from_wire(&self.id, &self.metadata)
    }
}

/// One ranked hit from a similarity `query`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredRecord {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub similarity_score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    VectorSimilarity,
    TextMatching,
}

impl SearchMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VectorSimilarity => "vector_similarity",
            Self::TextMatching => "text_matching",
        }
    }
}

/// The fallback stage that produced a result set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    VectorQuery,
    NormalizedQuery,
    KeywordQuery,
    LexicalFallback,
}

impl StrategyKind {
    pub fn method(self) -> SearchMethod {
        match self {
            Self::LexicalFallback => SearchMethod::TextMatching,
            _ => SearchMethod::VectorSimilarity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultSource {
    pub document_id: String,
    pub sequence_index: usize,
    pub chunk_length: usize,
    pub method: SearchMethod,
    pub title: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub content: String,
    pub similarity_score: f64,
    pub source: ResultSource,
}

impl SearchResult {
    pub fn from_metadata(
        content: String,
        similarity_score: f64,
        metadata: &ChunkMetadata,
        method: SearchMethod,
    ) -> Self {
        let chunk_length = content.chars().count();
        Self {
            content,
            similarity_score: similarity_score.clamp(0.0, 1.0),
            source: ResultSource {
                document_id: metadata.document_id.clone(),
                sequence_index: metadata.sequence_index,
                chunk_length,
                method,
                title: metadata.title.clone(),
                filename: metadata.filename.clone(),
                matched_terms: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    pub query: String,
    pub strategy: Option<StrategyKind>,
    pub results: Vec<SearchResult>,
}

impl SearchReport {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn message(&self) -> String {
        match self.strategy {
            _ if self.results.is_empty() => "No matching results found".to_string(),
            Some(StrategyKind::LexicalFallback) => {
                format!("Found {} results using text matching", self.results.len())
            }
            _ => format!("Found {} results", self.results.len()),
        }
    }
}

/// What ingestion does when chunks for the document id already exist.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReingestPolicy {
    #[default]
    Reject,
    Replace,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub reingest_policy: ReingestPolicy,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
            reingest_policy: ReingestPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub document: DocumentRecord,
    pub chunk_count: usize,
    pub indexed: bool,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteReport {
    pub document_id: String,
    pub chunks_deleted: usize,
    pub deleted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClearReport {
    pub collection_name: String,
    pub chunks_cleared: usize,
    pub cleared_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResetReport {
    pub collection_name: String,
    pub chunks_before_reset: usize,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    pub document_id: String,
    pub title: String,
    pub filename: String,
    pub upload_time: String,
    pub file_size: u64,
    pub pages_count: u32,
    pub chunks_count: usize,
    pub total_chunk_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreStats {
    pub collection_name: String,
    pub total_chunks: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> ChunkMetadata {
        ChunkMetadata {
            document_id: "doc-1".to_string(),
            sequence_index: 3,
            title: "Manual".to_string(),
            language: LanguageTag::Vi,
            chunk_length: 12,
            ..ChunkMetadata::default()
        }
    }

    #[test]
    fn chunk_ids_combine_document_and_index() {
        assert_eq!(Chunk::id_for("doc1", 0), "doc1_chunk_0");
        assert_eq!(Chunk::id_for("doc1", 12), "doc1_chunk_12");
    }

    #[test]
    fn metadata_survives_the_wire_form() {
        let wire = sample_metadata().into_wire().expect("metadata is an object");
        assert_eq!(wire.get("language"), Some(&serde_json::json!("vi")));
        assert_eq!(wire.get(DOCUMENT_ID_FIELD), Some(&serde_json::json!("doc-1")));

        let back = ChunkMetadata::from_wire("doc-1_chunk_3", &wire).expect("parse back");
        assert_eq!(back, sample_metadata());
    }

    #[test]
    fn metadata_without_document_id_is_malformed() {
        let wire = Metadata::new();
        let error = ChunkMetadata::from_wire("x", &wire).unwrap_err();
        assert!(matches!(error, StoreError::MalformedRecord { .. }));
    }

    #[test]
    fn result_scores_are_clamped() {
        let result = SearchResult::from_metadata(
            "Học máy".to_string(),
            1.7,
            &sample_metadata(),
            SearchMethod::TextMatching,
        );
        assert_eq!(result.similarity_score, 1.0);
        assert_eq!(result.source.chunk_length, 7);
        assert_eq!(result.source.method.as_str(), "text_matching");
    }

    #[test]
    fn only_the_lexical_stage_reports_text_matching() {
        assert_eq!(StrategyKind::LexicalFallback.method(), SearchMethod::TextMatching);
        for kind in [
            StrategyKind::VectorQuery,
            StrategyKind::NormalizedQuery,
            StrategyKind::KeywordQuery,
        ] {
            assert_eq!(kind.method(), SearchMethod::VectorSimilarity);
        }
    }

    #[test]
    fn empty_report_renders_friendly_message() {
        let report = SearchReport {
            query: "anything".to_string(),
            strategy: None,
            results: Vec::new(),
        };
        assert!(report.is_empty());
        assert_eq!(report.message(), "No matching results found");
    }
}
