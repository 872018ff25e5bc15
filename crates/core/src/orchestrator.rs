use crate::keywords::extract_keywords;
use crate::lexical::score_lexical;
use crate::store::SharedStore;
use crate::text::normalize;
use crate::{
    ChunkMetadata, EngineConfig, Metadata, MetadataFilter, ScoredRecord, SearchError,
    SearchMethod, SearchReport, SearchResult, StoreError, StrategyKind,
};
use async_trait::async_trait;
use std::cmp::Ordering;
use tracing::{debug, warn};

/// One stage of the fallback chain.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// `Ok(None)` when the stage does not apply to this query.
    async fn attempt(
        &self,
        store: &SharedStore,
        query: &str,
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> Result<Option<Vec<SearchResult>>, StoreError>;
}

pub struct VectorQuery;

pub struct NormalizedQuery;

pub struct KeywordQuery;

pub struct LexicalFallback {
    pub phrase_bonus: f64,
}

/// Parsed metadata, or `None` after logging when the record does not carry
/// chunk metadata. Such records are skipped instead of failing the search.
fn readable_metadata(id: &str, metadata: &Metadata) -> Option<ChunkMetadata> {
    match ChunkMetadata::from_wire(id, metadata) {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(id, %error, "skipping record with unreadable metadata");
            None
        }
    }
}

async fn similarity_results(
    store: &SharedStore,
    text: &str,
    filter: Option<&MetadataFilter>,
    k: usize,
    method: SearchMethod,
) -> Result<Vec<SearchResult>, StoreError> {
    Ok(store
        .query(text, k, filter)
        .await?
        .into_iter()
        .filter_map(|hit: ScoredRecord| {
            let metadata = readable_metadata(&hit.id, &hit.metadata)?;
            Some(SearchResult::from_metadata(
                hit.content,
                hit.similarity_score,
                &metadata,
                method,
            ))
        })
        .collect())
}

#[async_trait]
impl SearchStrategy for VectorQuery {
    fn kind(&self) -> StrategyKind {
        StrategyKind::VectorQuery
    }

    async fn attempt(
        &self,
        store: &SharedStore,
        query: &str,
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> Result<Option<Vec<SearchResult>>, StoreError> {
        similarity_results(store, query, filter, k, self.kind().method())
            .await
            .map(Some)
    }
}

#[async_trait]
impl SearchStrategy for NormalizedQuery {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NormalizedQuery
    }

    async fn attempt(
        &self,
        store: &SharedStore,
        query: &str,
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> Result<Option<Vec<SearchResult>>, StoreError> {
        let normalized = normalize(query);
        if normalized == query || normalized.is_empty() {
            return Ok(None);
        }
        debug!(%normalized, "retrying with normalized query");
        similarity_results(store, &normalized, filter, k, self.kind().method())
            .await
            .map(Some)
    }
}

#[async_trait]
impl SearchStrategy for KeywordQuery {
    fn kind(&self) -> StrategyKind {
        StrategyKind::KeywordQuery
    }

    async fn attempt(
        &self,
        store: &SharedStore,
        query: &str,
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> Result<Option<Vec<SearchResult>>, StoreError> {
        let keywords = extract_keywords(query);
        if keywords.is_empty() {
            return Ok(None);
        }
        let keyword_query = keywords.join(" ");
        debug!(%keyword_query, "retrying with keywords");
        similarity_results(store, &keyword_query, filter, k, self.kind().method())
            .await
            .map(Some)
    }
}

#[async_trait]
impl SearchStrategy for LexicalFallback {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LexicalFallback
    }

    async fn attempt(
        &self,
        store: &SharedStore,
        query: &str,
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> Result<Option<Vec<SearchResult>>, StoreError> {
        let normalized_query = normalize(query);
        if normalized_query.is_empty() {
            return Ok(None);
        }

        let candidates = store.get(filter, None).await?;
        debug!(candidates = candidates.len(), "scanning chunks lexically");

        let mut matches = Vec::new();
        for record in candidates {
            if record.content.is_empty() {
                continue;
            }
            let Some(metadata) = readable_metadata(&record.id, &record.metadata) else {
                continue;
            };
            let normalized_document = if metadata.normalized_content.is_empty() {
                normalize(&record.content)
            } else {
                metadata.normalized_content.clone()
            };

            if let Some(found) =
                score_lexical(&normalized_query, &normalized_document, self.phrase_bonus)
            {
                let mut result = SearchResult::from_metadata(
                    record.content,
                    found.score,
                    &metadata,
                    self.kind().method(),
                );
                result.source.matched_terms = found.matched_terms;
                matches.push(result);
            }
        }

        matches.sort_by(rank_order);
        matches.truncate(k);
        Ok(Some(matches))
    }
}

fn rank_order(left: &SearchResult, right: &SearchResult) -> Ordering {
    right
        .similarity_score
        .total_cmp(&left.similarity_score)
        .then_with(|| left.source.document_id.cmp(&right.source.document_id))
        .then_with(|| left.source.sequence_index.cmp(&right.source.sequence_index))
}

/// Runs the fallback chain in order and returns the first non-empty result
/// set, tagged with the stage that produced it.
pub struct RetrievalEngine {
    store: SharedStore,
    strategies: Vec<Box<dyn SearchStrategy>>,
}

impl RetrievalEngine {
    pub fn new(store: SharedStore, config: &EngineConfig) -> Self {
        let strategies: Vec<Box<dyn SearchStrategy>> = vec![
            Box::new(VectorQuery),
            Box::new(NormalizedQuery),
            Box::new(KeywordQuery),
            Box::new(LexicalFallback {
                phrase_bonus: config.lexical_phrase_bonus,
            }),
        ];
        Self::with_strategies(store, strategies)
    }

    pub fn with_strategies(store: SharedStore, strategies: Vec<Box<dyn SearchStrategy>>) -> Self {
        Self { store, strategies }
    }

    pub fn strategy_kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|strategy| strategy.kind()).collect()
    }

    /// Searches everything, or only `document_ids` when given.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        document_ids: Option<&[String]>,
    ) -> Result<SearchReport, SearchError> {
        match document_ids {
            Some(document_ids) => self.search_in_documents(query, document_ids, k).await,
            None => self.search_with_filter(query, None, k).await,
        }
    }

    pub async fn search_in_documents(
        &self,
        query: &str,
        document_ids: &[String],
        k: usize,
    ) -> Result<SearchReport, SearchError> {
        if document_ids.is_empty() {
            return Err(SearchError::InvalidFilter(
                "document scope must name at least one document".to_string(),
            ));
        }
        if document_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(SearchError::InvalidFilter(
                "document ids must not be blank".to_string(),
            ));
        }

        let filter = MetadataFilter::documents(document_ids);
        self.search_with_filter(query, Some(&filter), k).await
    }

    pub async fn search_with_filter(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
        k: usize,
    ) -> Result<SearchReport, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if k == 0 {
            return Err(SearchError::InvalidArgument(
                "result count must be positive".to_string(),
            ));
        }

        for strategy in &self.strategies {
            let kind = strategy.kind();
            match strategy.attempt(&self.store, query, filter, k).await? {
                Some(results) if !results.is_empty() => {
                    debug!(?kind, hits = results.len(), "search stage produced results");
                    return Ok(SearchReport {
                        query: query.to_string(),
                        strategy: Some(kind),
                        results,
                    });
                }
                Some(_) => debug!(?kind, "search stage found nothing"),
                None => debug!(?kind, "search stage not applicable"),
            }
        }

        Ok(SearchReport {
            query: query.to_string(),
            strategy: None,
            results: Vec::new(),
        })
    }
}
