use crate::config::{EngineConfig, DEFAULT_COLLECTION_DESCRIPTION, DEFAULT_COLLECTION_NAME};
use crate::embeddings::{CharacterNgramEmbedder, Embedder};
use crate::traits::VectorStoreGateway;
use crate::{Metadata, MetadataFilter, ScoredRecord, StoreError, StoreRecord};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

const BACKEND: &str = "chroma";

/// Gateway over a Chroma server's REST API.
///
/// The collection is resolved lazily (get-or-create) on first use and its id
/// cached. Embeddings are computed client-side so that write and query sides
/// always agree.
pub struct ChromaStore {
    client: Client,
    endpoint: Url,
    collection: String,
    collection_id: RwLock<Option<String>>,
    embedder: Box<dyn Embedder>,
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    ids: Vec<String>,
    #[serde(default)]
    documents: Option<Vec<Option<String>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Metadata>>>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl ChromaStore {
    pub fn new(endpoint: &str, collection: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_embedder(endpoint, collection, Box::new(CharacterNgramEmbedder::default()))
    }

    pub fn with_embedder(
        endpoint: &str,
        collection: impl Into<String>,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self, StoreError> {
        let mut endpoint = Url::parse(endpoint)?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Ok(Self {
            client: Client::new(),
            endpoint,
            collection: collection.into(),
            collection_id: RwLock::new(None),
            embedder,
        })
    }

    /// Store for the collection named in `config`.
    pub fn from_config(endpoint: &str, config: &EngineConfig) -> Result<Self, StoreError> {
        Self::new(endpoint, config.collection_name.as_str())
    }

    pub fn local() -> Result<Self, StoreError> {
        Self::new("http://localhost:8000", DEFAULT_COLLECTION_NAME)
    }

    fn url(&self, path: &str) -> Result<Url, StoreError> {
        Ok(self.endpoint.join(path)?)
    }

    async fn collection_id(&self) -> Result<String, StoreError> {
        if let Some(id) = self.collection_id.read().await.as_ref() {
            return Ok(id.clone());
        }

        let mut cached = self.collection_id.write().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let mut metadata = Metadata::new();
        metadata.insert("description".to_string(), json!(DEFAULT_COLLECTION_DESCRIPTION));
        let id = self.create_collection(metadata).await?;
        *cached = Some(id.clone());
        Ok(id)
    }

    async fn create_collection(&self, metadata: Metadata) -> Result<String, StoreError> {
        let response = self
            .client
            .post(self.url("api/v1/collections")?)
            .json(&json!({
                "name": self.collection,
                "metadata": metadata,
                "get_or_create": true,
            }))
            .send()
            .await?;

        let created: CollectionResponse = checked(response).await?.json().await?;
        info!(collection = %self.collection, id = %created.id, "chroma collection ready");
        Ok(created.id)
    }

    async fn post_collection(&self, action: &str, body: Value) -> Result<Response, StoreError> {
        let id = self.collection_id().await?;
        let response = self
            .client
            .post(self.url(&format!("api/v1/collections/{id}/{action}"))?)
            .json(&body)
            .send()
            .await?;
        checked(response).await
    }
}

async fn checked(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StoreError::BackendResponse {
        backend: BACKEND.to_string(),
        details: format!("{status}: {body}"),
    })
}

fn chroma_where(filter: Option<&MetadataFilter>) -> Value {
    filter.map_or(Value::Null, MetadataFilter::to_chroma_where)
}

fn records_from_get(response: GetResponse) -> Vec<StoreRecord> {
    let GetResponse {
        ids,
        documents,
        metadatas,
    } = response;
    let mut documents = documents.unwrap_or_default().into_iter();
    let mut metadatas = metadatas.unwrap_or_default().into_iter();

    ids.into_iter()
        .map(|id| StoreRecord {
            id,
            content: documents.next().flatten().unwrap_or_default(),
            metadata: metadatas.next().flatten().unwrap_or_default(),
        })
        .collect()
}

fn first_row<T>(rows: Option<Vec<Vec<T>>>) -> Vec<T> {
    rows.and_then(|rows| rows.into_iter().next())
        .unwrap_or_default()
}

fn records_from_query(response: QueryResponse) -> Vec<ScoredRecord> {
    let QueryResponse {
        ids,
        documents,
        metadatas,
        distances,
    } = response;

    // One query text was sent, so only the first row is meaningful.
    let ids = ids.into_iter().next().unwrap_or_default();
    let mut documents = first_row(documents).into_iter();
    let mut metadatas = first_row(metadatas).into_iter();
    let mut distances = first_row(distances).into_iter();

    ids.into_iter()
        .map(|id| {
            let distance = distances.next().flatten().unwrap_or(1.0);
            ScoredRecord {
                id,
                content: documents.next().flatten().unwrap_or_default(),
                metadata: metadatas.next().flatten().unwrap_or_default(),
                similarity_score: (1.0 - distance).clamp(0.0, 1.0),
            }
        })
        .collect()
}

#[async_trait]
impl VectorStoreGateway for ChromaStore {
    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn add(&self, records: &[StoreRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
        let documents: Vec<&str> = records.iter().map(|record| record.content.as_str()).collect();
        let metadatas: Vec<&Metadata> = records.iter().map(|record| &record.metadata).collect();
        let embeddings: Vec<Vec<f32>> = records
            .iter()
            .map(|record| self.embedder.embed(&record.content))
            .collect();

        self.post_collection(
            "upsert",
            json!({
                "ids": ids,
                "documents": documents,
                "metadatas": metadatas,
                "embeddings": embeddings,
            }),
        )
        .await?;

        debug!(collection = %self.collection, count = records.len(), "chroma upsert");
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let mut body = json!({
            "query_embeddings": [self.embedder.embed(text)],
            "n_results": k,
            "include": ["documents", "metadatas", "distances"],
        });
        if filter.is_some() {
            body["where"] = chroma_where(filter);
        }

        let parsed: QueryResponse = self.post_collection("query", body).await?.json().await?;
        Ok(records_from_query(parsed))
    }

    async fn get(
        &self,
        filter: Option<&MetadataFilter>,
        limit: Option<usize>,
    ) -> Result<Vec<StoreRecord>, StoreError> {
        let mut body = json!({ "include": ["documents", "metadatas"] });
        if filter.is_some() {
            body["where"] = chroma_where(filter);
        }
        if let Some(limit) = limit {
            body["limit"] = json!(limit);
        }

        let parsed: GetResponse = self.post_collection("get", body).await?.json().await?;
        Ok(records_from_get(parsed))
    }

    async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoreRecord>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let body = json!({ "ids": ids, "include": ["documents", "metadatas"] });
        let parsed: GetResponse = self.post_collection("get", body).await?.json().await?;
        Ok(records_from_get(parsed))
    }

    async fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        self.post_collection("delete", json!({ "ids": ids })).await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let id = self.collection_id().await?;
        let response = self
            .client
            .get(self.url(&format!("api/v1/collections/{id}/count"))?)
            .send()
            .await?;

        Ok(checked(response).await?.json::<usize>().await?)
    }

    async fn recreate(&self, metadata: Metadata) -> Result<(), StoreError> {
        let mut cached = self.collection_id.write().await;

        let response = self
            .client
            .delete(self.url(&format!("api/v1/collections/{}", self.collection))?)
            .send()
            .await?;

        // A collection that never existed is as good as a dropped one.
        let status = response.status();
        if status != StatusCode::NOT_FOUND && !status.is_success() {
            checked(response).await?;
        }

        *cached = None;
        let id = self.create_collection(metadata).await?;
        *cached = Some(id);
        Ok(())
    }
}
