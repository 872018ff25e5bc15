use crate::models::IngestionOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_COLLECTION_NAME: &str = "knowledge_base";
pub const DEFAULT_COLLECTION_DESCRIPTION: &str = "PDF document knowledge base with text chunks";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    pub collection_name: String,
    pub ingestion: IngestionOptions,
    /// Upper bound on every single vector-store call.
    pub store_timeout: Duration,
    pub default_top_k: usize,
    /// Added to a lexical score when the whole normalised query appears verbatim.
    pub lexical_phrase_bonus: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            ingestion: IngestionOptions::default(),
            store_timeout: Duration::from_secs(30),
            default_top_k: 5,
            lexical_phrase_bonus: 0.5,
        }
    }
}

impl EngineConfig {
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_ingestion(mut self, ingestion: IngestionOptions) -> Self {
        self.ingestion = ingestion;
        self
    }
}
