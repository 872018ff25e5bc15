use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("vector store unavailable: {0}")]
    Unavailable(String),

    #[error("vector store {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store request failed: {0}")]
    Request(String),

    #[error("malformed record {id}: {details}")]
    MalformedRecord { id: String, details: String },
}

impl StoreError {
    /// Outages and timeouts, as opposed to a store that answered with an error.
    pub fn is_outage(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_connect() {
            Self::Unavailable(error.to_string())
        } else if error.is_timeout() {
            Self::Timeout {
                operation: "http request",
                after: Duration::ZERO,
            }
        } else {
            Self::Request(error.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("unsupported source file: {0}")]
    UnsupportedSource(String),

    #[error("source file is {size} bytes, limit is {limit}")]
    SourceTooLarge { size: u64, limit: u64 },

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("document {0} is already ingested; delete it first or ingest with the replace policy")]
    DocumentExists(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query is empty")]
    EmptyQuery,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("reset not confirmed: pass an explicit confirmation to drop the collection")]
    NotConfirmed,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_timeout_names_the_operation() {
        let error = StoreError::Timeout {
            operation: "query",
            after: Duration::from_secs(3),
        };
        assert_eq!(error.to_string(), "vector store query timed out after 3s");
        assert!(error.is_outage());
    }

    #[test]
    fn backend_errors_are_not_outages() {
        let error = StoreError::BackendResponse {
            backend: "chroma".to_string(),
            details: "500 Internal Server Error".to_string(),
        };
        assert!(!error.is_outage());
    }

    #[test]
    fn search_error_is_transparent_over_store_errors() {
        let error: SearchError = StoreError::Unavailable("connection refused".to_string()).into();
        assert_eq!(
            error.to_string(),
            "vector store unavailable: connection refused"
        );
        assert!(matches!(error, SearchError::Store(StoreError::Unavailable(_))));
    }
}
