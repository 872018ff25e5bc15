use crate::traits::VectorStoreGateway;
use crate::{Metadata, MetadataFilter, ScoredRecord, StoreError, StoreRecord};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, RwLockWriteGuard};

/// Process-wide handle on the vector store, cloned into every component.
///
/// Regular operations share a reader/writer guard; [`SharedStore::exclusive`]
/// takes the writer side so that clearing or recreating the collection never
/// interleaves with ingestion or search. Every call is bounded by `timeout`.
#[derive(Clone)]
pub struct SharedStore {
    gateway: Arc<dyn VectorStoreGateway>,
    guard: Arc<RwLock<()>>,
    timeout: Duration,
}

impl SharedStore {
    pub fn new(gateway: Arc<dyn VectorStoreGateway>, timeout: Duration) -> Self {
        Self {
            gateway,
            guard: Arc::new(RwLock::new(())),
            timeout,
        }
    }

    pub fn collection_name(&self) -> &str {
        self.gateway.collection_name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn add(&self, records: &[StoreRecord]) -> Result<(), StoreError> {
        let _shared = self.guard.read().await;
        self.bounded("add", self.gateway.add(records)).await
    }

    pub async fn query(
        &self,
        text: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let _shared = self.guard.read().await;
        self.bounded("query", self.gateway.query(text, k, filter))
            .await
    }

    pub async fn get(
        &self,
        filter: Option<&MetadataFilter>,
        limit: Option<usize>,
    ) -> Result<Vec<StoreRecord>, StoreError> {
        let _shared = self.guard.read().await;
        self.bounded("get", self.gateway.get(filter, limit)).await
    }

    pub async fn get_by_ids(&self, ids: &[String]) -> Result<Vec<StoreRecord>, StoreError> {
        let _shared = self.guard.read().await;
        self.bounded("get", self.gateway.get_by_ids(ids)).await
    }

    pub async fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        let _shared = self.guard.read().await;
        self.bounded("delete", self.gateway.delete(ids)).await
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        let _shared = self.guard.read().await;
        self.bounded("count", self.gateway.count()).await
    }

    /// Waits for in-flight operations to drain and blocks new ones until the
    /// returned handle is dropped.
    pub async fn exclusive(&self) -> ExclusiveStore<'_> {
        ExclusiveStore {
            store: self,
            _guard: self.guard.write().await,
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout {
                operation,
                after: self.timeout,
            }),
        }
    }
}

pub struct ExclusiveStore<'a> {
    store: &'a SharedStore,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl ExclusiveStore<'_> {
    pub async fn get(
        &self,
        filter: Option<&MetadataFilter>,
        limit: Option<usize>,
    ) -> Result<Vec<StoreRecord>, StoreError> {
        self.store
            .bounded("get", self.store.gateway.get(filter, limit))
            .await
    }

    pub async fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.store
            .bounded("delete", self.store.gateway.delete(ids))
            .await
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        self.store.bounded("count", self.store.gateway.count()).await
    }

    pub async fn recreate(&self, metadata: Metadata) -> Result<(), StoreError> {
        self.store
            .bounded("recreate", self.store.gateway.recreate(metadata))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StalledGateway;

    #[async_trait]
    impl VectorStoreGateway for StalledGateway {
        fn collection_name(&self) -> &str {
            "stalled"
        }

        async fn add(&self, _records: &[StoreRecord]) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn query(
            &self,
            _text: &str,
            _k: usize,
            _filter: Option<&MetadataFilter>,
        ) -> Result<Vec<ScoredRecord>, StoreError> {
            std::future::pending().await
        }

        async fn get(
            &self,
            _filter: Option<&MetadataFilter>,
            _limit: Option<usize>,
        ) -> Result<Vec<StoreRecord>, StoreError> {
            std::future::pending().await
        }

        async fn get_by_ids(&self, _ids: &[String]) -> Result<Vec<StoreRecord>, StoreError> {
            std::future::pending().await
        }

        async fn delete(&self, _ids: &[String]) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn count(&self) -> Result<usize, StoreError> {
            Ok(7)
        }

        async fn recreate(&self, _metadata: Metadata) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn stalled(timeout: Duration) -> SharedStore {
        SharedStore::new(Arc::new(StalledGateway), timeout)
    }

    #[tokio::test]
    async fn stalled_calls_surface_as_timeouts() {
        let store = stalled(Duration::from_millis(20));
        let error = store.query("anything", 3, None).await.unwrap_err();
        assert!(matches!(
            error,
            StoreError::Timeout {
                operation: "query",
                ..
            }
        ));

        let error = store.add(&[]).await.unwrap_err();
        assert!(matches!(error, StoreError::Timeout { operation: "add", .. }));
    }

    #[tokio::test]
    async fn deleting_nothing_skips_the_store() {
        let store = stalled(Duration::from_millis(20));
        store.delete(&[]).await.expect("no-op delete");
    }

    #[tokio::test]
    async fn exclusive_access_waits_for_readers() {
        let store = stalled(Duration::from_secs(1));
        let reader = store.guard.clone().read_owned().await;

        let pending = tokio::time::timeout(Duration::from_millis(20), store.exclusive()).await;
        assert!(pending.is_err(), "writer must wait while a reader is active");

        drop(reader);
        let exclusive = store.exclusive().await;
        assert_eq!(exclusive.count().await.expect("count"), 7);
    }
}
