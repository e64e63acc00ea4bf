use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ReportStore, StoreError};
use crate::models::{ClaimReport, FinalVerdict, NewReport};

/// Read-through cache over `list_all()`.
///
/// Every successful write bumps `generation` and drops the cached list before
/// returning. A load only populates the cache if no write happened while it
/// was in flight, so a slow read can never reinstate pre-write data.
pub struct CachedReportStore<S> {
    inner: S,
    cache: RwLock<Option<Arc<Vec<ClaimReport>>>>,
    generation: AtomicU64,
}

impl<S: ReportStore> CachedReportStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.cache.write().await = None;
    }

    async fn cached_list(&self) -> Result<Arc<Vec<ClaimReport>>, StoreError> {
        if let Some(hit) = self.cache.read().await.as_ref() {
            return Ok(hit.clone());
        }

        let started_at = self.generation.load(Ordering::SeqCst);
        let fresh = Arc::new(self.inner.list_all().await?);

        let mut slot = self.cache.write().await;
        if self.generation.load(Ordering::SeqCst) == started_at {
            *slot = Some(fresh.clone());
        } else {
            tracing::debug!("Report list changed during load; not caching");
        }
        Ok(fresh)
    }
}

#[async_trait]
impl<S: ReportStore> ReportStore for CachedReportStore<S> {
    async fn insert(&self, report: NewReport) -> Result<i64, StoreError> {
        let result = self.inner.insert(report).await;
        self.invalidate().await;
        result
    }

    async fn list_all(&self) -> Result<Vec<ClaimReport>, StoreError> {
        Ok(self.cached_list().await?.as_ref().clone())
    }

    async fn get(&self, id: i64) -> Result<Option<ClaimReport>, StoreError> {
        Ok(self.cached_list().await?.iter().find(|r| r.id == id).cloned())
    }

    async fn update_final_verdict(&self, id: i64, verdict: FinalVerdict) -> Result<(), StoreError> {
        let result = self.inner.update_final_verdict(id, verdict).await;
        self.invalidate().await;
        result
    }

    async fn list_pending(&self) -> Result<Vec<ClaimReport>, StoreError> {
        Ok(self
            .cached_list()
            .await?
            .iter()
            .filter(|r| r.is_pending())
            .cloned()
            .collect())
    }

    async fn health(&self) -> Result<String, StoreError> {
        self.inner.health().await
    }

    async fn clear_cache(&self) {
        self.invalidate().await;
        tracing::info!(backend = self.inner.name(), "Report cache cleared");
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
