//! Report store: durable log of claim reports.
//!
//! One [`ReportStore`] trait with pluggable backends:
//! - [`PgReportStore`]: PostgreSQL via sqlx
//! - [`JsonlReportStore`]: append-only JSON-lines file
//!
//! [`CachedReportStore`] wraps either with a `list_all` cache that every write
//! invalidates before returning.

mod cached;
mod jsonl;
mod postgres;

pub use cached::CachedReportStore;
pub use jsonl::JsonlReportStore;
pub use postgres::PgReportStore;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{DatabaseConfig, StoreBackend};
use crate::models::{ClaimReport, FinalVerdict, NewReport};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("report {0} not found")]
    NotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt record at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Append a report with no final verdict. Returns the assigned id.
    async fn insert(&self, report: NewReport) -> Result<i64, StoreError>;

    /// Every report, newest first.
    async fn list_all(&self) -> Result<Vec<ClaimReport>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<ClaimReport>, StoreError>;

    /// Set the human verdict of exactly one report.
    async fn update_final_verdict(&self, id: i64, verdict: FinalVerdict) -> Result<(), StoreError>;

    /// The moderation queue: reports without a final verdict.
    async fn list_pending(&self) -> Result<Vec<ClaimReport>, StoreError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(ClaimReport::is_pending)
            .collect())
    }

    /// Short description of the backend and its state.
    async fn health(&self) -> Result<String, StoreError>;

    /// Drop any read-side cache. No-op for uncached backends.
    async fn clear_cache(&self) {}

    fn name(&self) -> &str;
}

/// Newest first; id breaks timestamp ties.
pub(crate) fn sort_newest_first(reports: &mut [ClaimReport]) {
    reports.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
}

/// Open the configured backend, wrapped in the read cache when enabled.
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn ReportStore>, StoreError> {
    let store: Arc<dyn ReportStore> = match (config.backend, config.cache_enabled) {
        (StoreBackend::Postgres, cached) => {
            let pool = crate::db::create_pool(config).await?;
            let store = PgReportStore::new(pool);
            store.ensure_schema().await?;
            if cached {
                Arc::new(CachedReportStore::new(store))
            } else {
                Arc::new(store)
            }
        }
        (StoreBackend::Jsonl, cached) => {
            let store = JsonlReportStore::open(&config.jsonl_path).await?;
            if cached {
                Arc::new(CachedReportStore::new(store))
            } else {
                Arc::new(store)
            }
        }
    };

    tracing::info!(backend = store.name(), cached = config.cache_enabled, "Report store ready");
    Ok(store)
}
