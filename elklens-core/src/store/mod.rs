//! Persistence of batches, reports and per-entry analyses.

use std::sync::Arc;
use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::error::PipelineResult;
use crate::model::{AnalysisResult, Batch, BatchId, BatchReport};

pub mod memory;
#[cfg(feature = "sqlite-store")]
pub mod sqlite;

pub use memory::MemoryReportStore;
#[cfg(feature = "sqlite-store")]
pub use sqlite::SqliteReportStore;

/// Shared store for batches and their reports.
///
/// `put` is an upsert keyed by batch id that replaces the report and its
/// per-entry results in one step. Readers see either the previous or the new
/// pair, never a mix.
#[async_trait::async_trait]
pub trait ReportStore: Send + Sync {
    async fn put_batch(&self, batch: &Batch) -> PipelineResult<()>;

    /// Fails with `NotFound` for unknown ids.
    async fn get_batch(&self, batch_id: &BatchId) -> PipelineResult<Batch>;

    async fn put(&self, report: &BatchReport, results: &[AnalysisResult]) -> PipelineResult<()>;

    /// Fails with `NotFound` for unknown ids.
    async fn get(&self, batch_id: &BatchId) -> PipelineResult<BatchReport>;

    /// Results in entry order. Fails with `NotFound` when no report exists.
    async fn get_results(&self, batch_id: &BatchId) -> PipelineResult<Vec<AnalysisResult>>;
}

/// Opens the backend selected in `config.storage`.
pub async fn open_store(config: &Config) -> PipelineResult<Arc<dyn ReportStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            info!("Using in-memory report store");
            Ok(Arc::new(MemoryReportStore::new()))
        }
        #[cfg(feature = "sqlite-store")]
        StorageBackend::Sqlite => {
            let store = SqliteReportStore::open(config.database_path()).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite-store"))]
        StorageBackend::Sqlite => Err(crate::error::PipelineError::config(
            "sqlite storage requested but elklens-core was built without the sqlite-store feature",
        )),
    }
}
