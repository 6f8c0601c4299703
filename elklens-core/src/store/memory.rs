use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};
use crate::model::{AnalysisResult, Batch, BatchId, BatchReport};
use crate::store::ReportStore;

/// Process-local store. Report and results live under one lock entry so a
/// reader can never pair a new report with stale results.
#[derive(Default)]
pub struct MemoryReportStore {
    batches: RwLock<HashMap<BatchId, Batch>>,
    reports: RwLock<HashMap<BatchId, (BatchReport, Vec<AnalysisResult>)>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ReportStore for MemoryReportStore {
    async fn put_batch(&self, batch: &Batch) -> PipelineResult<()> {
        debug!("Storing batch {} in memory", batch.batch_id());
        self.batches
            .write()
            .await
            .insert(batch.batch_id().clone(), batch.clone());
        Ok(())
    }

    async fn get_batch(&self, batch_id: &BatchId) -> PipelineResult<Batch> {
        self.batches
            .read()
            .await
            .get(batch_id)
            .cloned()
            .ok_or_else(|| PipelineError::not_found(format!("batch {}", batch_id)))
    }

    async fn put(&self, report: &BatchReport, results: &[AnalysisResult]) -> PipelineResult<()> {
        let mut reports = self.reports.write().await;
        let mut ordered = results.to_vec();
        ordered.sort_by_key(|r| r.entry_ref);
        if reports
            .insert(report.batch_id.clone(), (report.clone(), ordered))
            .is_some()
        {
            info!("Overwrote existing report for batch {}", report.batch_id);
        }
        Ok(())
    }

    async fn get(&self, batch_id: &BatchId) -> PipelineResult<BatchReport> {
        self.reports
            .read()
            .await
            .get(batch_id)
            .map(|(report, _)| report.clone())
            .ok_or_else(|| PipelineError::not_found(format!("analysis for batch {}", batch_id)))
    }

    async fn get_results(&self, batch_id: &BatchId) -> PipelineResult<Vec<AnalysisResult>> {
        self.reports
            .read()
            .await
            .get(batch_id)
            .map(|(_, results)| results.clone())
            .ok_or_else(|| PipelineError::not_found(format!("analysis for batch {}", batch_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReportSummary;
    use chrono::Utc;

    fn report(batch_id: &str, total: usize) -> BatchReport {
        BatchReport {
            timestamp: Utc::now(),
            batch_id: BatchId::from(batch_id),
            external_ids: vec!["e1".to_string()],
            total_errors: total,
            summary: ReportSummary {
                low_severity: total,
                ..ReportSummary::default()
            },
        }
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = MemoryReportStore::new();
        let report = report("b1", 1);
        store.put(&report, &[]).await.unwrap();

        assert_eq!(store.get(&BatchId::from("b1")).await.unwrap(), report);
        assert_eq!(store.get(&BatchId::from("b1")).await.unwrap(), report);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = MemoryReportStore::new();
        store.put(&report("b1", 1), &[]).await.unwrap();
        let newer = report("b1", 2);
        store.put(&newer, &[]).await.unwrap();
        assert_eq!(store.get(&BatchId::from("b1")).await.unwrap(), newer);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let store = MemoryReportStore::new();
        let id = BatchId::from("nonexistent");
        assert!(matches!(store.get(&id).await, Err(PipelineError::NotFound { .. })));
        assert!(matches!(store.get_batch(&id).await, Err(PipelineError::NotFound { .. })));
        assert!(matches!(
            store.get_results(&id).await,
            Err(PipelineError::NotFound { .. })
        ));
    }
}
