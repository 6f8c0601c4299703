use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::model::{
    AnalysisResult, Batch, BatchReport, CriticalFile, EntryRef, ReportSummary, Severity,
};

/// Per-entry results of one batch, keyed by position.
pub type EntryResults = BTreeMap<EntryRef, AnalysisResult>;

/// Folds a fully analyzed batch into its report.
///
/// Fails unless `results` holds exactly one result per batch entry. The output
/// depends only on the inputs; `generated_at` becomes the report timestamp.
pub fn aggregate(
    batch: &Batch,
    results: &EntryResults,
    generated_at: DateTime<Utc>,
) -> PipelineResult<BatchReport> {
    if results.len() != batch.len() {
        return Err(PipelineError::validation(format!(
            "batch {} has {} entries but {} results",
            batch.batch_id(),
            batch.len(),
            results.len()
        )));
    }

    let mut summary = ReportSummary::default();
    let mut external_ids = Vec::new();
    let mut seen = HashSet::new();

    for (entry_ref, entry) in batch.iter_refs() {
        let result = results.get(&entry_ref).ok_or_else(|| {
            PipelineError::validation(format!(
                "batch {} is missing a result for entry {}",
                batch.batch_id(),
                entry_ref
            ))
        })?;

        if !entry.external_id.is_empty() && seen.insert(entry.external_id.as_str()) {
            external_ids.push(entry.external_id.clone());
        }

        match result.severity {
            Severity::High => summary.high_severity += 1,
            Severity::Medium => summary.medium_severity += 1,
            Severity::Low => summary.low_severity += 1,
        }

        *summary
            .error_types
            .entry(result.error_type.clone())
            .or_insert(0) += 1;

        if result.severity == Severity::High {
            if let Some(file) = entry.file.as_deref().filter(|f| !f.trim().is_empty()) {
                summary.critical_files.push(CriticalFile {
                    file: file.to_string(),
                    error_type: result.error_type.clone(),
                    error_message: result.error_message.clone(),
                    external_id: entry.external_id.clone(),
                });
            }
        }
    }

    debug!(
        "Aggregated batch {}: {} high, {} medium, {} low, {} critical files",
        batch.batch_id(),
        summary.high_severity,
        summary.medium_severity,
        summary.low_severity,
        summary.critical_files.len()
    );

    Ok(BatchReport {
        timestamp: generated_at,
        batch_id: batch.batch_id().clone(),
        external_ids,
        total_errors: batch.len(),
        summary,
    })
}
