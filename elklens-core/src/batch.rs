//! Grouping of normalized entries into identified batches.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{PipelineError, PipelineResult};
use crate::model::{Batch, BatchId, Level, LogEntry};
use crate::normalizer::extract_file;

/// Index assigned to entries created from an interactive prompt.
pub const AD_HOC_INDEX: &str = "ad-hoc";

/// Creates a batch from one or more entries, preserving their order.
pub fn create_batch(entries: Vec<LogEntry>) -> PipelineResult<Batch> {
    if entries.is_empty() {
        return Err(PipelineError::EmptyBatch);
    }

    let batch = Batch::new(BatchId::generate(), entries, Utc::now());
    info!(
        "Created batch {} with {} entries",
        batch.batch_id(),
        batch.len()
    );
    Ok(batch)
}

/// Creates a single-entry batch whose message is the prompt and whose source is
/// the caller-supplied context.
pub fn create_ad_hoc_batch(prompt: &str, context: Option<Map<String, Value>>) -> PipelineResult<Batch> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(PipelineError::validation("prompt is required"));
    }

    let source = context.unwrap_or_default();
    let entry = LogEntry {
        index: AD_HOC_INDEX.to_string(),
        external_id: String::new(),
        message: prompt.to_string(),
        timestamp: Utc::now(),
        level: Level::Other("PROMPT".to_string()),
        file: extract_file(&source),
        source,
    };
    create_batch(vec![entry])
}

pub fn is_ad_hoc(entry: &LogEntry) -> bool {
    entry.index == AD_HOC_INDEX
}
