//! The `ElkLens` facade wiring every stage together:
//! normalize → batch → request → parse → aggregate → store → notify.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::aggregator::{aggregate, EntryResults};
use crate::ai_provider::{create_provider, ReasoningService};
use crate::batch::{create_ad_hoc_batch, create_batch};
use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{AnalysisResult, Batch, BatchId, BatchReport, RawLogRecord};
use crate::normalizer::{is_error_entry, normalize};
#[cfg(feature = "webhook")]
use crate::notify::WebhookNotifier;
use crate::parser::ResultParser;
use crate::requester::{AnalysisRequester, RawResponses};
use crate::store::{open_store, ReportStore};

pub struct ElkLens {
    config: Config,
    /// Created on first use, so retrieval never needs provider credentials.
    service: OnceCell<Arc<dyn ReasoningService>>,
    request_timeout: Duration,
    batch_timeout: Duration,
    parser: ResultParser,
    store: Arc<dyn ReportStore>,
    #[cfg(feature = "webhook")]
    notifier: Option<WebhookNotifier>,
}

impl ElkLens {
    pub fn new(config: Config, service: Arc<dyn ReasoningService>, store: Arc<dyn ReportStore>) -> Self {
        let mut lens = Self::with_store(config, store);
        lens.service = OnceCell::new_with(Some(service));
        lens
    }

    fn with_store(config: Config, store: Arc<dyn ReportStore>) -> Self {
        Self {
            request_timeout: config.analysis.request_timeout(),
            batch_timeout: config.analysis.batch_timeout(),
            config,
            service: OnceCell::new(),
            parser: ResultParser::new(),
            store,
            #[cfg(feature = "webhook")]
            notifier: None,
        }
    }

    /// Opens the store and webhook named in `config`. The reasoning service
    /// is built on the first analysis.
    pub async fn from_config(config: Config) -> PipelineResult<Self> {
        let store = open_store(&config).await?;
        #[cfg(feature = "webhook")]
        let notifier = WebhookNotifier::from_config(&config.notify)?;

        #[allow(unused_mut)]
        let mut lens = Self::with_store(config, store);
        #[cfg(feature = "webhook")]
        {
            lens.notifier = notifier;
        }
        Ok(lens)
    }

    /// Announces every stored report to `notifier`.
    #[cfg(feature = "webhook")]
    pub fn with_notifier(mut self, notifier: WebhookNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Overrides the per-call budget from `analysis.request_timeout_secs`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Overrides the whole-batch budget from `analysis.batch_timeout_secs`.
    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ReportStore> {
        &self.store
    }

    /// The active provider, or the configured name before first use.
    pub fn provider_name(&self) -> &str {
        self.service
            .get()
            .map(|service| service.provider_name())
            .unwrap_or(self.config.provider.name.as_str())
    }

    async fn requester(&self) -> PipelineResult<AnalysisRequester> {
        let service = self
            .service
            .get_or_try_init(|| async { create_provider(&self.config.provider) })
            .await?;
        Ok(AnalysisRequester::new(service.clone(), &self.config.analysis)
            .with_request_timeout(self.request_timeout)
            .with_batch_timeout(self.batch_timeout))
    }

    /// Normalizes `records` into one new batch and persists it.
    ///
    /// Every invalid record is reported in a single `Validation` error and no
    /// batch is created.
    pub async fn ingest(&self, records: &[RawLogRecord]) -> PipelineResult<Batch> {
        let mut entries = Vec::with_capacity(records.len());
        let mut problems = Vec::new();

        for (i, record) in records.iter().enumerate() {
            match normalize(record) {
                Ok(entry) => entries.push(entry),
                Err(PipelineError::Validation { message }) => {
                    problems.push(format!("record {}: {}", i, message))
                }
                Err(e) => return Err(e),
            }
        }

        if !problems.is_empty() {
            warn!("Rejected {} of {} records", problems.len(), records.len());
            return Err(PipelineError::validation(problems.join("; ")));
        }

        if self.config.ingest.errors_only {
            let before = entries.len();
            entries.retain(is_error_entry);
            if entries.len() < before {
                info!("Skipped {} non-error entries", before - entries.len());
            }
        }

        let batch = create_batch(entries)?;
        self.store.put_batch(&batch).await?;
        Ok(batch)
    }

    /// Analyzes every entry of `batch` and stores the report with its
    /// per-entry results. Nothing is stored unless every entry succeeds.
    pub async fn analyze_batch(&self, batch: &Batch) -> PipelineResult<BatchReport> {
        let responses = self.requester().await?.request_analysis(batch).await?;
        self.complete_batch(batch, responses).await
    }

    pub async fn ingest_and_analyze(&self, records: &[RawLogRecord]) -> PipelineResult<BatchReport> {
        let requester = self.requester().await?;
        let batch = self.ingest(records).await?;
        let responses = requester.request_analysis(&batch).await?;
        self.complete_batch(&batch, responses).await
    }

    /// Ingests `records` as one batch and analyzes each entry against the
    /// caller's `prompt` instead of the standard log prompt.
    pub async fn analyze_prompt_with_logs(
        &self,
        prompt: &str,
        records: &[RawLogRecord],
    ) -> PipelineResult<BatchReport> {
        let instruction = prompt.trim();
        if instruction.is_empty() {
            return Err(PipelineError::validation("prompt is required"));
        }

        let requester = self.requester().await?;
        let batch = self.ingest(records).await?;
        let responses = requester.request_instructed_analysis(&batch, instruction).await?;
        self.complete_batch(&batch, responses).await
    }

    /// Single-prompt analysis: the prompt becomes a one-entry batch whose
    /// source is `context`.
    pub async fn analyze_prompt(
        &self,
        prompt: &str,
        context: Option<Map<String, Value>>,
    ) -> PipelineResult<BatchReport> {
        let batch = create_ad_hoc_batch(prompt, context)?;
        let requester = self.requester().await?;
        self.store.put_batch(&batch).await?;
        let responses = requester.request_analysis(&batch).await?;
        self.complete_batch(&batch, responses).await
    }

    async fn complete_batch(&self, batch: &Batch, responses: RawResponses) -> PipelineResult<BatchReport> {
        let mut results = EntryResults::new();
        for (entry_ref, entry) in batch.iter_refs() {
            let raw = responses.get(&entry_ref).ok_or_else(|| PipelineError::Parse {
                entry: entry_ref.0,
                message: "no reply received".to_string(),
            })?;
            results.insert(entry_ref, self.parser.parse(raw, entry_ref, entry)?);
        }

        let report = aggregate(batch, &results, Utc::now())?;
        let ordered: Vec<AnalysisResult> = results.into_values().collect();
        self.store.put(&report, &ordered).await?;

        info!(
            "Analysis of batch {} complete: {} entries, {} high severity",
            report.batch_id, report.total_errors, report.summary.high_severity
        );
        self.announce(&report, &ordered).await;
        Ok(report)
    }

    #[cfg(feature = "webhook")]
    async fn announce(&self, report: &BatchReport, results: &[AnalysisResult]) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(report, results).await;
        }
    }

    #[cfg(not(feature = "webhook"))]
    async fn announce(&self, _report: &BatchReport, _results: &[AnalysisResult]) {}

    pub async fn get_analysis(&self, batch_id: &BatchId) -> PipelineResult<BatchReport> {
        self.store.get(batch_id).await
    }

    pub async fn get_results(&self, batch_id: &BatchId) -> PipelineResult<Vec<AnalysisResult>> {
        self.store.get_results(batch_id).await
    }

    /// Re-analyzes a stored batch, superseding its previous report.
    pub async fn rerun(&self, batch_id: &BatchId) -> PipelineResult<BatchReport> {
        let batch = self.store.get_batch(batch_id).await?;
        info!("Re-running analysis for batch {}", batch_id);
        self.analyze_batch(&batch).await
    }
}
