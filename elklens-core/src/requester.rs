//! Fan-out of one batch to the reasoning service.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::RetryIf;
use tracing::{debug, info, warn};

use crate::ai_provider::{AIError, AnalysisPrompt, PromptBuilder, ReasoningService};
use crate::config::AnalysisConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{Batch, EntryRef};

/// Raw model output, one per entry of the batch.
pub type RawResponses = BTreeMap<EntryRef, String>;

pub struct AnalysisRequester {
    service: Arc<dyn ReasoningService>,
    request_timeout: Duration,
    batch_timeout: Duration,
    max_retries: usize,
    initial_backoff_ms: u64,
    max_backoff: Duration,
    max_concurrency: usize,
}

impl AnalysisRequester {
    pub fn new(service: Arc<dyn ReasoningService>, config: &AnalysisConfig) -> Self {
        Self {
            service,
            request_timeout: config.request_timeout(),
            batch_timeout: config.batch_timeout(),
            max_retries: config.max_retries,
            initial_backoff_ms: config.initial_backoff_ms,
            max_backoff: Duration::from_secs(config.max_backoff_secs),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.service.provider_name()
    }

    /// Sends every entry of `batch` to the reasoning service and returns once
    /// all of them have answered. Any entry that still fails after its retries,
    /// or the batch budget running out, fails the whole batch.
    pub async fn request_analysis(&self, batch: &Batch) -> PipelineResult<RawResponses> {
        let prompts = batch
            .iter_refs()
            .map(|(entry_ref, entry)| PromptBuilder::for_entry(entry_ref, entry))
            .collect();
        self.request_prompts(batch, prompts).await
    }

    /// Like [`request_analysis`](Self::request_analysis), with the caller's
    /// `instruction` applied to every entry.
    pub async fn request_instructed_analysis(
        &self,
        batch: &Batch,
        instruction: &str,
    ) -> PipelineResult<RawResponses> {
        let prompts = batch
            .iter_refs()
            .map(|(entry_ref, entry)| PromptBuilder::for_instruction(instruction, entry_ref, entry))
            .collect();
        self.request_prompts(batch, prompts).await
    }

    async fn request_prompts(&self, batch: &Batch, prompts: Vec<AnalysisPrompt>) -> PipelineResult<RawResponses> {
        info!(
            "Requesting analysis of batch {} ({} entries) from {}",
            batch.batch_id(),
            batch.len(),
            self.service.provider_name()
        );

        let all = stream::iter(prompts)
            .map(|prompt| self.request_one(prompt))
            .buffer_unordered(self.max_concurrency)
            .try_collect::<RawResponses>();

        let responses = match tokio::time::timeout(self.batch_timeout, all).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Batch {} exceeded its {:?} analysis budget",
                    batch.batch_id(),
                    self.batch_timeout
                );
                return Err(PipelineError::BatchTimeout {
                    batch_id: batch.batch_id().to_string(),
                    seconds: self.batch_timeout.as_secs(),
                });
            }
        };

        debug_assert_eq!(responses.len(), batch.len());
        Ok(responses)
    }

    async fn request_one(&self, prompt: AnalysisPrompt) -> PipelineResult<(EntryRef, String)> {
        let attempts = AtomicUsize::new(0);
        let service = &self.service;
        let request_timeout = self.request_timeout;
        let prompt_ref = &prompt;
        let attempts_ref = &attempts;

        let result = RetryIf::spawn(
            self.retry_strategy(),
            move || {
                let attempt = attempts_ref.fetch_add(1, Ordering::Relaxed) + 1;
                async move {
                    if attempt > 1 {
                        debug!("Retrying entry {} (attempt {})", prompt_ref.entry_ref, attempt);
                    }
                    match tokio::time::timeout(request_timeout, service.complete(prompt_ref)).await {
                        Ok(result) => result,
                        Err(_) => Err(AIError::Timeout),
                    }
                }
            },
            |e: &AIError| e.is_transient(),
        )
        .await;

        match result {
            Ok(text) => Ok((prompt.entry_ref, text)),
            Err(source) => {
                let attempts = attempts.load(Ordering::Relaxed);
                warn!(
                    "Analysis of entry {} failed after {} attempt(s): {}",
                    prompt.entry_ref, attempts, source
                );
                Err(PipelineError::AnalysisService { attempts, source })
            }
        }
    }

    /// Delays of `initial`, `2 * initial`, `4 * initial`... capped at the
    /// configured maximum, one per allowed retry.
    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        let initial = Duration::from_millis(self.initial_backoff_ms);
        let max_backoff = self.max_backoff;
        // Base 2 yields 2, 4, 8... ms; halving gives the doubling multiplier
        ExponentialBackoff::from_millis(2)
            .map(move |step| {
                let multiplier = u32::try_from(step.as_millis() / 2).unwrap_or(u32::MAX);
                initial.saturating_mul(multiplier).min(max_backoff)
            })
            .take(self.max_retries)
    }
}
