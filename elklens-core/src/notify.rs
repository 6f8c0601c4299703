//! Webhook announcement of stored reports.

use reqwest::{header, Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::NotifyConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{AnalysisResult, BatchReport};

/// Body posted to the webhook: the report fields plus the per-entry analyses,
/// wrapped in `data`.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub data: WebhookData<'a>,
}

#[derive(Debug, Serialize)]
pub struct WebhookData<'a> {
    #[serde(flatten)]
    pub report: &'a BatchReport,
    pub analyses: &'a [AnalysisResult],
}

pub struct WebhookNotifier {
    client: Client,
    url: String,
    timeout: Duration,
}

impl WebhookNotifier {
    /// `None` when no webhook URL is configured.
    pub fn from_config(config: &NotifyConfig) -> PipelineResult<Option<Self>> {
        let Some(url) = config
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
        else {
            return Ok(None);
        };

        let client = Client::builder()
            .user_agent(concat!("elklens/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PipelineError::config(format!("failed to create webhook client: {}", e)))?;

        Ok(Some(Self {
            client,
            url: url.to_string(),
            timeout: config.timeout(),
        }))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Posts the report. Delivery failures are logged and reported as
    /// `false`; the report is already stored by then.
    pub async fn notify(&self, report: &BatchReport, analyses: &[AnalysisResult]) -> bool {
        match self.send(report, analyses).await {
            Ok(status) => {
                info!(
                    "Webhook accepted report for batch {} (status {})",
                    report.batch_id, status
                );
                true
            }
            Err(e) => {
                warn!(
                    "Webhook delivery for batch {} to {} failed: {}",
                    report.batch_id, self.url, e
                );
                false
            }
        }
    }

    async fn send(&self, report: &BatchReport, analyses: &[AnalysisResult]) -> Result<StatusCode, reqwest::Error> {
        let payload = WebhookPayload {
            data: WebhookData { report, analyses },
        };
        debug!("Posting report for batch {} to {}", report.batch_id, self.url);

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&payload)
            .send()
            .await?;
        Ok(response.error_for_status()?.status())
    }
}
