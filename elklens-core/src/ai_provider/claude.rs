use crate::ai_provider::{AIError, AnalysisPrompt, ReasoningService};
use crate::config::ProviderConfig;
use crate::error::{PipelineError, PipelineResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<ClaudeMessage>,
}

#[derive(Debug, Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Debug, Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: String,
}

pub struct ClaudeProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl ClaudeProvider {
    pub fn new(api_key: String, config: &ProviderConfig) -> PipelineResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| PipelineError::config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            // The messages API caps temperature at 1.0
            temperature: config.temperature.min(1.0),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl ReasoningService for ClaudeProvider {
    async fn complete(&self, prompt: &AnalysisPrompt) -> Result<String, AIError> {
        debug!(
            "Sending Claude request for entry {} ({} chars)",
            prompt.entry_ref,
            prompt.user.len()
        );

        let request = ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: prompt.system.clone(),
            messages: vec![ClaudeMessage {
                role: "user".to_string(),
                content: prompt.user.clone(),
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if response.status() == 401 {
            error!("Claude authentication failed");
            return Err(AIError::AuthenticationError);
        }

        if response.status() == 429 {
            warn!("Claude rate limit exceeded");
            return Err(AIError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AIError::Http { status, body });
        }

        let claude_response: ClaudeResponse = response
            .json()
            .await
            .map_err(|e| AIError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let text: String = claude_response
            .content
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(AIError::InvalidResponse("No content in response".to_string()));
        }
        Ok(text)
    }

    fn provider_name(&self) -> &str {
        "claude"
    }
}
