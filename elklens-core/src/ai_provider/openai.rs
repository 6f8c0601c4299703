use crate::ai_provider::{AIError, AnalysisPrompt, ReasoningService};
use crate::config::ProviderConfig;
use crate::error::{PipelineError, PipelineResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

/// Chat-completions client. Works against any OpenAI-compatible endpoint via
/// `provider.base_url`.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIProvider {
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
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl ReasoningService for OpenAIProvider {
    async fn complete(&self, prompt: &AnalysisPrompt) -> Result<String, AIError> {
        debug!(
            "Sending OpenAI request for entry {} ({} chars)",
            prompt.entry_ref,
            prompt.user.len()
        );

        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAIMessage {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                OpenAIMessage {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if response.status() == 401 {
            error!("OpenAI authentication failed");
            return Err(AIError::AuthenticationError);
        }

        if response.status() == 429 {
            warn!("OpenAI rate limit exceeded");
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

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| AIError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        openai_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AIError::InvalidResponse("No choices in response".to_string()))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_provider_creation() {
        let provider = OpenAIProvider::new("test_key".to_string(), &ProviderConfig::default()).unwrap();
        assert_eq!(provider.api_key, "test_key");
        assert_eq!(provider.model, DEFAULT_MODEL);
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_openai_provider_with_gateway() {
        let config = ProviderConfig {
            base_url: Some("http://localhost:11434/v1/".to_string()),
            model: Some("llama3".to_string()),
            ..ProviderConfig::default()
        };
        let provider = OpenAIProvider::new("k".to_string(), &config).unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434/v1");
        assert_eq!(provider.model, "llama3");
    }
}
