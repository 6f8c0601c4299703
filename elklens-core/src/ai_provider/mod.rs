use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::ProviderConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{EntryRef, Level};

#[cfg(feature = "ai-providers")]
pub mod claude;
pub mod heuristic;
#[cfg(feature = "ai-providers")]
pub mod openai;
pub mod prompts;

#[cfg(feature = "ai-providers")]
pub use claude::ClaudeProvider;
pub use heuristic::HeuristicProvider;
#[cfg(feature = "ai-providers")]
pub use openai::OpenAIProvider;
pub use prompts::PromptBuilder;

#[derive(Error, Debug)]
pub enum AIError {
    #[error("Request timed out")]
    Timeout,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Authentication failed")]
    AuthenticationError,
    #[error("Rate limited")]
    RateLimited,
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Provider not supported: {0}")]
    UnsupportedProvider(String),
}

impl AIError {
    /// Errors worth another attempt: timeouts, transport failures, rate limits and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            AIError::Timeout | AIError::Transport(_) | AIError::RateLimited => true,
            AIError::Http { status, .. } => *status >= 500,
            AIError::AuthenticationError
            | AIError::InvalidResponse(_)
            | AIError::UnsupportedProvider(_) => false,
        }
    }
}

#[cfg(feature = "ai-providers")]
impl From<reqwest::Error> for AIError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AIError::Timeout
        } else {
            AIError::Transport(e.to_string())
        }
    }
}

/// A fully rendered prompt for one batch entry.
#[derive(Debug, Clone)]
pub struct AnalysisPrompt {
    pub entry_ref: EntryRef,
    pub system: String,
    pub user: String,
    /// The entry's message and level, kept alongside the rendered text so
    /// offline providers do not have to re-parse it.
    pub message: String,
    pub level: Level,
    pub file: Option<String>,
    /// Caller-written instruction, when the entry is analyzed against one.
    pub instruction: Option<String>,
}

/// The external reasoning service: prompt in, free-form text out.
#[async_trait::async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(&self, prompt: &AnalysisPrompt) -> Result<String, AIError>;
    fn provider_name(&self) -> &str;
}

pub fn create_provider(config: &ProviderConfig) -> PipelineResult<Arc<dyn ReasoningService>> {
    info!(
        "Creating reasoning service: {} with model: {:?}",
        config.name, config.model
    );
    match config.name.to_lowercase().as_str() {
        #[cfg(feature = "ai-providers")]
        "openai" => {
            debug!("Initializing OpenAI provider");
            let api_key = require_api_key(config)?;
            Ok(Arc::new(OpenAIProvider::new(api_key, config)?))
        }
        #[cfg(feature = "ai-providers")]
        "claude" | "anthropic" => {
            debug!("Initializing Claude/Anthropic provider");
            let api_key = require_api_key(config)?;
            Ok(Arc::new(ClaudeProvider::new(api_key, config)?))
        }
        "heuristic" | "offline" => {
            debug!("Initializing offline heuristic provider");
            Ok(Arc::new(HeuristicProvider::new()))
        }
        _ => {
            error!("Unsupported reasoning service: {}", config.name);
            Err(PipelineError::config(
                AIError::UnsupportedProvider(config.name.clone()).to_string(),
            ))
        }
    }
}

#[cfg(feature = "ai-providers")]
fn require_api_key(config: &ProviderConfig) -> PipelineResult<String> {
    config.api_key.clone().filter(|k| !k.is_empty()).ok_or_else(|| {
        PipelineError::config(format!(
            "No API key for provider '{}'. Set {}_API_KEY or provider.api_key in the config file",
            config.name,
            config.name.to_uppercase()
        ))
    })
}
