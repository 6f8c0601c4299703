use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub analysis: AnalysisConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// `openai`, `claude` or `heuristic`.
    pub name: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    /// Overrides the provider endpoint, e.g. for an OpenAI-compatible gateway.
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "openai".to_string(),
            model: None,
            api_key: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Budget for a single call to the reasoning service.
    pub request_timeout_secs: u64,
    /// Budget for analyzing a whole batch, retries included.
    pub batch_timeout_secs: u64,
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_secs: u64,
    /// Per-batch limit on in-flight calls.
    pub max_concurrency: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            batch_timeout_secs: 300,
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_secs: 10,
            max_concurrency: 4,
        }
    }
}

impl AnalysisConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            database_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Drop entries that are not ERROR/CRITICAL/EMERGENCY before batching.
    pub errors_only: bool,
}

/// Where finished reports are announced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Receives a POST of every stored report. Unset disables delivery.
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 30,
        }
    }
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Loads configuration from `explicit`, `./.elklens.toml` or
    /// `~/.config/elklens/config.toml` (first found), then applies
    /// environment overrides.
    pub fn load(explicit: Option<&Path>) -> PipelineResult<Self> {
        let mut config = match Self::resolve_path(explicit)? {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                debug!("No configuration file found, using defaults");
                Config::default()
            }
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| PipelineError::config(format!("invalid {}: {}", path.display(), e)))
    }

    fn resolve_path(explicit: Option<&Path>) -> PipelineResult<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(PipelineError::config(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            return Ok(Some(path.to_path_buf()));
        }

        if let Ok(current_dir) = env::current_dir() {
            let project_config = current_dir.join(".elklens.toml");
            if project_config.exists() {
                return Ok(Some(project_config));
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("elklens").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        Ok(None)
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> PipelineResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("ELKLENS_PROVIDER") {
            self.provider.name = name;
        }
        if let Some(model) = lookup("ELKLENS_MODEL") {
            self.provider.model = Some(model);
        }
        if let Some(base_url) = lookup("ELKLENS_BASE_URL") {
            self.provider.base_url = Some(base_url);
        }

        // Priority: environment variable > config file
        let key_var = format!("{}_API_KEY", self.provider.name.to_uppercase());
        if let Some(key) = lookup(&key_var) {
            self.provider.api_key = Some(key);
        } else if self.provider.name.eq_ignore_ascii_case("claude") {
            if let Some(key) = lookup("ANTHROPIC_API_KEY") {
                self.provider.api_key = Some(key);
            }
        }

        if let Some(path) = lookup("ELKLENS_DATABASE_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }
        if let Some(timeout) = lookup("ELKLENS_ANALYSIS_TIMEOUT") {
            self.analysis.request_timeout_secs = parse_number("ELKLENS_ANALYSIS_TIMEOUT", &timeout)?;
        }
        if let Some(retries) = lookup("ELKLENS_MAX_RETRIES") {
            self.analysis.max_retries = parse_number("ELKLENS_MAX_RETRIES", &retries)?;
        }
        if let Some(url) = lookup("ELKLENS_WEBHOOK_URL") {
            self.notify.webhook_url = Some(url);
        }
        if let Some(timeout) = lookup("ELKLENS_WEBHOOK_TIMEOUT") {
            self.notify.timeout_secs = parse_number("ELKLENS_WEBHOOK_TIMEOUT", &timeout)?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(crate::db_path::get_database_path)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> PipelineResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PipelineError::config(format!("{} must be a number, got '{}'", key, value)))
}
