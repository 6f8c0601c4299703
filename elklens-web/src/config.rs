use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub port: u16,
    pub max_body_size: usize,
    pub cors_origins: Vec<String>,
    /// Pipeline configuration file; the usual lookup applies when unset.
    pub config_path: Option<PathBuf>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            max_body_size: 10 * 1024 * 1024, // 10MB
            cors_origins: Vec::new(),
            config_path: None,
        }
    }
}

impl WebConfig {
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = env::var("ELKLENS_PORT") {
            config.port = port.parse()?;
        }

        if let Ok(max_size) = env::var("ELKLENS_MAX_BODY_SIZE") {
            config.max_body_size = max_size.parse()?;
        }

        if let Ok(origins) = env::var("ELKLENS_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(path) = env::var("ELKLENS_CONFIG") {
            config.config_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }
}
