// ElkLens Web - HTTP surface over the analysis pipeline

pub mod config;
pub mod error_handling;
pub mod handlers;
pub mod routes;

pub use config::WebConfig;
pub use error_handling::{AppError, AppResult};

use axum::{extract::DefaultBodyLimit, http::HeaderValue, Router};
use elklens_core::{Config, ElkLens};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

// Main application state
#[derive(Clone)]
pub struct AppState {
    pub lens: Arc<ElkLens>,
    pub config: WebConfig,
}

impl AppState {
    /// Loads the pipeline configuration and opens its provider and store.
    pub async fn new(config: WebConfig) -> anyhow::Result<Self> {
        let pipeline_config = Config::load(config.config_path.as_deref())?;
        Self::from_pipeline_config(pipeline_config, config).await
    }

    pub async fn from_pipeline_config(pipeline_config: Config, config: WebConfig) -> anyhow::Result<Self> {
        let lens = ElkLens::from_config(pipeline_config).await?;
        Ok(Self::with_lens(lens, config))
    }

    pub fn with_lens(lens: ElkLens, config: WebConfig) -> Self {
        Self {
            lens: Arc::new(lens),
            config,
        }
    }
}

/// Full application: API routes, JSON 404 fallback, body limit, CORS and
/// request tracing.
pub fn create_app(state: AppState) -> Router {
    let cors = if state.config.cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    let max_body_size = state.config.max_body_size;

    routes::api_routes()
        .fallback(error_handling::handle_404)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
