use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Ingest
        .route("/receive-logs", post(handlers::receive_logs))
        // Analysis
        .route("/analyze-prompt", post(handlers::analyze_prompt))
        .route("/analyze-prompt-with-logs", post(handlers::analyze_prompt_with_logs))
        .route("/analyze/:batch_id", get(handlers::get_analysis))
        .route("/analyze/:batch_id/analyses", get(handlers::get_analyses))
        .route("/analyze/:batch_id/rerun", post(handlers::rerun_analysis))
}
