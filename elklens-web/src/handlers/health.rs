use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "provider": state.lens.provider_name(),
        "version": crate::VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
