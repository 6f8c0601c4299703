use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use elklens_core::RawLogRecord;
use serde::{Deserialize, Serialize};

use crate::{error_handling::AppError, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceiveLogsResponse {
    pub message: String,
    pub batch_id: String,
    pub elk_ids: Vec<String>,
}

/// Ingests an array of Elasticsearch hits as one batch and analyzes it.
pub async fn receive_logs(
    State(state): State<AppState>,
    payload: Result<Json<Vec<RawLogRecord>>, JsonRejection>,
) -> Result<Json<ReceiveLogsResponse>, AppError> {
    let Json(records) = payload.map_err(|e| AppError::BadRequest {
        message: e.body_text(),
    })?;

    tracing::info!("Received {} log records", records.len());
    let report = state.lens.ingest_and_analyze(&records).await?;

    Ok(Json(ReceiveLogsResponse {
        message: "Analysis complete".to_string(),
        batch_id: report.batch_id.to_string(),
        elk_ids: report.external_ids,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PromptWithLogsRequest {
    pub prompt: String,
    pub logs: Vec<RawLogRecord>,
}

/// Ingests the logs as one batch and analyzes each entry against the caller's prompt.
pub async fn analyze_prompt_with_logs(
    State(state): State<AppState>,
    payload: Result<Json<PromptWithLogsRequest>, JsonRejection>,
) -> Result<Json<ReceiveLogsResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest {
        message: e.body_text(),
    })?;

    tracing::info!(
        "Received {} log records with a {} char prompt",
        req.logs.len(),
        req.prompt.len()
    );
    let report = state
        .lens
        .analyze_prompt_with_logs(&req.prompt, &req.logs)
        .await?;

    Ok(Json(ReceiveLogsResponse {
        message: "Analysis complete".to_string(),
        batch_id: report.batch_id.to_string(),
        elk_ids: report.external_ids,
    }))
}
