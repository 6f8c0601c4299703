use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
};
use elklens_core::{AnalysisResult, BatchId, BatchReport};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{error_handling::AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct AnalyzePromptRequest {
    pub prompt: String,
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
}

pub async fn analyze_prompt(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzePromptRequest>, JsonRejection>,
) -> Result<Json<BatchReport>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest {
        message: e.body_text(),
    })?;

    tracing::debug!("Analyzing prompt ({} chars)", req.prompt.len());
    let report = state.lens.analyze_prompt(&req.prompt, req.context).await?;
    Ok(Json(report))
}

pub async fn get_analysis(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchReport>, AppError> {
    let report = state.lens.get_analysis(&BatchId::from(batch_id)).await?;
    Ok(Json(report))
}

pub async fn get_analyses(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<Vec<AnalysisResult>>, AppError> {
    let results = state.lens.get_results(&BatchId::from(batch_id)).await?;
    Ok(Json(results))
}

pub async fn rerun_analysis(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<Json<BatchReport>, AppError> {
    let report = state.lens.rerun(&BatchId::from(batch_id)).await?;
    tracing::info!("Re-ran analysis for batch {}", report.batch_id);
    Ok(Json(report))
}
