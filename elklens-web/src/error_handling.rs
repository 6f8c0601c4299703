use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use elklens_core::{ErrorKind, PipelineError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Bad request: {message}")]
    BadRequest { message: String },
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: String, code: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message,
            code: code.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            AppError::Pipeline(ref e) => {
                let kind = e.kind();
                let status = StatusCode::from_u16(kind.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

                // Storage and config details stay in the server log
                let message = match kind {
                    ErrorKind::Storage => {
                        error!("Storage error: {}", e);
                        "A storage error occurred".to_string()
                    }
                    ErrorKind::Config => {
                        error!("Configuration error: {}", e);
                        "The server is misconfigured".to_string()
                    }
                    ErrorKind::AnalysisService => {
                        error!("Analysis service error: {}", e);
                        e.to_string()
                    }
                    _ => {
                        warn!("Request failed: {}", e);
                        e.to_string()
                    }
                };

                (status, ErrorResponse::new(kind.as_str(), message, kind.code()))
            }

            AppError::BadRequest { ref message } => {
                warn!("Bad request: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::new("bad_request", message.clone(), "BAD_REQUEST"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

// 404 handler for unmatched routes
pub async fn handle_404(uri: Uri) -> impl IntoResponse {
    let error_response = ErrorResponse::new(
        "not_found",
        format!("No route found for {}", uri.path()),
        "ROUTE_NOT_FOUND",
    );

    (StatusCode::NOT_FOUND, Json(error_response))
}
