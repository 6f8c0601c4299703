use serde::Serialize;
use thiserror::Error;

use crate::ai_provider::AIError;

/// Errors surfaced by the analysis pipeline.
///
/// Every variant maps onto one [`ErrorKind`], which is what boundary code
/// (CLI exit status, HTTP status) keys on.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Batch contains no entries to analyze")]
    EmptyBatch,

    #[error("Analysis service error after {attempts} attempt(s): {source}")]
    AnalysisService {
        attempts: usize,
        #[source]
        source: AIError,
    },

    #[error("Analysis timed out after {seconds}s for batch {batch_id}")]
    BatchTimeout { batch_id: String, seconds: u64 },

    #[error("Unusable model response for entry {entry}: {message}")]
    Parse { entry: usize, message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    EmptyBatch,
    AnalysisService,
    Parse,
    NotFound,
    Storage,
    Config,
}

impl ErrorKind {
    /// Same spelling as the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::EmptyBatch => "empty_batch",
            ErrorKind::AnalysisService => "analysis_service",
            ErrorKind::Parse => "parse",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Storage => "storage",
            ErrorKind::Config => "config",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_FAILED",
            ErrorKind::EmptyBatch => "EMPTY_BATCH",
            ErrorKind::AnalysisService => "ANALYSIS_SERVICE_ERROR",
            ErrorKind::Parse => "PARSE_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Storage => "STORAGE_ERROR",
            ErrorKind::Config => "CONFIG_ERROR",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::Validation => 2,
            ErrorKind::EmptyBatch => 3,
            ErrorKind::AnalysisService => 4,
            ErrorKind::Parse => 5,
            ErrorKind::NotFound => 6,
            ErrorKind::Storage => 7,
            ErrorKind::Config => 8,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::EmptyBatch => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Parse => 422,
            ErrorKind::AnalysisService => 502,
            ErrorKind::Storage | ErrorKind::Config => 500,
        }
    }
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation { .. } => ErrorKind::Validation,
            PipelineError::EmptyBatch => ErrorKind::EmptyBatch,
            PipelineError::AnalysisService { .. } | PipelineError::BatchTimeout { .. } => {
                ErrorKind::AnalysisService
            }
            PipelineError::Parse { .. } => ErrorKind::Parse,
            PipelineError::NotFound { .. } => ErrorKind::NotFound,
            PipelineError::Storage { .. } => ErrorKind::Storage,
            PipelineError::Config { .. } => ErrorKind::Config,
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::storage(format!("serialization failed: {}", e))
    }
}

#[cfg(feature = "sqlite-store")]
impl From<sqlx::Error> for PipelineError {
    fn from(e: sqlx::Error) -> Self {
        PipelineError::storage(e.to_string())
    }
}
