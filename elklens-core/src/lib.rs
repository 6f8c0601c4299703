pub mod aggregator;
pub mod ai_provider;
pub mod batch;
pub mod classification;
pub mod config;
pub mod db_path;
pub mod error;
pub mod model;
pub mod normalizer;
#[cfg(feature = "webhook")]
pub mod notify;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod requester;
pub mod store;

pub use aggregator::{aggregate, EntryResults};
pub use ai_provider::{create_provider, AIError, AnalysisPrompt, ReasoningService};
pub use batch::{create_ad_hoc_batch, create_batch};
pub use classification::{ErrorClassification, ErrorClassifier};
pub use config::{
    AnalysisConfig, Config, IngestConfig, NotifyConfig, ProviderConfig, StorageBackend, StorageConfig,
};
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use model::{
    AnalysisResult, Batch, BatchId, BatchReport, CriticalFile, EntryRef, Level, LogEntry,
    RawLogRecord, ReportSummary, Severity,
};
pub use normalizer::normalize;
#[cfg(feature = "webhook")]
pub use notify::WebhookNotifier;
pub use output::write_json;
pub use parser::ResultParser;
pub use pipeline::ElkLens;
pub use requester::{AnalysisRequester, RawResponses};
pub use store::{open_store, MemoryReportStore, ReportStore};
#[cfg(feature = "sqlite-store")]
pub use store::SqliteReportStore;
