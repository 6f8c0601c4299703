// Data model shared by every pipeline stage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// One raw record as delivered by the log shipper (an Elasticsearch hit).
///
/// Both the Elasticsearch field names (`_index`, `_id`, `_source`) and the
/// plain names are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLogRecord {
    #[serde(default, alias = "_index")]
    pub index: Option<String>,
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default, rename = "type", alias = "_type")]
    pub doc_type: Option<String>,
    /// Identifier assigned by the upstream logging system, string or integer.
    #[serde(default)]
    pub elk_id: Option<Value>,
    #[serde(default, alias = "_source")]
    pub source: Map<String, Value>,
}

impl RawLogRecord {
    pub fn from_source(source: Map<String, Value>) -> Self {
        Self {
            source,
            ..Default::default()
        }
    }
}

/// Severity label carried by a log entry. Unrecognized labels are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Level {
    Emergency,
    Critical,
    Error,
    Warning,
    Other(String),
}

impl Level {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "EMERGENCY" => Level::Emergency,
            "CRITICAL" => Level::Critical,
            "ERROR" => Level::Error,
            "WARNING" => Level::Warning,
            _ => Level::Other(label.trim().to_string()),
        }
    }

    /// Monolog numeric levels: 600 emergency, 500 critical, 400 error, 300 warning.
    pub fn from_numeric(level: i64) -> Self {
        match level {
            l if l >= 600 => Level::Emergency,
            l if l >= 500 => Level::Critical,
            l if l >= 400 => Level::Error,
            l if l >= 300 => Level::Warning,
            l => Level::Other(l.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Level::Emergency => "EMERGENCY",
            Level::Critical => "CRITICAL",
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Other(label) => label,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Level::Emergency | Level::Critical | Level::Error)
    }
}

impl From<String> for Level {
    fn from(label: String) -> Self {
        Level::from_label(&label)
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.as_str().to_string()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Fallback tiering when the model does not state a severity.
    pub fn from_level(level: &Level) -> Self {
        match level {
            Level::Emergency | Level::Critical | Level::Error => Severity::High,
            Level::Warning => Severity::Medium,
            Level::Other(_) => Severity::Low,
        }
    }

    /// Parses a model-stated severity such as `HIGH`, `Critical` or `low`.
    pub fn parse_label(label: &str) -> Option<Self> {
        let upper = label.trim().to_uppercase();
        if upper.starts_with("CRITICAL") || upper.starts_with("HIGH") {
            Some(Severity::High)
        } else if upper.starts_with("MEDIUM") || upper.starts_with("MODERATE") {
            Some(Severity::Medium)
        } else if upper.starts_with("LOW") {
            Some(Severity::Low)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical, validated log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub index: String,
    pub external_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    /// Opaque passthrough of the originating record's fields.
    pub source: Map<String, Value>,
    /// Source file path, when the record carries one.
    pub file: Option<String>,
}

/// Position of an entry inside its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryRef(pub usize);

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    pub(crate) fn generate() -> Self {
        BatchId(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for BatchId {
    fn from(id: String) -> Self {
        BatchId(id)
    }
}

impl From<&str> for BatchId {
    fn from(id: &str) -> Self {
        BatchId(id.to_string())
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable group of entries analyzed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    batch_id: BatchId,
    entries: Vec<LogEntry>,
    created_at: DateTime<Utc>,
}

impl Batch {
    pub(crate) fn new(batch_id: BatchId, entries: Vec<LogEntry>, created_at: DateTime<Utc>) -> Self {
        Self {
            batch_id,
            entries,
            created_at,
        }
    }

    pub fn batch_id(&self) -> &BatchId {
        &self.batch_id
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter_refs(&self) -> impl Iterator<Item = (EntryRef, &LogEntry)> {
        self.entries.iter().enumerate().map(|(i, e)| (EntryRef(i), e))
    }
}

/// Model-derived analysis of a single entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub entry_ref: EntryRef,
    pub error_type: String,
    pub severity: Severity,
    pub error_message: String,
    pub analysis_text: String,
    pub suggestions: Vec<String>,
    pub resolution_steps: Vec<String>,
    #[serde(default)]
    pub code_suggestions: Vec<String>,
    pub root_cause: Option<String>,
    pub impact: Option<String>,
    /// Location inferred by the model, independent of the entry's own `file`.
    pub file_location: Option<String>,
    pub needs_immediate_attention: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalFile {
    pub file: String,
    pub error_type: String,
    pub error_message: String,
    #[serde(rename = "elk_id")]
    pub external_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub high_severity: usize,
    pub medium_severity: usize,
    pub low_severity: usize,
    pub critical_files: Vec<CriticalFile>,
    pub error_types: BTreeMap<String, usize>,
}

/// Aggregate report over one analyzed batch. Field names are part of the
/// external JSON contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub timestamp: DateTime<Utc>,
    pub batch_id: BatchId,
    #[serde(rename = "elk_ids")]
    pub external_ids: Vec<String>,
    pub total_errors: usize,
    pub summary: ReportSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_labels_are_case_insensitive() {
        assert_eq!(Level::from_label("error"), Level::Error);
        assert_eq!(Level::from_label(" Emergency "), Level::Emergency);
        assert_eq!(Level::from_label("notice"), Level::Other("notice".to_string()));
    }

    #[test]
    fn test_numeric_levels() {
        assert_eq!(Level::from_numeric(400), Level::Error);
        assert_eq!(Level::from_numeric(550), Level::Critical);
        assert_eq!(Level::from_numeric(600), Level::Emergency);
        assert_eq!(Level::from_numeric(300), Level::Warning);
        assert_eq!(Level::from_numeric(200), Level::Other("200".to_string()));
    }

    #[test]
    fn test_severity_from_level() {
        assert_eq!(Severity::from_level(&Level::Emergency), Severity::High);
        assert_eq!(Severity::from_level(&Level::Critical), Severity::High);
        assert_eq!(Severity::from_level(&Level::Error), Severity::High);
        assert_eq!(Severity::from_level(&Level::Warning), Severity::Medium);
        assert_eq!(Severity::from_level(&Level::from_label("INFO")), Severity::Low);
    }

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::parse_label("HIGH"), Some(Severity::High));
        assert_eq!(Severity::parse_label("critical"), Some(Severity::High));
        assert_eq!(Severity::parse_label("Medium - degraded"), Some(Severity::Medium));
        assert_eq!(Severity::parse_label("low"), Some(Severity::Low));
        assert_eq!(Severity::parse_label("unclear"), None);
    }

    #[test]
    fn test_raw_record_accepts_elasticsearch_names() {
        let raw: RawLogRecord = serde_json::from_value(serde_json::json!({
            "_index": "app-2024.01.01",
            "_id": "abc",
            "_type": "_doc",
            "elk_id": 42,
            "_source": {"message": "boom"}
        }))
        .unwrap();
        assert_eq!(raw.index.as_deref(), Some("app-2024.01.01"));
        assert_eq!(raw.id.as_deref(), Some("abc"));
        assert_eq!(raw.doc_type.as_deref(), Some("_doc"));
        assert_eq!(raw.source.get("message").and_then(|v| v.as_str()), Some("boom"));
    }

    #[test]
    fn test_report_json_field_names() {
        let report = BatchReport {
            timestamp: Utc::now(),
            batch_id: BatchId::from("b1"),
            external_ids: vec!["e1".to_string()],
            total_errors: 1,
            summary: ReportSummary {
                high_severity: 1,
                critical_files: vec![CriticalFile {
                    file: "/app/a.php".to_string(),
                    error_type: "Database Error".to_string(),
                    error_message: "down".to_string(),
                    external_id: "e1".to_string(),
                }],
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["batch_id"], "b1");
        assert_eq!(json["elk_ids"][0], "e1");
        assert_eq!(json["total_errors"], 1);
        assert_eq!(json["summary"]["high_severity"], 1);
        assert_eq!(json["summary"]["critical_files"][0]["elk_id"], "e1");
        assert!(json["summary"]["error_types"].is_object());
    }
}
