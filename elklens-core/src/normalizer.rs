//! Validation and normalization of raw log records.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::model::{Level, LogEntry, RawLogRecord};

const NAIVE_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Turns one raw record into a [`LogEntry`].
///
/// Only `message` and `timestamp` are mandatory. Unknown levels are kept as
/// [`Level::Other`] and `source` is carried through untouched.
pub fn normalize(raw: &RawLogRecord) -> PipelineResult<LogEntry> {
    let source = &raw.source;

    let message = source
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| PipelineError::validation("message is required and must not be empty"))?
        .to_string();

    let timestamp_value = source
        .get("@timestamp")
        .or_else(|| source.get("timestamp"))
        .ok_or_else(|| PipelineError::validation("timestamp is required"))?;
    let timestamp = parse_timestamp(timestamp_value).ok_or_else(|| {
        PipelineError::validation(format!("timestamp is not a valid instant: {}", timestamp_value))
    })?;

    let level = extract_level(source);
    let file = extract_file(source);

    let external_id = raw
        .elk_id
        .as_ref()
        .and_then(value_to_id)
        .or_else(|| raw.id.clone())
        .unwrap_or_default();

    debug!(
        "Normalized record external_id={} level={} file={:?}",
        external_id, level, file
    );

    Ok(LogEntry {
        index: raw.index.clone().unwrap_or_default(),
        external_id,
        message,
        timestamp,
        level,
        source: source.clone(),
        file,
    })
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (assumed UTC) or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NAIVE_TIMESTAMP_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

fn extract_level(source: &Map<String, Value>) -> Level {
    let label = source
        .get("level_name")
        .and_then(Value::as_str)
        .or_else(|| source.get("level").and_then(Value::as_str))
        .or_else(|| {
            source
                .get("msg")
                .and_then(|m| m.get("level_name"))
                .and_then(Value::as_str)
        });

    if let Some(label) = label {
        return Level::from_label(label);
    }

    match source.get("level").and_then(Value::as_i64) {
        Some(numeric) => Level::from_numeric(numeric),
        None => Level::Other(String::new()),
    }
}

/// `file` at the top of the source, else the Filebeat `log.file.path`.
pub fn extract_file(source: &Map<String, Value>) -> Option<String> {
    source
        .get("file")
        .and_then(Value::as_str)
        .or_else(|| {
            source
                .get("log")
                .and_then(|l| l.get("file"))
                .and_then(|f| f.get("path"))
                .and_then(Value::as_str)
        })
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
}

/// The JSON document some shippers embed in `event.original`, if present and parseable.
pub fn event_original(source: &Map<String, Value>) -> Option<Map<String, Value>> {
    let raw = source.get("event")?.get("original")?.as_str()?;
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        _ => {
            debug!("event.original is not a JSON object, ignoring");
            None
        }
    }
}

/// Whether an entry counts as an error for error-only ingestion.
pub fn is_error_entry(entry: &LogEntry) -> bool {
    if entry.level.is_error() {
        return true;
    }
    event_original(&entry.source)
        .map(|event| {
            let named = event
                .get("level_name")
                .and_then(Value::as_str)
                .map(|l| Level::from_label(l).is_error())
                .unwrap_or(false);
            let numeric = event
                .get("level")
                .and_then(Value::as_i64)
                .map(|l| l >= 400)
                .unwrap_or(false);
            named || numeric
        })
        .unwrap_or(false)
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
