use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_MESSAGE_CHARS: usize = 150;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub error_type: String,
    pub error_message: String,
    pub status_code: u16,
}

type Formatter = fn(&regex::Captures) -> (String, u16);

/// Regex-based labeling of raw error messages, used when the reasoning service
/// does not name the error type itself.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    patterns: Vec<(Regex, &'static str, Formatter)>,
    status_pattern: Regex,
    whitespace: Regex,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier {
    pub fn new() -> Self {
        let patterns = vec![
            rule(
                r"SQLSTATE\[(\w+)\]:?\s*([^(]+)",
                "Database Error",
                |c| (format!("SQL Error {}: {}", &c[1], c[2].trim()), 500),
            ),
            rule(
                r"(?i)(auth\w*\s+failed|permission\s+denied|access\s+denied)",
                "Authentication Error",
                |c| (c[0].to_string(), 401),
            ),
            rule(
                r"(?i)(connection\s+\w+|refused|timed?\s*out|couldn't\s+connect)",
                "Connection Error",
                |c| (format!("Connection failed: {}", &c[0]), 503),
            ),
            rule(
                r#"(?i)exception\s*['"](.+?)['"].*?message\s*['"](.+?)['"]"#,
                "Application Error",
                |c| (format!("{}: {}", &c[1], &c[2]), 500),
            ),
            rule(
                r"(?i)\b([45]\d{2})\b\s*(?:error)?\s*[:-]\s*(.+?)(?:\s+at\s|$)",
                "HTTP Error",
                |c| {
                    let status = c[1].parse().unwrap_or(500);
                    (format!("Status {}: {}", &c[1], c[2].trim()), status)
                },
            ),
        ];

        Self {
            patterns,
            status_pattern: Regex::new(r"(?i)status(?:\s+code)?[:=\s]+(\d{3})")
                .expect("status pattern is valid"),
            whitespace: Regex::new(r"\s+").expect("whitespace pattern is valid"),
        }
    }

    pub fn classify(&self, raw_message: &str) -> ErrorClassification {
        let (message, mut status_code) = unwrap_json_message(raw_message);

        if status_code.is_none() {
            status_code = self
                .status_pattern
                .captures(&message)
                .and_then(|c| c[1].parse().ok());
        }

        for (pattern, label, formatter) in &self.patterns {
            if let Some(captures) = pattern.captures(&message) {
                let (error_message, default_status) = formatter(&captures);
                return ErrorClassification {
                    error_type: label.to_string(),
                    error_message: truncate(&error_message),
                    status_code: status_code.unwrap_or(default_status),
                };
            }
        }

        let cleaned = self.whitespace.replace_all(&message, " ");
        ErrorClassification {
            error_type: "Unknown Error".to_string(),
            error_message: truncate(cleaned.trim()),
            status_code: status_code.unwrap_or(500),
        }
    }
}

fn rule(pattern: &str, label: &'static str, format: Formatter) -> (Regex, &'static str, Formatter) {
    (
        Regex::new(pattern).expect("classifier pattern is valid"),
        label,
        format,
    )
}

fn unwrap_json_message(raw: &str) -> (String, Option<u16>) {
    if raw.trim_start().starts_with('{') {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(raw)
                .to_string();
            let status = map
                .get("status_code")
                .or_else(|| map.get("code"))
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok());
            return (message, status);
        }
    }
    (raw.to_string(), None)
}

/// Caps a message at 150 characters, marking the cut with `...`.
pub fn truncate(message: &str) -> String {
    if message.chars().count() > MAX_MESSAGE_CHARS {
        let head: String = message.chars().take(MAX_MESSAGE_CHARS).collect();
        format!("{}...", head)
    } else {
        message.to_string()
    }
}
