use serde_json::{Map, Value};

use crate::ai_provider::AnalysisPrompt;
use crate::batch::is_ad_hoc;
use crate::model::{EntryRef, LogEntry};
use crate::normalizer::event_original;

pub struct PromptBuilder;

impl PromptBuilder {
    pub fn for_entry(entry_ref: EntryRef, entry: &LogEntry) -> AnalysisPrompt {
        let user = if is_ad_hoc(entry) {
            Self::create_custom_prompt(entry)
        } else {
            Self::create_log_prompt(entry)
        };

        AnalysisPrompt {
            entry_ref,
            system: Self::get_base_system_prompt().to_string(),
            user,
            message: entry.message.clone(),
            level: entry.level.clone(),
            file: entry.file.clone(),
            instruction: None,
        }
    }

    /// Applies a caller-written instruction to one log entry. The reply is
    /// requested in the Analysis / Recommendations / Code Suggestions /
    /// Next Steps layout.
    pub fn for_instruction(instruction: &str, entry_ref: EntryRef, entry: &LogEntry) -> AnalysisPrompt {
        AnalysisPrompt {
            entry_ref,
            system: Self::get_base_system_prompt().to_string(),
            user: Self::create_instruction_prompt(instruction, entry),
            message: entry.message.clone(),
            level: entry.level.clone(),
            file: entry.file.clone(),
            instruction: Some(instruction.to_string()),
        }
    }

    fn get_base_system_prompt() -> &'static str {
        r#"You are an expert log analysis assistant specializing in root cause identification for production web applications.

CORE PRINCIPLES:
1. Focus on ROOT CAUSE identification, not just symptoms
2. Distinguish between code errors, infrastructure issues, configuration problems, and external service failures
3. Provide actionable, concrete remediation steps
4. Answer strictly in the requested format so the reply can be parsed"#
    }

    fn get_format_prompt() -> &'static str {
        r#"Format your response exactly as follows:

ERROR DETECTION
Type: [Specific error type, e.g., Database Connection Error, API Error, Authentication Error]
Status Code: [HTTP status code if applicable, or internal error code]
Description: [Brief, clear description of the error]
File Location: [Extract or infer the file location from the error message]

ANALYSIS
Severity: [HIGH/MEDIUM/LOW]
Impact: [Brief description of the impact]
Root Cause: [Most likely cause of the error]

RESOLUTION
Immediate Actions:
- [Action 1]
- [Action 2]

Long-term Solutions:
- [Solution 1]
- [Solution 2]"#
    }

    fn create_log_prompt(entry: &LogEntry) -> String {
        let event = event_original(&entry.source);
        let context = event
            .as_ref()
            .and_then(|e| e.get("context"))
            .map(Value::to_string)
            .unwrap_or_else(|| "{}".to_string());
        let timestamp = event
            .as_ref()
            .and_then(|e| e.get("datetime"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| entry.timestamp.to_rfc3339());

        let mut prompt = format!(
            "Analyze this error log and provide a detailed solution. {}\n\nLog Details:\n- Message: {}\n- Level: {}\n- Error Context: {}\n- Timestamp: {}\n",
            Self::get_format_prompt(),
            entry.message,
            entry.level,
            context,
            timestamp,
        );

        if let Some(file) = &entry.file {
            prompt.push_str(&format!("- File: {}\n", file));
        }
        if let Some(host) = host_name(&entry.source) {
            prompt.push_str(&format!("- Host: {}\n", host));
        }
        if !entry.index.is_empty() {
            prompt.push_str(&format!("- Index: {}\n", entry.index));
        }
        prompt
    }

    fn create_custom_prompt(entry: &LogEntry) -> String {
        let context = if entry.source.is_empty() {
            "No additional context provided.".to_string()
        } else {
            serde_json::to_string_pretty(&entry.source).unwrap_or_else(|_| "{}".to_string())
        };

        format!(
            "Analyze this context and answer the prompt. When referring to code or files, wrap the file paths in backticks (`path/to/file.ext`).\n\nContext:\n{}\n\nPrompt:\n{}\n\n{}",
            context,
            entry.message,
            Self::get_format_prompt(),
        )
    }

    fn create_instruction_prompt(instruction: &str, entry: &LogEntry) -> String {
        let log = serde_json::json!({
            "message": entry.message,
            "timestamp": entry.timestamp.to_rfc3339(),
            "level": entry.level.as_str(),
            "file": entry.file.as_deref().unwrap_or("Unknown"),
            "elk_id": entry.external_id,
        });
        let context = serde_json::to_string_pretty(&log).unwrap_or_else(|_| "{}".to_string());

        format!(
            r#"Analyze this context and provide a detailed solution. When referring to code or files, wrap the file paths in backticks (`path/to/file.ext`).

Context:
{}

Prompt:
{}

Provide response in the following format:
1. Analysis
2. Recommendations (include file paths in backticks where relevant)
3. Code Suggestions (include file paths in backticks)
4. Next Steps"#,
            context,
            instruction.trim(),
        )
    }
}

fn host_name(source: &Map<String, Value>) -> Option<&str> {
    let host = source.get("host")?;
    host.as_str()
        .or_else(|| host.get("hostname").and_then(Value::as_str))
        .or_else(|| host.get("name").and_then(Value::as_str))
}
