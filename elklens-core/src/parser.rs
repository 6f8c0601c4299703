//! Turns raw model replies into typed analysis records.
//!
//! Three reply shapes are understood, tried in order:
//! a JSON object (bare or inside a fenced block), the sectioned text formats
//! the prompts ask for (the `ERROR DETECTION` layout and the numbered
//! Analysis / Recommendations / Code Suggestions / Next Steps layout), and
//! finally any other non-blank text, which becomes the analysis narrative
//! with no suggestions.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::classification::{truncate, ErrorClassifier};
use crate::error::{PipelineError, PipelineResult};
use crate::model::{AnalysisResult, EntryRef, LogEntry, Severity};

/// Fields pulled out of a reply before defaults are applied.
#[derive(Debug, Default)]
struct Extracted {
    error_type: Option<String>,
    severity: Option<String>,
    error_message: Option<String>,
    analysis_text: Option<String>,
    suggestions: Vec<String>,
    resolution_steps: Vec<String>,
    code_suggestions: Vec<String>,
    root_cause: Option<String>,
    impact: Option<String>,
    file_location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Section {
    None,
    Detection,
    Analysis,
    Resolution,
    Immediate,
    LongTerm,
    Recommendations,
    CodeSuggestions,
    NextSteps,
}

const SECTION_HEADERS: &[(&str, Section)] = &[
    ("ERROR DETECTION", Section::Detection),
    ("ANALYSIS", Section::Analysis),
    ("RESOLUTION", Section::Resolution),
    ("IMMEDIATE ACTIONS", Section::Immediate),
    ("LONG-TERM SOLUTIONS", Section::LongTerm),
    ("LONG TERM SOLUTIONS", Section::LongTerm),
    ("RECOMMENDATIONS", Section::Recommendations),
    ("CODE SUGGESTIONS", Section::CodeSuggestions),
    ("NEXT STEPS", Section::NextSteps),
];

#[derive(Debug, Clone, Default)]
pub struct ResultParser {
    classifier: ErrorClassifier,
}

impl ResultParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&self, raw: &str, entry_ref: EntryRef, entry: &LogEntry) -> PipelineResult<AnalysisResult> {
        let text = raw.trim();
        if text.is_empty() {
            warn!("Model returned an empty reply for entry {}", entry_ref);
            return Err(PipelineError::Parse {
                entry: entry_ref.0,
                message: "reply contains no usable text".to_string(),
            });
        }

        let extracted = if let Some(extracted) = parse_json(text) {
            debug!("Parsed JSON reply for entry {}", entry_ref);
            extracted
        } else if let Some(extracted) = parse_sectioned(text) {
            debug!("Parsed sectioned reply for entry {}", entry_ref);
            extracted
        } else {
            debug!("Unstructured reply for entry {}, keeping it as narrative", entry_ref);
            Extracted::default()
        };

        Ok(self.finish(extracted, text, entry_ref, entry))
    }

    fn finish(&self, extracted: Extracted, text: &str, entry_ref: EntryRef, entry: &LogEntry) -> AnalysisResult {
        let classification = self.classifier.classify(&entry.message);

        // Model-stated severity wins over the entry's level
        let severity = extracted
            .severity
            .as_deref()
            .and_then(Severity::parse_label)
            .unwrap_or_else(|| Severity::from_level(&entry.level));

        AnalysisResult {
            entry_ref,
            error_type: extracted.error_type.unwrap_or(classification.error_type),
            severity,
            error_message: extracted
                .error_message
                .map(|m| truncate(&m))
                .unwrap_or(classification.error_message),
            analysis_text: extracted.analysis_text.unwrap_or_else(|| text.to_string()),
            suggestions: extracted.suggestions,
            resolution_steps: extracted.resolution_steps,
            code_suggestions: extracted.code_suggestions,
            root_cause: extracted.root_cause,
            impact: extracted.impact,
            file_location: extracted.file_location,
            needs_immediate_attention: severity == Severity::High,
        }
    }
}

fn parse_json(text: &str) -> Option<Extracted> {
    let body = fenced_json(text).unwrap_or(text);
    let map = match serde_json::from_str::<Value>(body.trim()) {
        Ok(Value::Object(map)) => map,
        _ => return None,
    };

    Some(Extracted {
        error_type: string_field(&map, &["error_type", "type"]),
        severity: string_field(&map, &["severity"]),
        error_message: string_field(&map, &["error_message", "description"]),
        analysis_text: string_field(&map, &["analysis", "analysis_text", "summary"]),
        suggestions: list_field(&map, &["suggestions", "immediate_actions", "recommendations"]),
        resolution_steps: list_field(&map, &["resolution_steps", "long_term_solutions", "next_steps"]),
        code_suggestions: list_field(&map, &["code_suggestions"]),
        root_cause: string_field(&map, &["root_cause"]),
        impact: string_field(&map, &["impact"]),
        file_location: string_field(&map, &["file_location"]).filter(|f| is_known(f)),
    })
}

fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(&rest[..end])
}

fn string_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find_map(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
}

fn list_field(map: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find_map(|v| match v {
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            Value::String(s) if !s.trim().is_empty() => Some(vec![s.trim().to_string()]),
            _ => None,
        })
        .unwrap_or_default()
}

/// Returns `None` when no recognizable field, bullet or analysis narrative
/// was found.
fn parse_sectioned(text: &str) -> Option<Extracted> {
    let mut out = Extracted::default();
    let mut section = Section::None;
    let mut recognized = false;
    let mut narrative: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = clean_line(line);
        if line.is_empty() {
            continue;
        }

        if let Some((header, inline)) = section_header(&line) {
            section = header;
            if matches!(
                header,
                Section::Immediate | Section::LongTerm | Section::Recommendations | Section::CodeSuggestions | Section::NextSteps
            ) {
                recognized = true;
            }
            match header {
                Section::Analysis if !inline.is_empty() => narrative.push(inline.to_string()),
                _ => {}
            }
            continue;
        }

        if let Some(item) = bullet(&line) {
            match section {
                Section::Immediate | Section::Recommendations => out.suggestions.push(item.to_string()),
                Section::LongTerm | Section::NextSteps => out.resolution_steps.push(item.to_string()),
                Section::CodeSuggestions => out.code_suggestions.push(item.to_string()),
                Section::Analysis => narrative.push(line.clone()),
                _ => {}
            }
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim();
            let slot = match key.trim().to_uppercase().as_str() {
                "TYPE" | "ERROR TYPE" => Some(&mut out.error_type),
                "DESCRIPTION" => Some(&mut out.error_message),
                "FILE LOCATION" if is_known(value) => Some(&mut out.file_location),
                "FILE LOCATION" => continue,
                "SEVERITY" => Some(&mut out.severity),
                "IMPACT" => Some(&mut out.impact),
                "ROOT CAUSE" => Some(&mut out.root_cause),
                _ => None,
            };
            if let Some(slot) = slot {
                if !value.is_empty() {
                    *slot = Some(value.to_string());
                    recognized = true;
                }
                continue;
            }
        }

        if section == Section::Analysis {
            narrative.push(line);
        }
    }

    if !narrative.is_empty() {
        out.analysis_text = Some(narrative.join("\n"));
        recognized = true;
    }

    recognized.then_some(out)
}

/// Matches `Analysis`, `ANALYSIS:` or `2. Next Steps` style headings and
/// returns any text following the colon.
fn section_header(line: &str) -> Option<(Section, &str)> {
    let heading = strip_numbering(line);
    SECTION_HEADERS.iter().find_map(|(name, section)| {
        let prefix = heading.get(..name.len())?;
        if !prefix.eq_ignore_ascii_case(name) {
            return None;
        }
        let rest = heading[name.len()..].trim_start();
        if rest.is_empty() {
            return Some((*section, ""));
        }
        if let Some(inline) = rest.strip_prefix(':') {
            return Some((*section, inline.trim()));
        }
        // Parenthesized hints such as "Recommendations (include file paths)"
        rest.starts_with('(').then_some((*section, ""))
    })
}

fn strip_numbering(line: &str) -> &str {
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == line.len() {
        return line;
    }
    rest.strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .map(str::trim_start)
        .unwrap_or(line)
}

/// Strips markdown emphasis and heading markers models like to add.
fn clean_line(line: &str) -> String {
    line.replace("**", "")
        .trim()
        .trim_start_matches('#')
        .trim()
        .to_string()
}

fn bullet(line: &str) -> Option<&str> {
    let item = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix('•'))?
        .trim();
    (!item.is_empty()).then_some(item)
}

fn is_known(location: &str) -> bool {
    let lower = location.trim().to_lowercase();
    !lower.is_empty() && !lower.starts_with("unknown") && lower != "n/a"
}
