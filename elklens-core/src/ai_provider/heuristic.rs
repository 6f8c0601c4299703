use crate::ai_provider::{AIError, AnalysisPrompt, ReasoningService};
use crate::classification::ErrorClassifier;
use crate::model::Severity;

/// Offline reasoning service. Answers in the same sectioned format the remote
/// models are asked for, using the regex classifier and a fixed playbook.
pub struct HeuristicProvider {
    classifier: ErrorClassifier,
}

impl Default for HeuristicProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicProvider {
    pub fn new() -> Self {
        Self {
            classifier: ErrorClassifier::new(),
        }
    }

    /// Reply in the numbered layout requested for instruction prompts.
    fn instruction_reply(
        error_type: &str,
        error_message: &str,
        file: Option<&str>,
        root_cause: &str,
        immediate: &[&str],
        long_term: &[&str],
    ) -> String {
        let mut out = String::from("1. Analysis\n");
        out.push_str(&format!("{}: {}. {}.\n\n", error_type, error_message, root_cause));

        out.push_str("2. Recommendations\n");
        for action in immediate {
            out.push_str(&format!("- {}\n", action));
        }

        out.push_str("\n3. Code Suggestions\n");
        match file {
            Some(file) => out.push_str(&format!("- Guard the failing call in `{}`\n", file)),
            None => out.push_str("- Log the failing call site with its inputs\n"),
        }

        out.push_str("\n4. Next Steps\n");
        for step in long_term {
            out.push_str(&format!("- {}\n", step));
        }
        out
    }

    fn playbook(error_type: &str) -> (&'static str, &'static [&'static str], &'static [&'static str]) {
        match error_type {
            "Database Error" => (
                "The application could not complete a database operation",
                &[
                    "Check that the database server is reachable from the application host",
                    "Verify the connection credentials and database name",
                ],
                &["Add connection pooling with health checks", "Alert on database availability"],
            ),
            "Authentication Error" => (
                "A credential or permission check was rejected",
                &[
                    "Verify the credentials or token used by the failing component",
                    "Check recent permission changes for the affected account",
                ],
                &["Rotate credentials through a secrets manager", "Audit role assignments"],
            ),
            "Connection Error" => (
                "A downstream service refused or dropped the connection",
                &[
                    "Confirm the target service is running and listening",
                    "Check firewall rules and DNS resolution between the hosts",
                ],
                &["Add retries with backoff for the outbound call", "Monitor the dependency's uptime"],
            ),
            "Application Error" => (
                "An unhandled exception escaped application code",
                &["Reproduce with the logged input", "Inspect the stack trace around the reported file"],
                &["Add a regression test for the failing path"],
            ),
            "HTTP Error" => (
                "A request failed with an error status",
                &["Check the route and request parameters", "Inspect the upstream response body"],
                &["Add monitoring for error-rate spikes on this endpoint"],
            ),
            _ => (
                "The log message does not match a known failure pattern",
                &["Review the surrounding log lines for context"],
                &["Add structured context to this log statement"],
            ),
        }
    }
}

#[async_trait::async_trait]
impl ReasoningService for HeuristicProvider {
    async fn complete(&self, prompt: &AnalysisPrompt) -> Result<String, AIError> {
        let classification = self.classifier.classify(&prompt.message);
        let severity = Severity::from_level(&prompt.level);
        let (root_cause, immediate, long_term) = Self::playbook(&classification.error_type);

        if prompt.instruction.is_some() {
            return Ok(Self::instruction_reply(
                &classification.error_type,
                &classification.error_message,
                prompt.file.as_deref(),
                root_cause,
                immediate,
                long_term,
            ));
        }

        let mut out = String::new();
        out.push_str("ERROR DETECTION\n");
        out.push_str(&format!("Type: {}\n", classification.error_type));
        out.push_str(&format!("Status Code: {}\n", classification.status_code));
        out.push_str(&format!("Description: {}\n", classification.error_message));
        out.push_str(&format!(
            "File Location: {}\n\n",
            prompt.file.as_deref().unwrap_or("Unknown")
        ));

        out.push_str("ANALYSIS\n");
        out.push_str(&format!("Severity: {}\n", severity.as_str().to_uppercase()));
        out.push_str(&format!("Impact: {} severity {}\n", severity, classification.error_type.to_lowercase()));
        out.push_str(&format!("Root Cause: {}\n\n", root_cause));

        out.push_str("RESOLUTION\nImmediate Actions:\n");
        for action in immediate {
            out.push_str(&format!("- {}\n", action));
        }
        out.push_str("\nLong-term Solutions:\n");
        for solution in long_term {
            out.push_str(&format!("- {}\n", solution));
        }
        Ok(out)
    }

    fn provider_name(&self) -> &str {
        "heuristic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntryRef, Level};

    fn prompt(message: &str, level: Level) -> AnalysisPrompt {
        AnalysisPrompt {
            entry_ref: EntryRef(0),
            system: String::new(),
            user: String::new(),
            message: message.to_string(),
            level,
            file: Some("/path/to/file.php".to_string()),
            instruction: None,
        }
    }

    #[tokio::test]
    async fn test_answers_in_sectioned_format() {
        let provider = HeuristicProvider::new();
        let text = provider
            .complete(&prompt("Connection refused", Level::Error))
            .await
            .unwrap();
        assert!(text.contains("Type: Connection Error"));
        assert!(text.contains("Severity: HIGH"));
        assert!(text.contains("File Location: /path/to/file.php"));
        assert!(text.contains("Immediate Actions:\n- Confirm the target service"));
    }

    #[tokio::test]
    async fn test_warning_is_medium() {
        let provider = HeuristicProvider::new();
        let text = provider
            .complete(&prompt("disk almost full", Level::Warning))
            .await
            .unwrap();
        assert!(text.contains("Type: Unknown Error"));
        assert!(text.contains("Severity: MEDIUM"));
    }

    #[tokio::test]
    async fn test_instruction_gets_numbered_layout() {
        let provider = HeuristicProvider::new();
        let mut request = prompt("Connection refused", Level::Error);
        request.instruction = Some("What broke?".to_string());

        let text = provider.complete(&request).await.unwrap();
        assert!(text.starts_with("1. Analysis\nConnection Error: "));
        assert!(text.contains("2. Recommendations\n- Confirm the target service"));
        assert!(text.contains("3. Code Suggestions\n- Guard the failing call in `/path/to/file.php`"));
        assert!(text.contains("4. Next Steps\n- Add retries with backoff"));
        assert!(!text.contains("ERROR DETECTION"));
    }
}
