//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use filmdesk_agents::AgentError;
use std::fmt;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Argument could not be parsed
    pub fn invalid_argument(what: &str, value: &str, expected: &str) -> Self {
        Self::new(format!("Invalid {}: '{}'", what, value))
            .with_suggestion(format!("TRY: {}", expected))
    }

    pub fn project_not_found(id: &str) -> Self {
        Self::new(format!("Project not found: {}", id))
            .with_context("No project with this ID exists in the database")
            .with_suggestions([
                "TRY: List projects: filmdesk projects list".to_string(),
                "TRY: Create one: filmdesk projects create <name> --type feature".to_string(),
            ])
    }

    pub fn job_not_found(id: &str) -> Self {
        Self::new(format!("Job not found: {}", id))
            .with_suggestion("TRY: List recent jobs: filmdesk jobs list")
    }

    /// Map a library error onto a user-facing one.
    pub fn from_agent(err: AgentError) -> Self {
        match err {
            AgentError::NotFound(what) => Self::new(format!("Not found: {}", what)).with_suggestion(
                "TRY: Check the ID with 'filmdesk projects list' or 'filmdesk grants list'",
            ),
            AgentError::Precondition(msg) => Self::new(msg).with_suggestion(
                "TRY: Inspect the project: filmdesk projects show <id>",
            ),
            AgentError::Validation(msg) => Self::new(msg),
            other => Self::new(other.to_string()),
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// The bare message of an error, without the HelpfulError decoration.
pub fn error_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => helpful.message.clone(),
        None => err.to_string(),
    }
}

/// Print `{"error": message}` on stdout for `--json` callers.
pub fn print_json_error(err: &anyhow::Error) {
    println!("{}", serde_json::json!({ "error": error_message(err) }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While processing data")
            .with_suggestion("Try again");

        let display = format!("{}", err);
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While processing data"));
        assert!(display.contains("Try again"));
    }

    #[test]
    fn test_error_message_strips_decoration() {
        let err: anyhow::Error = HelpfulError::new("Grant feature is off")
            .with_suggestion("TRY: enable it")
            .into();
        assert_eq!(error_message(&err), "Grant feature is off");

        let plain = anyhow::anyhow!("plain failure");
        assert_eq!(error_message(&plain), "plain failure");
    }

    #[test]
    fn test_from_agent_keeps_messages() {
        let err = HelpfulError::from_agent(AgentError::validation(
            "This grant is already in your project matches",
        ));
        assert_eq!(err.message, "This grant is already in your project matches");

        let err = HelpfulError::from_agent(AgentError::NotFound("Project x".into()));
        assert_eq!(err.message, "Not found: Project x");
        assert!(!err.suggestions.is_empty());
    }
}
