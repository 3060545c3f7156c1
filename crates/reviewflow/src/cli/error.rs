//! Helpful error types for CLI commands
//!
//! Every error carries what went wrong, what was happening, and how to fix it.

use reviewflow::PipelineError;
use reviewflow_schema::SchemaError;
use reviewflow_store::StoreError;
use std::fmt;
use std::path::Path;

/// An error with context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
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

    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    pub fn invalid_config(path: &Path, reason: &str) -> Self {
        Self::new(format!("Invalid configuration: {}", reason))
            .with_context(format!("While loading {}", path.display()))
            .with_suggestions([
                format!("TRY: Fix the value in {}", path.display()),
                "TRY: Regenerate a default file with: reviewflow init --force".to_string(),
            ])
    }

    pub fn missing_columns(table: &str, missing: &[String]) -> Self {
        Self::new(format!("Table '{}' is missing columns: {}", table, missing.join(", ")))
            .with_context("Every review table must carry the full set of registry columns")
            .with_suggestions([
                "TRY: Add the missing columns to the table header".to_string(),
                "TRY: Create fresh local tables with: reviewflow init".to_string(),
            ])
    }

    pub fn table_not_found(table: &str) -> Self {
        Self::new(format!("Table not found: {}", table))
            .with_context("The configured table does not exist in the table store")
            .with_suggestions([
                "TRY: Create the local tables with: reviewflow init".to_string(),
                "TRY: Check the [tables] section of the config file".to_string(),
            ])
    }

    pub fn archive_running() -> Self {
        Self::new("An archive run is already in progress")
            .with_suggestion("TRY: Wait for the current run to finish, then retry")
    }

    pub fn invalid_filter(kind: &str, value: &str, valid: &[&str]) -> Self {
        Self::new(format!("Unknown {}: '{}'", kind, value))
            .with_suggestion(format!("TRY: Use one of: {}", valid.join(", ")))
    }

    /// Hint for a known pipeline failure, if there is one.
    pub fn from_pipeline(err: &PipelineError) -> Option<Self> {
        match err {
            PipelineError::Schema(SchemaError::MissingColumns { table, missing }) => {
                Some(Self::missing_columns(table, missing))
            }
            PipelineError::Store(StoreError::NotFound(what)) => Some(Self::table_not_found(what)),
            PipelineError::ArchiveAlreadyRunning => Some(Self::archive_running()),
            _ => None,
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

/// Render a command failure for stderr.
pub fn render(err: &anyhow::Error) -> String {
    if let Some(helpful) = err.downcast_ref::<HelpfulError>() {
        return helpful.to_string();
    }
    if let Some(helpful) = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<PipelineError>())
        .and_then(HelpfulError::from_pipeline)
    {
        return helpful.to_string();
    }
    format!("ERROR: {:#}", err)
}
