//! Helpful error types for CLI commands
//!
//! Every error carries what went wrong, where, and what to try next.

use serde::Serialize;
use std::fmt;
use std::path::Path;
use tmc_features::FeatureError;

/// An error with helpful context and suggestions
#[derive(Debug, Serialize)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    #[serde(skip_serializing_if = "Vec::is_empty")]
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
        self.suggestions.extend(suggestions.into_iter().map(Into::into));
        self
    }

    // === Common error constructors ===

    /// File does not exist
    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_context("The specified file does not exist")
            .with_suggestions([
                format!("TRY: Check if the file exists: ls -la {}", path.display()),
                format!(
                    "TRY: Look for similar files: ls {}",
                    parent_display(path)
                ),
            ])
    }

    /// Names file could not be turned into a schema
    pub fn names_error(path: &Path, err: &FeatureError) -> Self {
        if let FeatureError::SchemaIo(io) = err {
            if io.kind() == std::io::ErrorKind::NotFound {
                return Self::file_not_found(path);
            }
        }
        Self::new(err.to_string())
            .with_context(format!("Failed to parse names file: {}", path.display()))
            .with_suggestions([
                "TRY: The first non-comment line names the target: `label1, label2.` or `target.`"
                    .to_string(),
                "TRY: Every other line reads `name: continuous.` or `name: v1, v2, v3.`"
                    .to_string(),
                format!("TRY: Inspect the file: tmc names {}", path.display()),
            ])
    }

    /// Target labels could not be mapped onto 0/1
    pub fn encoding_error(names: &Path, err: &FeatureError) -> Self {
        Self::new(err.to_string())
            .with_context(format!("Target declared in {}", names.display()))
            .with_suggestions([
                "TRY: Pick the labels explicitly: --negative <LABEL> --positive <LABEL>".to_string(),
                "TRY: Set [target] negative/positive in config.toml".to_string(),
                "TRY: The target must declare exactly two distinct labels".to_string(),
            ])
    }

    /// Data file disagrees with the names file or a rule cannot be derived
    pub fn data_error(data: &Path, names: &Path, err: &FeatureError) -> Self {
        if let FeatureError::Io(io) = err {
            if io.kind() == std::io::ErrorKind::NotFound {
                return Self::file_not_found(data);
            }
        }
        let mut helpful = Self::new(err.to_string()).with_context(format!(
            "Processing {} against {}",
            data.display(),
            names.display()
        ));
        match err {
            FeatureError::SchemaMismatch { line: Some(line), .. } => {
                helpful = helpful.with_suggestions([
                    format!(
                        "TRY: Inspect the row: sed -n '{}p' {}",
                        line,
                        data.display()
                    ),
                    "TRY: Declare every category value in the names file".to_string(),
                    "TRY: Use `?` for missing values".to_string(),
                ]);
            }
            FeatureError::SchemaMismatch { .. } => {
                helpful = helpful
                    .with_suggestion("TRY: Check that each row has one field per declared feature");
            }
            FeatureError::DegenerateStatistics { feature } => {
                helpful = helpful.with_suggestion(format!(
                    "TRY: Declare '{}' as `ignore` or supply rows where it is present",
                    feature
                ));
            }
            FeatureError::UndefinedCorrelation { feature, .. } => {
                helpful = helpful.with_suggestions([
                    format!("TRY: Declare '{}' as `ignore` in the names file", feature),
                    "TRY: Pass --ignore-below 0 to drop constant features".to_string(),
                ]);
            }
            _ => {}
        }
        helpful
    }
}

fn parent_display(path: &Path) -> String {
    path.parent()
        .map(|p| p.display().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| ".".to_string())
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

/// Print an error as a single JSON object on stdout.
pub fn print_json_error(err: &anyhow::Error) {
    let body = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({ "error": helpful }),
        None => serde_json::json!({ "error": { "message": format!("{:#}", err) } }),
    };
    match serde_json::to_string_pretty(&body) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{{\"error\":{{\"message\":\"unserializable error\"}}}}"),
    }
}
