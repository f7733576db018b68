//! Error types for schema parsing, statistics and transforms

use std::io;
use thiserror::Error;

/// Feature pipeline error type.
///
/// Every variant is terminal for the invocation that raised it. Nothing is
/// auto-corrected: an unknown category never falls back to a default score.
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Cannot read names source: {0}")]
    SchemaIo(#[source] io::Error),

    #[error("Malformed names description: {0}")]
    MalformedSchema(String),

    #[error("Invalid target encoding for '{target}': {reason}")]
    InvalidTargetEncoding { target: String, reason: String },

    #[error("Degenerate statistics for feature '{feature}': no non-missing value observed")]
    DegenerateStatistics { feature: String },

    #[error("Undefined correlation for feature '{feature}': {reason}")]
    UndefinedCorrelation { feature: String, reason: String },

    #[error("Schema mismatch{}: {detail}", location(.line, .feature))]
    SchemaMismatch {
        line: Option<usize>,
        feature: Option<String>,
        detail: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FeatureError {
    pub(crate) fn mismatch(
        line: Option<usize>,
        feature: Option<&str>,
        detail: impl Into<String>,
    ) -> Self {
        FeatureError::SchemaMismatch {
            line,
            feature: feature.map(str::to_string),
            detail: detail.into(),
        }
    }

    /// Attach a line number to a row-level mismatch raised without one.
    pub(crate) fn at_line(self, line_no: usize) -> Self {
        match self {
            FeatureError::SchemaMismatch {
                line: None,
                feature,
                detail,
            } => FeatureError::SchemaMismatch {
                line: Some(line_no),
                feature,
                detail,
            },
            other => other,
        }
    }
}

fn location(line: &Option<usize>, feature: &Option<String>) -> String {
    match (line, feature) {
        (Some(line), Some(feature)) => format!(" at line {} (feature '{}')", line, feature),
        (Some(line), None) => format!(" at line {}", line),
        (None, Some(feature)) => format!(" (feature '{}')", feature),
        (None, None) => String::new(),
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, FeatureError>;
