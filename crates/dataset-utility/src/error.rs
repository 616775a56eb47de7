//! Error types for the dataset utility engine.
//!
//! Analyzer-level failures never surface through this type: they are captured
//! at the call site and carried forward as failed
//! [`AnalyzerResult`](crate::types::AnalyzerResult)s. Only configuration,
//! input and cancellation problems propagate to the caller.
//!
//! Errors are serializable so a transport layer can forward them as
//! `{code, message}` records.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the analysis pipeline.
#[derive(Error, Debug)]
pub enum UtilityError {
    /// Analysis was cancelled by the caller.
    #[error("Analysis cancelled")]
    Cancelled,

    /// The dataset has no rows or no columns.
    #[error("Dataset is empty: at least one row and one column are required")]
    EmptyDataset,

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The data shape does not allow the requested computation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A single analyzer could not produce a score.
    #[error("Analyzer '{analyzer}' failed: {reason}")]
    AnalyzerFailed { analyzer: String, reason: String },

    /// Too many analyzers failed for the results to be trusted.
    #[error("Analysis aborted: {failed} of {total} analyzers failed")]
    PipelineAborted { failed: usize, total: usize },

    /// Internal error (e.g., worker pool failure).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<UtilityError>,
    },
}

impl UtilityError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        UtilityError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for an analyzer failure.
    pub fn analyzer(analyzer: impl Into<String>, reason: impl Into<String>) -> Self {
        UtilityError::AnalyzerFailed {
            analyzer: analyzer.into(),
            reason: reason.into(),
        }
    }

    /// Stable error code for callers that dispatch on error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::EmptyDataset => "EMPTY_DATASET",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InsufficientData(_) => "INSUFFICIENT_DATA",
            Self::AnalyzerFailed { .. } => "ANALYZER_FAILED",
            Self::PipelineAborted { .. } => "PIPELINE_ABORTED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if this error is recoverable (the caller can fix input and retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::EmptyDataset
                | Self::InvalidConfig(_)
                | Self::ColumnNotFound(_)
        )
    }

    /// Reason text without the analyzer prefix, used when recording failures.
    pub fn reason(&self) -> String {
        match self {
            Self::AnalyzerFailed { reason, .. } => reason.clone(),
            Self::InsufficientData(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}

impl Serialize for UtilityError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("UtilityError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, UtilityError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| UtilityError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(UtilityError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            UtilityError::PipelineAborted { failed: 5, total: 9 }.error_code(),
            "PIPELINE_ABORTED"
        );
        assert_eq!(
            UtilityError::analyzer("outliers", "no numeric columns").error_code(),
            "ANALYZER_FAILED"
        );
    }

    #[test]
    fn test_is_cancelled_through_context() {
        let err = UtilityError::Cancelled.with_context("While running analyzers");
        assert!(err.is_cancelled());
        assert!(!UtilityError::EmptyDataset.is_cancelled());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(UtilityError::EmptyDataset.is_recoverable());
        assert!(UtilityError::InvalidConfig("bad".into()).is_recoverable());
        assert!(!UtilityError::Internal("boom".into()).is_recoverable());
    }

    #[test]
    fn test_reason_strips_analyzer_prefix() {
        let err = UtilityError::analyzer("correlation", "Need at least 2 numeric columns");
        assert_eq!(err.reason(), "Need at least 2 numeric columns");
        assert!(err.to_string().starts_with("Analyzer 'correlation' failed"));
    }

    #[test]
    fn test_error_serialization() {
        let error = UtilityError::ColumnNotFound("income".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("income"));
    }

    #[test]
    fn test_with_context_preserves_code() {
        let error = UtilityError::ColumnNotFound("label".to_string()).with_context("Resolving target");
        assert!(error.to_string().contains("Resolving target"));
        assert_eq!(error.error_code(), "COLUMN_NOT_FOUND");
    }
}
