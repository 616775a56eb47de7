//! Configuration types for an analysis request.
//!
//! Request options use the builder pattern; the static persona and lens
//! tables live in [`ScoringCatalog`](crate::catalog::ScoringCatalog).

use crate::types::AnalyzerKind;
use crate::utils::{is_integer_dtype, is_numeric_dtype, is_temporal_dtype, is_text_dtype};
use crate::validation::ValidationRules;
use polars::prelude::DataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How much of the analyzer bank to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    /// Integrity analyzers only (completeness, duplicates, type consistency)
    Basic,
    /// Integrity plus statistical analyzers (outliers, class balance, correlation)
    Standard,
    /// Every analyzer, including the model-based ones
    #[default]
    Complete,
}

impl AnalysisDepth {
    /// Whether an analyzer belongs to this depth.
    pub fn includes(&self, kind: AnalyzerKind) -> bool {
        match self {
            Self::Basic => kind.is_integrity(),
            Self::Standard => !kind.is_model_based(),
            Self::Complete => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Complete => "complete",
        }
    }
}

/// Outlier detection sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    /// Absolute z-score above which a value is flagged.
    pub fn zscore_threshold(&self) -> f64 {
        match self {
            Self::Low => 3.5,
            Self::Medium => 3.0,
            Self::High => 2.5,
        }
    }

    /// IQR fence multiplier.
    pub fn iqr_multiplier(&self) -> f64 {
        match self {
            Self::Low => 2.0,
            Self::Medium => 1.5,
            Self::High => 1.0,
        }
    }
}

/// Declared column type checked by the type consistency analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedType {
    Numeric,
    Integer,
    Float,
    String,
    Boolean,
    Datetime,
}

impl ExpectedType {
    /// Whether a physical dtype satisfies this declaration.
    pub fn matches(&self, dtype: &DataType) -> bool {
        match self {
            Self::Numeric => is_numeric_dtype(dtype),
            Self::Integer => is_integer_dtype(dtype),
            Self::Float => matches!(dtype, DataType::Float32 | DataType::Float64),
            Self::String => is_text_dtype(dtype),
            Self::Boolean => matches!(dtype, DataType::Boolean),
            Self::Datetime => is_temporal_dtype(dtype),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
        }
    }
}

/// Options for one analysis request.
///
/// Use [`AnalysisConfig::builder()`] to create a configuration with the
/// fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use dataset_utility::config::{AnalysisConfig, AnalysisDepth, Sensitivity};
///
/// let config = AnalysisConfig::builder()
///     .analysis_depth(AnalysisDepth::Standard)
///     .outlier_sensitivity(Sensitivity::High)
///     .target_column("label")
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Which analyzers run.
    /// Default: Complete
    pub analysis_depth: AnalysisDepth,

    /// Explicit supervised target. Auto-detected when None.
    /// Default: None
    pub target_column: Option<String>,

    /// Outlier detection sensitivity.
    /// Default: Medium
    pub outlier_sensitivity: Sensitivity,

    /// Absolute Pearson correlation considered "high" (0.0 - 1.0].
    /// Default: 0.8
    pub correlation_threshold: f64,

    /// Declared column types checked by the type consistency analyzer.
    /// Default: empty
    pub expected_types: BTreeMap<String, ExpectedType>,

    /// Restrict duplicate detection to these columns.
    /// Default: None (whole rows)
    pub duplicate_subset: Option<Vec<String>>,

    /// Run analyzers on the rayon thread pool.
    /// Default: true
    pub parallel: bool,

    /// Row count above which baseline ML and separability are skipped.
    /// Default: 10_000
    pub large_dataset_rows: usize,

    /// Seed for every stochastic sub-model (splits, forests).
    /// Default: 42
    pub random_seed: u64,

    /// Optional declarative validation rules evaluated alongside the analysis.
    /// Default: None
    pub validation_rules: Option<ValidationRules>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            analysis_depth: AnalysisDepth::default(),
            target_column: None,
            outlier_sensitivity: Sensitivity::default(),
            correlation_threshold: 0.8,
            expected_types: BTreeMap::new(),
            duplicate_subset: None,
            parallel: true,
            large_dataset_rows: 10_000,
            random_seed: 42,
            validation_rules: None,
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.correlation_threshold > 0.0 && self.correlation_threshold <= 1.0) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "correlation_threshold".to_string(),
                value: self.correlation_threshold,
            });
        }

        if self.large_dataset_rows == 0 {
            return Err(ConfigValidationError::InvalidRowLimit(self.large_dataset_rows));
        }

        if let Some(subset) = &self.duplicate_subset
            && subset.is_empty()
        {
            return Err(ConfigValidationError::EmptyDuplicateSubset);
        }

        if let Some(rules) = &self.validation_rules {
            rules.validate()?;
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
///
/// Catalog problems (malformed persona predicates or scoring lenses) are
/// reported here too, at construction time rather than per request.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value}")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid large dataset row limit: {0} (must be at least 1)")]
    InvalidRowLimit(usize),

    #[error("Duplicate subset must name at least one column")]
    EmptyDuplicateSubset,

    #[error("Persona rule '{persona}' predicate on '{characteristic}' is malformed: {reason}")]
    MalformedPredicate {
        persona: String,
        characteristic: String,
        reason: String,
    },

    #[error("Persona rule '{persona}' is malformed: {reason}")]
    MalformedPersonaRule { persona: String, reason: String },

    #[error("Scoring lens '{lens}' is malformed: {reason}")]
    MalformedLens { lens: String, reason: String },

    #[error("Catalog defines '{0}' more than once")]
    DuplicateEntry(String),

    #[error("Catalog has no {0}")]
    EmptyCatalog(&'static str),

    #[error("Validation rule '{rule}' is malformed: {reason}")]
    MalformedValidationRule { rule: String, reason: String },

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Builder for [`AnalysisConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    analysis_depth: Option<AnalysisDepth>,
    target_column: Option<String>,
    outlier_sensitivity: Option<Sensitivity>,
    correlation_threshold: Option<f64>,
    expected_types: BTreeMap<String, ExpectedType>,
    duplicate_subset: Option<Vec<String>>,
    parallel: Option<bool>,
    large_dataset_rows: Option<usize>,
    random_seed: Option<u64>,
    validation_rules: Option<ValidationRules>,
}

impl AnalysisConfigBuilder {
    /// Set how much of the analyzer bank runs.
    pub fn analysis_depth(mut self, depth: AnalysisDepth) -> Self {
        self.analysis_depth = Some(depth);
        self
    }

    /// Set an explicit target column.
    ///
    /// If not set, the target is auto-detected from the column names.
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    pub fn outlier_sensitivity(mut self, sensitivity: Sensitivity) -> Self {
        self.outlier_sensitivity = Some(sensitivity);
        self
    }

    /// Set the absolute correlation considered "high".
    ///
    /// # Arguments
    /// * `threshold` - Value in (0.0, 1.0] (e.g., 0.8)
    pub fn correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = Some(threshold);
        self
    }

    /// Declare the expected type of a column.
    pub fn expected_type(mut self, column: impl Into<String>, expected: ExpectedType) -> Self {
        self.expected_types.insert(column.into(), expected);
        self
    }

    /// Restrict duplicate detection to a column subset.
    pub fn duplicate_subset<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.duplicate_subset = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Enable or disable parallel analyzer execution.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    pub fn large_dataset_rows(mut self, rows: usize) -> Self {
        self.large_dataset_rows = Some(rows);
        self
    }

    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    pub fn validation_rules(mut self, rules: ValidationRules) -> Self {
        self.validation_rules = Some(rules);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AnalysisConfig` or an error if validation fails.
    pub fn build(self) -> Result<AnalysisConfig, ConfigValidationError> {
        let defaults = AnalysisConfig::default();
        let config = AnalysisConfig {
            analysis_depth: self.analysis_depth.unwrap_or_default(),
            target_column: self.target_column,
            outlier_sensitivity: self.outlier_sensitivity.unwrap_or_default(),
            correlation_threshold: self
                .correlation_threshold
                .unwrap_or(defaults.correlation_threshold),
            expected_types: self.expected_types,
            duplicate_subset: self.duplicate_subset,
            parallel: self.parallel.unwrap_or(defaults.parallel),
            large_dataset_rows: self
                .large_dataset_rows
                .unwrap_or(defaults.large_dataset_rows),
            random_seed: self.random_seed.unwrap_or(defaults.random_seed),
            validation_rules: self.validation_rules,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.analysis_depth, AnalysisDepth::Complete);
        assert_eq!(config.outlier_sensitivity, Sensitivity::Medium);
        assert_eq!(config.correlation_threshold, 0.8);
        assert_eq!(config.large_dataset_rows, 10_000);
        assert_eq!(config.random_seed, 42);
        assert!(config.parallel);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AnalysisConfig::builder()
            .analysis_depth(AnalysisDepth::Basic)
            .target_column("label")
            .outlier_sensitivity(Sensitivity::High)
            .correlation_threshold(0.9)
            .expected_type("age", ExpectedType::Integer)
            .duplicate_subset(["id"])
            .parallel(false)
            .build()
            .unwrap();

        assert_eq!(config.analysis_depth, AnalysisDepth::Basic);
        assert_eq!(config.target_column.as_deref(), Some("label"));
        assert_eq!(config.correlation_threshold, 0.9);
        assert_eq!(config.expected_types["age"], ExpectedType::Integer);
        assert_eq!(config.duplicate_subset, Some(vec!["id".to_string()]));
        assert!(!config.parallel);
    }

    #[test]
    fn test_validation_invalid_correlation_threshold() {
        let result = AnalysisConfig::builder().correlation_threshold(1.5).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));

        let result = AnalysisConfig::builder().correlation_threshold(0.0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_empty_subset() {
        let result = AnalysisConfig::builder()
            .duplicate_subset(Vec::<String>::new())
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyDuplicateSubset
        ));
    }

    #[test]
    fn test_depth_includes() {
        assert!(AnalysisDepth::Basic.includes(AnalyzerKind::Completeness));
        assert!(!AnalysisDepth::Basic.includes(AnalyzerKind::Outliers));
        assert!(AnalysisDepth::Standard.includes(AnalyzerKind::Correlation));
        assert!(!AnalysisDepth::Standard.includes(AnalyzerKind::BaselineMl));
        assert!(AnalysisDepth::Complete.includes(AnalyzerKind::Separability));
    }

    #[test]
    fn test_sensitivity_thresholds() {
        assert_eq!(Sensitivity::Low.zscore_threshold(), 3.5);
        assert_eq!(Sensitivity::Medium.iqr_multiplier(), 1.5);
        assert_eq!(Sensitivity::High.iqr_multiplier(), 1.0);
    }

    #[test]
    fn test_expected_type_matches() {
        assert!(ExpectedType::Numeric.matches(&DataType::Int32));
        assert!(ExpectedType::Integer.matches(&DataType::Int64));
        assert!(!ExpectedType::Integer.matches(&DataType::Float64));
        assert!(ExpectedType::String.matches(&DataType::String));
        assert!(!ExpectedType::Boolean.matches(&DataType::String));
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "analysis_depth": "standard",
            "target_column": "fraud",
            "outlier_sensitivity": "low",
            "correlation_threshold": 0.85,
            "expected_types": {"amount": "float"},
            "parallel": false
        }"#;

        let config: AnalysisConfig =
            serde_json::from_str(json).expect("Should deserialize from JSON");

        assert_eq!(config.analysis_depth, AnalysisDepth::Standard);
        assert_eq!(config.target_column.as_deref(), Some("fraud"));
        assert_eq!(config.outlier_sensitivity, Sensitivity::Low);
        assert_eq!(config.expected_types["amount"], ExpectedType::Float);
        assert!(!config.parallel);
        // Unspecified fields fall back to defaults
        assert_eq!(config.random_seed, 42);
        assert!(config.validate().is_ok());
    }
}
