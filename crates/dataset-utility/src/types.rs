use crate::analyzers::{AnalyzerMetrics, AnalyzerOutput};
use crate::characteristics::Characteristics;
use crate::config::AnalysisDepth;
use crate::dataset::DatasetOverview;
use crate::error::UtilityError;
use crate::personas::PersonaAnalysis;
use crate::scoring::ContextualScoring;
use crate::synthesis::SynthesisResult;
use crate::validation::ValidationReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version of the [`AnalysisReport`] layout.
pub const REPORT_SCHEMA_VERSION: &str = "1.0";

// ============================================================================
// Analyzer identity
// ============================================================================

/// The foundational analyzers, in execution and report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    Completeness,
    Duplicates,
    TypeConsistency,
    Outliers,
    ClassBalance,
    Correlation,
    BaselineMl,
    FeatureImportance,
    Separability,
}

impl AnalyzerKind {
    pub const ALL: [AnalyzerKind; 9] = [
        Self::Completeness,
        Self::Duplicates,
        Self::TypeConsistency,
        Self::Outliers,
        Self::ClassBalance,
        Self::Correlation,
        Self::BaselineMl,
        Self::FeatureImportance,
        Self::Separability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completeness => "completeness",
            Self::Duplicates => "duplicates",
            Self::TypeConsistency => "type_consistency",
            Self::Outliers => "outliers",
            Self::ClassBalance => "class_balance",
            Self::Correlation => "correlation",
            Self::BaselineMl => "baseline_ml",
            Self::FeatureImportance => "feature_importance",
            Self::Separability => "separability",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Completeness => "Completeness",
            Self::Duplicates => "Duplicate Records",
            Self::TypeConsistency => "Type Consistency",
            Self::Outliers => "Outlier Detection",
            Self::ClassBalance => "Class Balance",
            Self::Correlation => "Feature Correlation",
            Self::BaselineMl => "Baseline ML Performance",
            Self::FeatureImportance => "Feature Importance",
            Self::Separability => "Class Separability",
        }
    }

    /// The three analyzers blended into the data integrity score.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::Completeness | Self::Duplicates | Self::TypeConsistency
        )
    }

    /// Analyzers that fit models and only run at `complete` depth.
    pub fn is_model_based(&self) -> bool {
        matches!(
            self,
            Self::BaselineMl | Self::FeatureImportance | Self::Separability
        )
    }

    /// Analyzers skipped above the large-dataset row limit.
    pub fn is_expensive(&self) -> bool {
        matches!(self, Self::BaselineMl | Self::Separability)
    }

    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            Self::ClassBalance | Self::BaselineMl | Self::FeatureImportance | Self::Separability
        )
    }
}

impl std::fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Analyzer results
// ============================================================================

/// Outcome of one analyzer for one request. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerResult {
    pub analyzer: AnalyzerKind,
    pub success: bool,
    /// False when the data shape rules the analyzer out (no numeric columns,
    /// no target, dataset too large). Such results do not count towards the
    /// abort ratio.
    pub applicable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<AnalyzerMetrics>,
    pub recommendations: Vec<String>,
    pub critical_issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalyzerResult {
    pub fn from_output(analyzer: AnalyzerKind, output: AnalyzerOutput) -> Self {
        Self {
            analyzer,
            success: true,
            applicable: true,
            score: Some(output.score),
            metrics: Some(output.metrics),
            recommendations: output.recommendations,
            critical_issues: output.critical_issues,
            error: None,
        }
    }

    /// The analyzer could not run on this data shape.
    pub fn not_applicable(analyzer: AnalyzerKind, reason: impl Into<String>) -> Self {
        Self {
            analyzer,
            success: false,
            applicable: false,
            score: None,
            metrics: None,
            recommendations: Vec::new(),
            critical_issues: Vec::new(),
            error: Some(reason.into()),
        }
    }

    /// The analyzer ran and failed.
    pub fn failed(analyzer: AnalyzerKind, reason: impl Into<String>) -> Self {
        Self {
            applicable: true,
            ..Self::not_applicable(analyzer, reason)
        }
    }

    /// Convert an analyzer error into a result record.
    pub fn from_error(analyzer: AnalyzerKind, error: &UtilityError) -> Self {
        match error {
            UtilityError::InsufficientData(reason) => Self::not_applicable(analyzer, reason.clone()),
            other => Self::failed(analyzer, other.reason()),
        }
    }

    /// Score when the analyzer succeeded.
    pub fn score(&self) -> Option<f64> {
        if self.success { self.score } else { None }
    }
}

// ============================================================================
// Final report
// ============================================================================

/// Everything one `analyze` call produces.
///
/// Successful and aborted runs share this shape; an aborted run has
/// `success = false`, zero scores and a non-empty `errors` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub schema_version: String,
    pub success: bool,
    pub analysis_depth: AnalysisDepth,
    pub target_column: Option<String>,
    pub dataset_overview: DatasetOverview,
    pub duration_ms: u64,

    /// Keyed by analyzer name (`completeness`, `duplicates`, ...).
    pub raw_analyzer_outputs: BTreeMap<String, AnalyzerResult>,
    pub characteristics: Option<Characteristics>,
    pub persona_analysis: Option<PersonaAnalysis>,
    pub contextual_scoring: Option<ContextualScoring>,
    pub synthesis: SynthesisResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,

    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl AnalysisReport {
    pub fn overall_utility_score(&self) -> f64 {
        self.synthesis.overall_utility_score
    }

    pub fn data_integrity_score(&self) -> f64 {
        self.synthesis.data_integrity_score
    }

    pub fn analyzer(&self, kind: AnalyzerKind) -> Option<&AnalyzerResult> {
        self.raw_analyzer_outputs.get(kind.as_str())
    }

    /// Persona tags sorted by confidence; empty for aborted runs.
    pub fn persona_tags(&self) -> &[crate::personas::PersonaTag] {
        self.persona_analysis
            .as_ref()
            .map(|p| p.tags.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyzer_kind_names() {
        let names: Vec<&str> = AnalyzerKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names.len(), 9);
        assert_eq!(names[0], "completeness");
        assert_eq!(names[8], "separability");
        let json = serde_json::to_string(&AnalyzerKind::BaselineMl).unwrap();
        assert_eq!(json, "\"baseline_ml\"");
    }

    #[test]
    fn test_analyzer_kind_groups() {
        let integrity: Vec<_> = AnalyzerKind::ALL
            .into_iter()
            .filter(|k| k.is_integrity())
            .collect();
        assert_eq!(
            integrity,
            vec![
                AnalyzerKind::Completeness,
                AnalyzerKind::Duplicates,
                AnalyzerKind::TypeConsistency
            ]
        );
        assert!(AnalyzerKind::Separability.requires_target());
        assert!(!AnalyzerKind::Outliers.requires_target());
    }

    #[test]
    fn test_result_from_error() {
        let err = UtilityError::InsufficientData("No numeric columns".into());
        let result = AnalyzerResult::from_error(AnalyzerKind::Outliers, &err);
        assert!(!result.success);
        assert!(!result.applicable);
        assert_eq!(result.error.as_deref(), Some("No numeric columns"));

        let err = UtilityError::analyzer("outliers", "matrix is singular");
        let result = AnalyzerResult::from_error(AnalyzerKind::Outliers, &err);
        assert!(result.applicable);
        assert_eq!(result.error.as_deref(), Some("matrix is singular"));
        assert_eq!(result.score(), None);
    }
}
