//! The foundational analyzer bank.
//!
//! Each analyzer is an independent, read-only pass over the [`Dataset`]. An
//! analyzer whose data-shape preconditions are not met returns
//! [`UtilityError::InsufficientData`](crate::error::UtilityError); the
//! pipeline records that as a not-applicable result instead of failing.

mod balance;
mod completeness;
mod correlation;
mod duplicates;
mod importance;
mod ml_performance;
mod outliers;
mod separability;
mod type_consistency;

pub use balance::{BalanceLevel, ClassBalanceAnalyzer, ClassBalanceMetrics, ClassShare, TaskType};
pub use completeness::{ColumnMissing, CompletenessAnalyzer, CompletenessMetrics, MissingSeverity};
pub use correlation::{
    CorrelatedPair, CorrelationAnalyzer, CorrelationCluster, CorrelationMetrics, CorrelationStrength,
    MulticollinearityRisk,
};
pub use duplicates::{DuplicateAnalyzer, DuplicateMetrics, SubsetDuplicates};
pub use importance::{
    Concentration, FeatureImportanceAnalyzer, FeatureImportanceMetrics, FeatureRank,
    InformationDistribution,
};
pub use ml_performance::{BaselineMlAnalyzer, MlPerformanceMetrics, ModelScore};
pub use outliers::{ColumnOutliers, OutlierAnalyzer, OutlierMetrics};
pub use separability::{SeparabilityAnalyzer, SeparabilityMetrics};
pub use type_consistency::{
    ColumnTypeIssue, QualityLevel, SchemaMismatch, TypeConsistencyAnalyzer, TypeConsistencyMetrics,
};

use crate::config::{AnalysisConfig, AnalysisDepth};
use crate::dataset::Dataset;
use crate::error::{Result, UtilityError};
use crate::types::AnalyzerKind;
use crate::utils::{percentage, round_to};
use serde::{Deserialize, Serialize};

/// Read-only inputs shared by every analyzer of one request.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub dataset: &'a Dataset,
    pub target: Option<&'a str>,
    pub config: &'a AnalysisConfig,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(dataset: &'a Dataset, target: Option<&'a str>, config: &'a AnalysisConfig) -> Self {
        Self {
            dataset,
            target,
            config,
        }
    }

    /// The target column, or `InsufficientData` for supervised analyzers.
    pub fn require_target(&self) -> Result<&'a str> {
        self.target.ok_or_else(|| {
            UtilityError::InsufficientData("No target column identified".to_string())
        })
    }
}

/// What an analyzer produces on success.
#[derive(Debug, Clone)]
pub struct AnalyzerOutput {
    pub score: f64,
    pub metrics: AnalyzerMetrics,
    pub recommendations: Vec<String>,
    pub critical_issues: Vec<String>,
}

impl AnalyzerOutput {
    pub fn new(score: f64, metrics: AnalyzerMetrics) -> Self {
        Self {
            score: round_to(score, 1),
            metrics,
            recommendations: Vec::new(),
            critical_issues: Vec::new(),
        }
    }

    pub fn with_recommendations(mut self, recommendations: Vec<String>) -> Self {
        self.recommendations = recommendations;
        self
    }

    pub fn with_critical_issues(mut self, issues: Vec<String>) -> Self {
        self.critical_issues = issues;
        self
    }
}

/// Diagnostic metrics, one variant per analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalyzerMetrics {
    Completeness(CompletenessMetrics),
    Duplicates(DuplicateMetrics),
    TypeConsistency(TypeConsistencyMetrics),
    Outliers(OutlierMetrics),
    ClassBalance(ClassBalanceMetrics),
    Correlation(CorrelationMetrics),
    BaselineMl(MlPerformanceMetrics),
    FeatureImportance(FeatureImportanceMetrics),
    Separability(SeparabilityMetrics),
}

/// A single foundational analyzer.
pub trait Analyzer: Send + Sync {
    fn kind(&self) -> AnalyzerKind;

    fn run(&self, ctx: &AnalysisContext<'_>) -> Result<AnalyzerOutput>;
}

/// The immutable set of analyzers run for one analysis depth.
pub struct AnalyzerBank {
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl AnalyzerBank {
    /// Analyzers included at `depth`, in report order.
    pub fn for_depth(depth: AnalysisDepth) -> Self {
        let analyzers = AnalyzerKind::ALL
            .into_iter()
            .filter(|kind| depth.includes(*kind))
            .map(build)
            .collect();
        Self { analyzers }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Analyzer> {
        self.analyzers.iter().map(|a| a.as_ref())
    }

    pub fn kinds(&self) -> Vec<AnalyzerKind> {
        self.analyzers.iter().map(|a| a.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }
}

impl std::fmt::Debug for AnalyzerBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerBank")
            .field("analyzers", &self.kinds())
            .finish()
    }
}

fn build(kind: AnalyzerKind) -> Box<dyn Analyzer> {
    match kind {
        AnalyzerKind::Completeness => Box::new(CompletenessAnalyzer),
        AnalyzerKind::Duplicates => Box::new(DuplicateAnalyzer),
        AnalyzerKind::TypeConsistency => Box::new(TypeConsistencyAnalyzer),
        AnalyzerKind::Outliers => Box::new(OutlierAnalyzer),
        AnalyzerKind::ClassBalance => Box::new(ClassBalanceAnalyzer),
        AnalyzerKind::Correlation => Box::new(CorrelationAnalyzer),
        AnalyzerKind::BaselineMl => Box::new(BaselineMlAnalyzer),
        AnalyzerKind::FeatureImportance => Box::new(FeatureImportanceAnalyzer),
        AnalyzerKind::Separability => Box::new(SeparabilityAnalyzer),
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Target labels as strings, with the row index of each non-null label.
pub(crate) fn target_labels(ctx: &AnalysisContext<'_>, target: &str) -> Result<Vec<(usize, String)>> {
    let labels = ctx
        .dataset
        .string_values(target)?
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|label| (i, label)))
        .collect();
    Ok(labels)
}

/// Build a dense feature matrix over `features`, imputing nulls with the
/// column mean. Columns that are entirely null are dropped.
pub(crate) fn feature_matrix(
    dataset: &Dataset,
    features: &[&str],
    rows: &[usize],
) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
    let mut kept_names = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();

    for name in features {
        let values = dataset.f64_values(name)?;
        let present: Vec<f64> = rows.iter().filter_map(|&r| values[r]).collect();
        let Some(fill) = crate::utils::mean(&present) else {
            continue;
        };
        columns.push(rows.iter().map(|&r| values[r].unwrap_or(fill)).collect());
        kept_names.push((*name).to_string());
    }

    let matrix = (0..rows.len())
        .map(|i| columns.iter().map(|col| col[i]).collect())
        .collect();
    Ok((kept_names, matrix))
}

/// Share of `part` in `total` rounded to two decimals.
pub(crate) fn pct2(part: usize, total: usize) -> f64 {
    round_to(percentage(part, total), 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_for_depth() {
        assert_eq!(AnalyzerBank::for_depth(AnalysisDepth::Basic).len(), 3);
        assert_eq!(AnalyzerBank::for_depth(AnalysisDepth::Standard).len(), 6);
        let complete = AnalyzerBank::for_depth(AnalysisDepth::Complete);
        assert_eq!(complete.kinds(), AnalyzerKind::ALL.to_vec());
    }

    #[test]
    fn test_output_rounds_score() {
        let metrics = AnalyzerMetrics::Duplicates(DuplicateMetrics::default());
        let output = AnalyzerOutput::new(87.456, metrics);
        assert_eq!(output.score, 87.5);
    }

    #[test]
    fn test_feature_matrix_mean_imputes() {
        let df = polars::df![
            "a" => [Some(1.0), None, Some(3.0)],
            "b" => [Option::<f64>::None, None, None],
        ]
        .unwrap();
        let ds = Dataset::new(df).unwrap();
        let (names, matrix) = feature_matrix(&ds, &["a", "b"], &[0, 1, 2]).unwrap();
        assert_eq!(names, vec!["a".to_string()]);
        assert_eq!(matrix, vec![vec![1.0], vec![2.0], vec![3.0]]);
    }
}
