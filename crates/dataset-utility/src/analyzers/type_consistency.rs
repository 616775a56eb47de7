use super::{AnalysisContext, Analyzer, AnalyzerMetrics, AnalyzerOutput};
use crate::dataset::{ColumnKind, Dataset};
use crate::error::Result;
use crate::types::AnalyzerKind;
use crate::utils::{parse_numeric_string, quartiles, round_to};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Values sampled per text column when looking for mixed content.
const MIXED_TYPE_SAMPLE: usize = 1000;

/// Checks declared schemas and mixed-content columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeConsistencyAnalyzer;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ColumnTypeIssue {
    AllNull {
        count: usize,
    },
    MixedNumericString {
        numeric_percentage: f64,
        string_percentage: f64,
    },
    ExtremeOutliers {
        outlier_count: usize,
        outlier_percentage: f64,
    },
}

impl ColumnTypeIssue {
    pub fn describe(&self) -> String {
        match self {
            Self::AllNull { .. } => "Column contains only null values".to_string(),
            Self::MixedNumericString {
                numeric_percentage,
                string_percentage,
            } => format!(
                "Column mixes numeric ({numeric_percentage}%) and text ({string_percentage}%) values"
            ),
            Self::ExtremeOutliers {
                outlier_count,
                outlier_percentage,
            } => format!("Column has {outlier_count} extreme outliers ({outlier_percentage}%)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMismatch {
    pub column: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 95.0 {
            Self::Excellent
        } else if score >= 80.0 {
            Self::Good
        } else if score >= 60.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeConsistencyMetrics {
    pub total_columns: usize,
    pub columns_with_issues: usize,
    pub schema_mismatches: Vec<SchemaMismatch>,
    /// Declared columns absent from the dataset.
    pub missing_expected_columns: Vec<String>,
    pub column_issues: BTreeMap<String, Vec<ColumnTypeIssue>>,
    pub quality_level: Option<QualityLevel>,
}

impl TypeConsistencyMetrics {
    /// Schema mismatches plus per-column issues.
    pub fn total_issues(&self) -> usize {
        self.schema_mismatches.len() + self.column_issues.values().map(Vec::len).sum::<usize>()
    }
}

/// Issues found in a single column.
fn column_issues(dataset: &Dataset, name: &str) -> Result<Vec<ColumnTypeIssue>> {
    let Some(info) = dataset.column_info(name) else {
        return Ok(Vec::new());
    };
    let rows = dataset.height();

    if info.null_count == rows {
        return Ok(vec![ColumnTypeIssue::AllNull { count: rows }]);
    }

    let mut issues = Vec::new();
    match info.kind {
        ColumnKind::Categorical => {
            let sample: Vec<String> = dataset
                .string_values(name)?
                .into_iter()
                .flatten()
                .take(MIXED_TYPE_SAMPLE)
                .collect();
            let numeric = sample
                .iter()
                .filter(|v| parse_numeric_string(v).is_some())
                .count();
            let text = sample.len() - numeric;
            if numeric > 0 && text > 0 {
                let total = sample.len() as f64;
                issues.push(ColumnTypeIssue::MixedNumericString {
                    numeric_percentage: round_to(numeric as f64 / total * 100.0, 1),
                    string_percentage: round_to(text as f64 / total * 100.0, 1),
                });
            }
        }
        ColumnKind::Numeric => {
            let values: Vec<f64> = dataset.f64_values(name)?.into_iter().flatten().collect();
            if let Some((q1, q3)) = quartiles(&values) {
                let iqr = q3 - q1;
                if iqr > 0.0 {
                    let (lo, hi) = (q1 - 3.0 * iqr, q3 + 3.0 * iqr);
                    let count = values.iter().filter(|v| **v < lo || **v > hi).count();
                    let pct = count as f64 / values.len() as f64 * 100.0;
                    if pct > 5.0 {
                        issues.push(ColumnTypeIssue::ExtremeOutliers {
                            outlier_count: count,
                            outlier_percentage: round_to(pct, 1),
                        });
                    }
                }
            }
        }
        _ => {}
    }
    Ok(issues)
}

impl Analyzer for TypeConsistencyAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::TypeConsistency
    }

    fn run(&self, ctx: &AnalysisContext<'_>) -> Result<AnalyzerOutput> {
        let dataset = ctx.dataset;
        let mut metrics = TypeConsistencyMetrics {
            total_columns: dataset.width(),
            ..Default::default()
        };
        let mut score = 100.0;

        for (column, expected) in &ctx.config.expected_types {
            match dataset.series(column) {
                Ok(series) => {
                    if !expected.matches(series.dtype()) {
                        metrics.schema_mismatches.push(SchemaMismatch {
                            column: column.clone(),
                            expected: expected.as_str().to_string(),
                            actual: series.dtype().to_string(),
                        });
                        score -= 10.0;
                    }
                }
                Err(_) => metrics.missing_expected_columns.push(column.clone()),
            }
        }

        for info in dataset.columns() {
            let issues = column_issues(dataset, &info.name)?;
            if !issues.is_empty() {
                score -= (issues.len() as f64 * 3.0).min(15.0);
                metrics.column_issues.insert(info.name.clone(), issues);
            }
        }
        metrics.columns_with_issues = metrics.column_issues.len();

        let score: f64 = score.max(0.0);
        metrics.quality_level = Some(QualityLevel::from_score(score));

        debug!(
            "Type consistency: {} mismatches, {} columns with issues, score {:.1}",
            metrics.schema_mismatches.len(),
            metrics.columns_with_issues,
            score
        );

        let recommendations = recommendations(&metrics);
        let mut critical = Vec::new();
        if score < 60.0 {
            critical.push(format!(
                "Major type inconsistencies: {} schema mismatches and {} problematic columns",
                metrics.schema_mismatches.len(),
                metrics.columns_with_issues
            ));
        }

        Ok(AnalyzerOutput::new(score, AnalyzerMetrics::TypeConsistency(metrics))
            .with_recommendations(recommendations)
            .with_critical_issues(critical))
    }
}

fn recommendations(metrics: &TypeConsistencyMetrics) -> Vec<String> {
    let mut recs = Vec::new();
    if metrics.total_issues() == 0 {
        recs.push("Excellent type consistency - no issues detected".to_string());
    }
    if !metrics.schema_mismatches.is_empty() {
        recs.push(format!(
            "Schema mismatches: {} columns do not match their declared types; convert them or update the schema",
            metrics.schema_mismatches.len()
        ));
    }
    if metrics.columns_with_issues > 0 {
        recs.push(format!(
            "Type issues: {} columns have consistency problems",
            metrics.columns_with_issues
        ));
    }
    let mixed: Vec<&str> = metrics
        .column_issues
        .iter()
        .filter(|(_, issues)| {
            issues
                .iter()
                .any(|i| matches!(i, ColumnTypeIssue::MixedNumericString { .. }))
        })
        .map(|(name, _)| name.as_str())
        .collect();
    if !mixed.is_empty() {
        recs.push(format!("Clean mixed-type values in columns [{}]", mixed.join(", ")));
    }
    if !metrics.missing_expected_columns.is_empty() {
        recs.push(format!(
            "Declared columns not present in the data: {}",
            metrics.missing_expected_columns.join(", ")
        ));
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, ExpectedType};
    use polars::prelude::*;

    fn run_with(df: DataFrame, config: &AnalysisConfig) -> (f64, TypeConsistencyMetrics) {
        let ds = Dataset::new(df).unwrap();
        let ctx = AnalysisContext::new(&ds, None, config);
        let out = TypeConsistencyAnalyzer.run(&ctx).unwrap();
        let AnalyzerMetrics::TypeConsistency(m) = out.metrics else {
            panic!("wrong metrics variant");
        };
        (out.score, m)
    }

    #[test]
    fn test_clean_frame_scores_100() {
        let df = df!["a" => [1.0, 2.0, 3.0, 4.0], "b" => ["x", "y", "z", "w"]].unwrap();
        let (score, metrics) = run_with(df, &AnalysisConfig::default());
        assert_eq!(score, 100.0);
        assert_eq!(metrics.quality_level, Some(QualityLevel::Excellent));
        assert_eq!(metrics.total_issues(), 0);
    }

    #[test]
    fn test_mixed_and_all_null_columns() {
        let df = df![
            "mixed" => ["1", "2", "abc", "4"],
            "empty" => [Option::<f64>::None, None, None, None],
        ]
        .unwrap();
        let (score, metrics) = run_with(df, &AnalysisConfig::default());
        assert_eq!(score, 94.0);
        assert_eq!(metrics.columns_with_issues, 2);
        assert!(matches!(
            metrics.column_issues["mixed"][0],
            ColumnTypeIssue::MixedNumericString { numeric_percentage, .. } if numeric_percentage == 75.0
        ));
        assert!(matches!(
            metrics.column_issues["empty"][0],
            ColumnTypeIssue::AllNull { count: 4 }
        ));
    }

    #[test]
    fn test_schema_mismatch_penalty() {
        let df = df!["age" => ["1", "2"], "score" => [1.5, 2.5]].unwrap();
        let config = AnalysisConfig::builder()
            .expected_type("age", ExpectedType::Integer)
            .expected_type("score", ExpectedType::Float)
            .expected_type("ghost", ExpectedType::String)
            .build()
            .unwrap();
        let (score, metrics) = run_with(df, &config);
        assert_eq!(score, 90.0);
        assert_eq!(metrics.schema_mismatches.len(), 1);
        assert_eq!(metrics.schema_mismatches[0].column, "age");
        assert_eq!(metrics.missing_expected_columns, vec!["ghost".to_string()]);
    }

    #[test]
    fn test_extreme_outliers_flagged() {
        let mut values: Vec<f64> = (0..18).map(|i| i as f64).collect();
        values.extend([1000.0, 2000.0]);
        let df = df!["v" => values].unwrap();
        let (score, metrics) = run_with(df, &AnalysisConfig::default());
        assert_eq!(score, 97.0);
        assert!(matches!(
            metrics.column_issues["v"][0],
            ColumnTypeIssue::ExtremeOutliers { outlier_count: 2, .. }
        ));
    }
}
