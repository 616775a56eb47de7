use super::{pct2, AnalysisContext, Analyzer, AnalyzerMetrics, AnalyzerOutput};
use crate::error::Result;
use crate::types::AnalyzerKind;
use crate::utils::{percentage, round_to};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Missing-value analysis.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletenessAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSeverity {
    None,
    Minimal,
    Low,
    Moderate,
    High,
}

impl MissingSeverity {
    pub fn from_percentage(pct: f64) -> Self {
        if pct == 0.0 {
            Self::None
        } else if pct <= 1.0 {
            Self::Minimal
        } else if pct <= 5.0 {
            Self::Low
        } else if pct <= 20.0 {
            Self::Moderate
        } else {
            Self::High
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMissing {
    pub missing_count: usize,
    pub missing_percentage: f64,
    pub severity: MissingSeverity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletenessMetrics {
    pub total_cells: usize,
    pub missing_cells: usize,
    pub missing_percentage: f64,
    pub columns_affected: usize,
    pub columns: BTreeMap<String, ColumnMissing>,
    pub completely_missing_columns: Vec<String>,
    /// Columns with at least half their values missing (but not all).
    pub problematic_columns: Vec<String>,
    /// Rows with more than half their cells missing.
    pub high_missing_rows: usize,
    pub high_missing_rows_percentage: f64,
}

/// Piecewise completeness score for an overall missing percentage.
pub fn completeness_score(missing_pct: f64) -> f64 {
    let m = missing_pct.max(0.0);
    if m == 0.0 {
        100.0
    } else if m <= 1.0 {
        95.0
    } else if m <= 5.0 {
        85.0 - (m - 1.0) * 2.0
    } else if m <= 20.0 {
        77.0 - (m - 5.0) * 3.0
    } else {
        (32.0 - (m - 20.0) * 0.6).max(20.0)
    }
}

impl Analyzer for CompletenessAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Completeness
    }

    fn run(&self, ctx: &AnalysisContext<'_>) -> Result<AnalyzerOutput> {
        let dataset = ctx.dataset;
        let rows = dataset.height();
        let width = dataset.width();

        let mut metrics = CompletenessMetrics {
            total_cells: dataset.total_cells(),
            missing_cells: dataset.missing_cells(),
            ..Default::default()
        };

        for info in dataset.columns() {
            let pct = percentage(info.null_count, rows);
            if info.null_count == rows {
                metrics.completely_missing_columns.push(info.name.clone());
            } else if pct >= 50.0 {
                metrics.problematic_columns.push(info.name.clone());
            }
            if info.null_count > 0 {
                metrics.columns_affected += 1;
            }
            metrics.columns.insert(
                info.name.clone(),
                ColumnMissing {
                    missing_count: info.null_count,
                    missing_percentage: round_to(pct, 2),
                    severity: MissingSeverity::from_percentage(pct),
                },
            );
        }

        // Per-row null counts, only needed when some cell is missing
        if metrics.missing_cells > 0 {
            let mut row_nulls = vec![0usize; rows];
            for column in dataset.frame().get_columns() {
                let mask = column.as_materialized_series().is_null();
                for (i, is_null) in mask.into_iter().enumerate() {
                    if is_null.unwrap_or(false) {
                        row_nulls[i] += 1;
                    }
                }
            }
            let half = width as f64 * 0.5;
            metrics.high_missing_rows = row_nulls.iter().filter(|&&n| n as f64 > half).count();
        }
        metrics.high_missing_rows_percentage = pct2(metrics.high_missing_rows, rows);

        let overall = percentage(metrics.missing_cells, metrics.total_cells);
        metrics.missing_percentage = round_to(overall, 2);
        let score = completeness_score(overall);

        debug!(
            "Completeness: {:.2}% missing across {} cells, score {:.1}",
            overall, metrics.total_cells, score
        );

        let recommendations = recommendations(&metrics, overall);
        let mut critical = Vec::new();
        if overall > 20.0 {
            critical.push(format!(
                "High missing data: {:.1}% of all cells are empty",
                overall
            ));
        }
        if !metrics.completely_missing_columns.is_empty() {
            critical.push(format!(
                "Columns with no values at all: {}",
                metrics.completely_missing_columns.join(", ")
            ));
        }

        Ok(AnalyzerOutput::new(score, AnalyzerMetrics::Completeness(metrics))
            .with_recommendations(recommendations)
            .with_critical_issues(critical))
    }
}

fn recommendations(metrics: &CompletenessMetrics, overall: f64) -> Vec<String> {
    let mut recs = Vec::new();
    let headline = if overall == 0.0 {
        "Excellent data completeness - no missing values detected"
    } else if overall <= 1.0 {
        "Very good data quality with minimal missing values"
    } else if overall <= 5.0 {
        "Good data quality but monitor missing value trends"
    } else if overall <= 20.0 {
        "Moderate missing data - consider imputation strategies"
    } else {
        "High missing data requires immediate attention"
    };
    recs.push(headline.to_string());

    let critical: Vec<&str> = metrics
        .columns
        .iter()
        .filter(|(_, c)| c.severity == MissingSeverity::High)
        .map(|(name, _)| name.as_str())
        .collect();
    if !critical.is_empty() {
        recs.push(format!(
            "Columns [{}] have more than 20% missing values; review collection, drop them, or use model-based imputation",
            critical.join(", ")
        ));
    }

    let moderate: Vec<&str> = metrics
        .columns
        .iter()
        .filter(|(_, c)| c.severity == MissingSeverity::Moderate)
        .map(|(name, _)| name.as_str())
        .collect();
    if !moderate.is_empty() {
        recs.push(format!(
            "Columns [{}] need attention; mean/median imputation or forward fill may be enough",
            moderate.join(", ")
        ));
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::dataset::Dataset;
    use polars::prelude::*;

    fn run(df: DataFrame) -> (f64, CompletenessMetrics, Vec<String>) {
        let ds = Dataset::new(df).unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&ds, None, &config);
        let out = CompletenessAnalyzer.run(&ctx).unwrap();
        let AnalyzerMetrics::Completeness(m) = out.metrics else {
            panic!("wrong metrics variant");
        };
        (out.score, m, out.critical_issues)
    }

    #[test]
    fn test_score_bands() {
        assert_eq!(completeness_score(0.0), 100.0);
        assert_eq!(completeness_score(0.5), 95.0);
        assert_eq!(completeness_score(5.0), 77.0);
        assert_eq!(completeness_score(20.0), 32.0);
        assert_eq!(completeness_score(90.0), 20.0);
    }

    #[test]
    fn test_complete_dataset_scores_100() {
        let df = df!["a" => [1, 2, 3], "b" => ["x", "y", "z"]].unwrap();
        let (score, metrics, critical) = run(df);
        assert_eq!(score, 100.0);
        assert_eq!(metrics.missing_cells, 0);
        assert!(critical.is_empty());
    }

    #[test]
    fn test_patterns_detected() {
        let df = df![
            "empty" => [Option::<i32>::None, None, None, None],
            "half" => [Some(1), None, None, Some(4)],
            "full" => [1, 2, 3, 4],
        ]
        .unwrap();
        let (score, metrics, critical) = run(df);
        // 6 of 12 cells missing
        assert_eq!(metrics.missing_percentage, 50.0);
        assert_eq!(score, 20.0);
        assert_eq!(metrics.completely_missing_columns, vec!["empty".to_string()]);
        assert_eq!(metrics.problematic_columns, vec!["half".to_string()]);
        // rows 1 and 2 miss 2 of 3 cells
        assert_eq!(metrics.high_missing_rows, 2);
        assert_eq!(metrics.columns["half"].severity, MissingSeverity::High);
        assert_eq!(critical.len(), 2);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn more_missing_never_scores_higher(a in 0.0f64..100.0, b in 0.0f64..100.0) {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                prop_assert!(completeness_score(hi) <= completeness_score(lo));
            }

            #[test]
            fn score_stays_in_range(m in 0.0f64..100.0) {
                let s = completeness_score(m);
                prop_assert!((20.0..=100.0).contains(&s));
            }
        }
    }
}
