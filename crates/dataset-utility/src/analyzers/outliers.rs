use super::{pct2, AnalysisContext, Analyzer, AnalyzerMetrics, AnalyzerOutput};
use crate::error::{Result, UtilityError};
use crate::ml::IsolationForest;
use crate::types::AnalyzerKind;
use crate::utils::{mean, percentage, quartiles, round_to, sample_std};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Share of values the isolation forest treats as anomalous.
const CONTAMINATION: f64 = 0.05;
/// Columns need more values than this for the isolation forest to run.
const MIN_FOREST_VALUES: usize = 10;

/// Multi-method outlier detection over numeric columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlierAnalyzer;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnOutliers {
    pub zscore_count: usize,
    pub iqr_count: usize,
    pub isolation_forest_count: usize,
    /// Values flagged by at least two methods.
    pub consensus_count: usize,
    pub consensus_percentage: f64,
    pub lower_fence: Option<f64>,
    pub upper_fence: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutlierMetrics {
    pub columns_analyzed: usize,
    pub zscore_threshold: f64,
    pub iqr_multiplier: f64,
    pub columns: BTreeMap<String, ColumnOutliers>,
    /// Distinct rows flagged by consensus in any column.
    pub outlier_rows: usize,
    pub outlier_percentage: f64,
    pub most_affected_columns: Vec<String>,
}

/// Banded outlier score for the percentage of consensus rows.
pub fn outlier_score(pct: f64) -> f64 {
    let p = pct.max(0.0);
    if p <= 1.0 {
        100.0
    } else if p <= 3.0 {
        95.0 - (p - 1.0) * 2.5
    } else if p <= 5.0 {
        90.0 - (p - 3.0) * 5.0
    } else if p <= 10.0 {
        80.0 - (p - 5.0) * 3.0
    } else if p <= 20.0 {
        65.0 - (p - 10.0) * 2.0
    } else {
        (45.0 - (p - 20.0)).max(25.0)
    }
}

impl Analyzer for OutlierAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Outliers
    }

    fn run(&self, ctx: &AnalysisContext<'_>) -> Result<AnalyzerOutput> {
        let dataset = ctx.dataset;
        let numeric = dataset.numeric_columns();
        if numeric.is_empty() {
            return Err(UtilityError::InsufficientData(
                "Outlier detection needs at least one numeric column".to_string(),
            ));
        }

        let sensitivity = ctx.config.outlier_sensitivity;
        let z_limit = sensitivity.zscore_threshold();
        let k = sensitivity.iqr_multiplier();

        let mut metrics = OutlierMetrics {
            zscore_threshold: z_limit,
            iqr_multiplier: k,
            ..Default::default()
        };
        let mut flagged_rows = BTreeSet::new();

        for name in numeric {
            let (rows, values): (Vec<usize>, Vec<f64>) = dataset
                .f64_values(name)?
                .into_iter()
                .enumerate()
                .filter_map(|(i, v)| v.map(|x| (i, x)))
                .unzip();
            if values.len() < 2 {
                continue;
            }

            let mut votes = vec![0u8; values.len()];
            let mut column = ColumnOutliers::default();

            if let (Some(m), Some(s)) = (mean(&values), sample_std(&values))
                && s > 0.0
            {
                for (vote, v) in votes.iter_mut().zip(&values) {
                    if ((v - m) / s).abs() > z_limit {
                        *vote += 1;
                        column.zscore_count += 1;
                    }
                }
            }

            if let Some((q1, q3)) = quartiles(&values) {
                let iqr = q3 - q1;
                let (lo, hi) = (q1 - k * iqr, q3 + k * iqr);
                column.lower_fence = Some(round_to(lo, 4));
                column.upper_fence = Some(round_to(hi, 4));
                for (vote, v) in votes.iter_mut().zip(&values) {
                    if *v < lo || *v > hi {
                        *vote += 1;
                        column.iqr_count += 1;
                    }
                }
            }

            if values.len() > MIN_FOREST_VALUES {
                let forest = IsolationForest::fit(
                    &values,
                    IsolationForest::DEFAULT_TREES,
                    IsolationForest::DEFAULT_SAMPLE,
                    ctx.config.random_seed,
                );
                for idx in forest.outliers(&values, CONTAMINATION) {
                    votes[idx] += 1;
                    column.isolation_forest_count += 1;
                }
            }

            for (row, vote) in rows.iter().zip(&votes) {
                if *vote >= 2 {
                    column.consensus_count += 1;
                    flagged_rows.insert(*row);
                }
            }
            column.consensus_percentage = pct2(column.consensus_count, values.len());
            metrics.columns.insert(name.to_string(), column);
        }

        if metrics.columns.is_empty() {
            return Err(UtilityError::InsufficientData(
                "No numeric column has at least two values".to_string(),
            ));
        }

        metrics.columns_analyzed = metrics.columns.len();
        metrics.outlier_rows = flagged_rows.len();
        let overall = percentage(flagged_rows.len(), dataset.height());
        metrics.outlier_percentage = round_to(overall, 2);

        let mut affected: Vec<(&String, &ColumnOutliers)> = metrics
            .columns
            .iter()
            .filter(|(_, c)| c.consensus_count > 0)
            .collect();
        affected.sort_by(|a, b| b.1.consensus_count.cmp(&a.1.consensus_count));
        metrics.most_affected_columns = affected.iter().take(5).map(|(n, _)| (*n).clone()).collect();

        let score = outlier_score(overall);
        debug!(
            "Outliers: {} rows ({:.2}%) flagged by consensus, score {:.1}",
            metrics.outlier_rows, overall, score
        );

        let recommendations = recommendations(&metrics, overall);
        let mut critical = Vec::new();
        if overall > 20.0 {
            critical.push(format!(
                "Very high outlier rate: {:.1}% of rows are flagged by multiple methods",
                overall
            ));
        }

        Ok(AnalyzerOutput::new(score, AnalyzerMetrics::Outliers(metrics))
            .with_recommendations(recommendations)
            .with_critical_issues(critical))
    }
}

fn recommendations(metrics: &OutlierMetrics, overall: f64) -> Vec<String> {
    let headline = if overall <= 1.0 {
        "Excellent - very few outliers detected"
    } else if overall <= 5.0 {
        "Good data quality with minimal outliers"
    } else if overall <= 10.0 {
        "Moderate outliers detected - investigate patterns"
    } else if overall <= 20.0 {
        "High outlier count suggests data quality issues"
    } else {
        "Very high outlier percentage indicates serious data issues"
    };
    let mut recs = vec![headline.to_string()];

    if !metrics.most_affected_columns.is_empty() && overall > 1.0 {
        recs.push(format!(
            "Review columns [{}]; consider capping, transformation or robust models",
            metrics.most_affected_columns.join(", ")
        ));
    }
    if overall > 10.0 {
        recs.push("Check for data entry errors or mixed populations before modelling".to_string());
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalysisConfig, Sensitivity};
    use crate::dataset::Dataset;
    use polars::prelude::*;

    fn run_with(df: DataFrame, config: &AnalysisConfig) -> Result<AnalyzerOutput> {
        let ds = Dataset::new(df).unwrap();
        let ctx = AnalysisContext::new(&ds, None, config);
        OutlierAnalyzer.run(&ctx)
    }

    fn metrics(out: &AnalyzerOutput) -> &OutlierMetrics {
        match &out.metrics {
            AnalyzerMetrics::Outliers(m) => m,
            _ => panic!("wrong metrics variant"),
        }
    }

    #[test]
    fn test_score_bands() {
        assert_eq!(outlier_score(0.5), 100.0);
        assert_eq!(outlier_score(3.0), 90.0);
        assert_eq!(outlier_score(5.0), 80.0);
        assert_eq!(outlier_score(10.0), 65.0);
        assert_eq!(outlier_score(20.0), 45.0);
        assert_eq!(outlier_score(80.0), 25.0);
    }

    #[test]
    fn test_clean_column_scores_high() {
        let values: Vec<f64> = (0..100).map(|i| (i % 10) as f64).collect();
        let df = df!["x" => values].unwrap();
        let out = run_with(df, &AnalysisConfig::default()).unwrap();
        assert_eq!(metrics(&out).outlier_rows, 0);
        assert_eq!(out.score, 100.0);
    }

    #[test]
    fn test_extreme_value_reaches_consensus() {
        let mut values: Vec<f64> = (0..99).map(|i| (i % 10) as f64).collect();
        values.push(1000.0);
        let df = df!["x" => values].unwrap();
        let out = run_with(df, &AnalysisConfig::default()).unwrap();
        let m = metrics(&out);
        assert_eq!(m.outlier_rows, 1);
        assert_eq!(m.columns["x"].iqr_count, 1);
        assert_eq!(m.most_affected_columns, vec!["x".to_string()]);
    }

    #[test]
    fn test_sensitivity_changes_thresholds() {
        let df = df!["x" => [1.0, 2.0, 3.0]].unwrap();
        let config = AnalysisConfig::builder()
            .outlier_sensitivity(Sensitivity::High)
            .build()
            .unwrap();
        let out = run_with(df, &config).unwrap();
        assert_eq!(metrics(&out).zscore_threshold, 2.5);
        assert_eq!(metrics(&out).iqr_multiplier, 1.0);
    }

    #[test]
    fn test_no_numeric_columns_is_insufficient() {
        let df = df!["s" => ["a", "b"]].unwrap();
        let err = run_with(df, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, UtilityError::InsufficientData(_)));
    }
}
