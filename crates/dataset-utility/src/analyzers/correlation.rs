use super::{AnalysisContext, Analyzer, AnalyzerMetrics, AnalyzerOutput};
use crate::error::{Result, UtilityError};
use crate::types::AnalyzerKind;
use crate::utils::{pearson, round_to};
use serde::{Deserialize, Serialize};
use tracing::debug;

const VERY_HIGH: f64 = 0.95;
const MODERATE: f64 = 0.6;
const TOP_PAIRS: usize = 10;

/// Pairwise Pearson correlation and multicollinearity analysis.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrelationAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStrength {
    VeryHigh,
    High,
    Moderate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MulticollinearityRisk {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedPair {
    pub feature_a: String,
    pub feature_b: String,
    pub correlation: f64,
    pub strength: CorrelationStrength,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationCluster {
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationMetrics {
    pub features_analyzed: usize,
    pub complete_rows: usize,
    pub threshold: f64,
    pub total_pairs: usize,
    pub very_high_pairs: usize,
    /// Pairs at or above the threshold but below the very-high level.
    pub high_pairs: usize,
    pub moderate_pairs: usize,
    pub multicollinearity_risk: MulticollinearityRisk,
    pub clusters: Vec<CorrelationCluster>,
    /// Strongest pairs by absolute correlation.
    pub top_pairs: Vec<CorrelatedPair>,
}

impl CorrelationMetrics {
    /// Pairs whose absolute correlation reaches the threshold.
    pub fn issue_count(&self) -> usize {
        self.very_high_pairs + self.high_pairs
    }
}

/// Score from the risk tier and pair counts.
pub fn correlation_score(risk: MulticollinearityRisk, very_high: usize, high: usize) -> f64 {
    let risk_penalty = match risk {
        MulticollinearityRisk::High => 25.0,
        MulticollinearityRisk::Medium => 15.0,
        MulticollinearityRisk::Low => 0.0,
    };
    (100.0 - risk_penalty - 10.0 * very_high as f64 - 5.0 * high as f64).max(0.0)
}

impl Analyzer for CorrelationAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Correlation
    }

    fn run(&self, ctx: &AnalysisContext<'_>) -> Result<AnalyzerOutput> {
        let dataset = ctx.dataset;
        let features = dataset.numeric_columns();
        if features.len() < 2 {
            return Err(UtilityError::InsufficientData(
                "Correlation analysis needs at least two numeric columns".to_string(),
            ));
        }

        let columns: Vec<Vec<Option<f64>>> = features
            .iter()
            .map(|name| dataset.f64_values(name))
            .collect::<Result<_>>()?;
        let complete: Vec<usize> = (0..dataset.height())
            .filter(|&r| columns.iter().all(|c| c[r].is_some()))
            .collect();
        if complete.len() < 3 {
            return Err(UtilityError::InsufficientData(
                "Too few complete rows for correlation analysis".to_string(),
            ));
        }
        let dense: Vec<Vec<f64>> = columns
            .iter()
            .map(|c| complete.iter().filter_map(|&r| c[r]).collect())
            .collect();

        let threshold = ctx.config.correlation_threshold;
        let p = features.len();
        let mut matrix = vec![vec![0.0; p]; p];
        let mut pairs = Vec::new();
        let mut total_pairs = 0;
        for i in 0..p {
            matrix[i][i] = 1.0;
            for j in i + 1..p {
                total_pairs += 1;
                let Some(r) = pearson(&dense[i], &dense[j]) else {
                    continue;
                };
                matrix[i][j] = r;
                matrix[j][i] = r;
                let strength = if r.abs() >= VERY_HIGH {
                    CorrelationStrength::VeryHigh
                } else if r.abs() >= threshold {
                    CorrelationStrength::High
                } else if r.abs() >= MODERATE {
                    CorrelationStrength::Moderate
                } else {
                    continue;
                };
                pairs.push(CorrelatedPair {
                    feature_a: features[i].to_string(),
                    feature_b: features[j].to_string(),
                    correlation: round_to(r, 4),
                    strength,
                });
            }
        }

        let count = |s: CorrelationStrength| pairs.iter().filter(|p| p.strength == s).count();
        let very_high = count(CorrelationStrength::VeryHigh);
        let high = count(CorrelationStrength::High);
        let moderate = count(CorrelationStrength::Moderate);

        let high_ratio = (very_high + high) as f64 / total_pairs.max(1) as f64;
        let risk = if very_high > 0 || high_ratio > 0.3 {
            MulticollinearityRisk::High
        } else if high > 0 || high_ratio > 0.1 {
            MulticollinearityRisk::Medium
        } else {
            MulticollinearityRisk::Low
        };
        let score = correlation_score(risk, very_high, high);

        let clusters = find_clusters(&features, &matrix, threshold);

        pairs.sort_by(|a, b| b.correlation.abs().total_cmp(&a.correlation.abs()));
        pairs.truncate(TOP_PAIRS);

        debug!(
            "Correlation: {} very high, {} high pairs over {} features, score {:.1}",
            very_high, high, p, score
        );

        let metrics = CorrelationMetrics {
            features_analyzed: p,
            complete_rows: complete.len(),
            threshold,
            total_pairs,
            very_high_pairs: very_high,
            high_pairs: high,
            moderate_pairs: moderate,
            multicollinearity_risk: risk,
            clusters,
            top_pairs: pairs,
        };

        let recommendations = recommendations(&metrics);
        let mut critical = Vec::new();
        if very_high > 0 {
            critical.push(format!(
                "{} feature pair(s) are nearly collinear (|r| >= {})",
                very_high, VERY_HIGH
            ));
        }

        Ok(AnalyzerOutput::new(score, AnalyzerMetrics::Correlation(metrics))
            .with_recommendations(recommendations)
            .with_critical_issues(critical))
    }
}

/// Group features reachable from an unvisited seed through correlations at
/// or above the threshold. Singleton groups are dropped.
fn find_clusters(features: &[&str], matrix: &[Vec<f64>], threshold: f64) -> Vec<CorrelationCluster> {
    let p = features.len();
    let mut visited = vec![false; p];
    let mut clusters = Vec::new();
    for seed in 0..p {
        if visited[seed] {
            continue;
        }
        let mut members = vec![seed];
        visited[seed] = true;
        for other in 0..p {
            if !visited[other] && matrix[seed][other].abs() >= threshold {
                visited[other] = true;
                members.push(other);
            }
        }
        if members.len() > 1 {
            clusters.push(CorrelationCluster {
                features: members.iter().map(|&i| features[i].to_string()).collect(),
            });
        }
    }
    clusters
}

fn recommendations(metrics: &CorrelationMetrics) -> Vec<String> {
    let mut recs = Vec::new();
    match metrics.multicollinearity_risk {
        MulticollinearityRisk::Low => {
            recs.push("Low multicollinearity - features are largely independent".to_string());
        }
        MulticollinearityRisk::Medium => {
            recs.push("Some correlated features - consider regularization (Ridge/Lasso)".to_string());
        }
        MulticollinearityRisk::High => {
            recs.push("High multicollinearity - remove redundant features or apply PCA".to_string());
        }
    }
    for cluster in metrics.clusters.iter().take(3) {
        recs.push(format!(
            "Correlated group [{}]: keep one representative feature",
            cluster.features.join(", ")
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

    fn run(df: DataFrame) -> Result<AnalyzerOutput> {
        let ds = Dataset::new(df).unwrap();
        let config = AnalysisConfig::default();
        let ctx = AnalysisContext::new(&ds, None, &config);
        CorrelationAnalyzer.run(&ctx)
    }

    fn metrics(out: &AnalyzerOutput) -> &CorrelationMetrics {
        match &out.metrics {
            AnalyzerMetrics::Correlation(m) => m,
            _ => panic!("wrong metrics variant"),
        }
    }

    #[test]
    fn test_score_formula() {
        assert_eq!(correlation_score(MulticollinearityRisk::Low, 0, 0), 100.0);
        assert_eq!(correlation_score(MulticollinearityRisk::Medium, 0, 1), 80.0);
        assert_eq!(correlation_score(MulticollinearityRisk::High, 1, 0), 65.0);
        assert_eq!(correlation_score(MulticollinearityRisk::High, 10, 0), 0.0);
    }

    #[test]
    fn test_collinear_pair_detected() {
        let df = df![
            "a" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            "b" => [2.0, 4.0, 6.0, 8.0, 10.0, 12.0],
            "c" => [3.0, 1.0, 4.0, 1.0, 5.0, 9.0],
        ]
        .unwrap();
        let out = run(df).unwrap();
        let m = metrics(&out);
        assert_eq!(m.very_high_pairs, 1);
        assert_eq!(m.multicollinearity_risk, MulticollinearityRisk::High);
        assert_eq!(m.top_pairs[0].feature_a, "a");
        assert_eq!(m.top_pairs[0].feature_b, "b");
        assert_eq!(m.clusters, vec![CorrelationCluster {
            features: vec!["a".to_string(), "b".to_string()]
        }]);
        assert_eq!(m.issue_count(), 1);
        assert_eq!(out.score, 65.0);
    }

    #[test]
    fn test_incomplete_rows_are_dropped() {
        let df = df![
            "a" => [Some(1.0), None, Some(3.0), Some(4.0), Some(2.0)],
            "b" => [Some(5.0), Some(1.0), Some(1.0), Some(2.0), Some(7.0)],
        ]
        .unwrap();
        let out = run(df).unwrap();
        assert_eq!(metrics(&out).complete_rows, 4);
    }

    #[test]
    fn test_single_numeric_column_is_insufficient() {
        let df = df!["a" => [1.0, 2.0], "s" => ["x", "y"]].unwrap();
        assert!(matches!(run(df), Err(UtilityError::InsufficientData(_))));
    }
}
